//! # Aptafold Core Library
//!
//! A checkpointed, resumable pipeline that predicts the three-dimensional structure of a
//! single-stranded DNA aptamer and, optionally, its binding interaction with a peptide analyte.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless domain models (`DnaSequence`, `SecondaryStructure`)
//!   and the small amount of structure-file plumbing needed to hand data between stages.
//!
//! - **[`engine`]: The Logic Core.** Run directories and the append-only checkpoint log, the
//!   stage adapters that wrap external engines behind a uniform contract, and the trajectory
//!   analysis that turns sampled trajectories into results.
//!
//! - **[`workflows`]: The Public API.** The pipeline controller that decides, from the
//!   checkpoint, which stages still have to run and hands artifacts from one stage to the next.

pub mod core;
pub mod engine;
pub mod workflows;
