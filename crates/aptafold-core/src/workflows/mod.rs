//! # Workflows Module
//!
//! High-level entry points that drive a run directory from its current checkpoint to
//! completion.
//!
//! ## Overview
//!
//! A workflow reads the checkpoint log, skips every stage whose completion marker is already
//! present, executes the remaining stages in order and hands each stage the artifacts written
//! by its predecessor. A failed stage halts the run and leaves the checkpoint at the last
//! successful marker, so the next invocation resumes there.
//!
//! ## Architecture
//!
//! - **Pipeline Workflow** ([`pipeline`]) - Secondary-structure prediction, coarse folding,
//!   free-aptamer sampling and, when a peptide is given, complex sampling, each followed by
//!   the analysis its results depend on.

pub mod pipeline;
