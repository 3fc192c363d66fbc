//! # Engine Module
//!
//! The stateful layer of the pipeline: it owns run directories, the append-only checkpoint log,
//! and the adapters that wrap every long-running external engine behind a uniform contract.
//!
//! ## Architecture
//!
//! - **Runs** ([`run`], [`context`], [`checkpoint`], [`record`]) - Working-directory allocation,
//!   resumption, stage-completion markers and the run-local record log
//! - **Artifacts** ([`artifacts`]) - Conventional file names for every stage boundary
//! - **Stages** ([`stages`]) - Secondary-structure, folding, MD-sampling and complex assembly
//! - **Analysis** ([`analysis`]) - Orchestration of the external trajectory numerics
//! - **Bridge** ([`bridge`]) - A subprocess driver that implements the external engine contracts
//! - **Configuration** ([`config`]) - Physical and numeric parameters, resolved once at load time
//! - **Error Handling** ([`error`]) - The failure taxonomy shared by every stage
//! - **Progress Monitoring** ([`progress`]) - Stage progress events for user interfaces

pub mod analysis;
pub mod artifacts;
pub mod bridge;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod error;
pub(crate) mod process;
pub mod progress;
pub mod record;
pub mod run;
pub mod stages;
