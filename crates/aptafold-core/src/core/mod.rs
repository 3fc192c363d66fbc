//! # Core Module
//!
//! Stateless building blocks shared by every pipeline stage.
//!
//! - **Domain Models** ([`models`]) - Nucleotide and peptide sequences, secondary structures
//! - **File Plumbing** ([`io`]) - Structure-file edits needed at stage boundaries

pub mod io;
pub mod models;
