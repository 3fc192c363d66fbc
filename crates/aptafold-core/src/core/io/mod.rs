//! Provides the structure-file handling required to pass artifacts between stages.
//!
//! Only the edits the pipeline itself performs live here: repairing atom names written by the
//! folding engine and concatenating two structures into a single complex. Everything else about
//! the file formats is left to the external engines.

pub mod structure;
