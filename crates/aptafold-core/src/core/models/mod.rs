//! Domain models for aptamer sequences, peptide analytes and base-pairing patterns.

pub mod secondary;
pub mod sequence;
