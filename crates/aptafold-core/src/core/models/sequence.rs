use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Literal accepted on the command line in place of a peptide to request an aptamer-only run.
pub const NO_PEPTIDE_SENTINEL: &str = "none";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SequenceError {
    #[error("{kind} sequence is empty")]
    Empty { kind: &'static str },
    #[error("Invalid {kind} symbol '{symbol}' at position {position}")]
    InvalidSymbol {
        kind: &'static str,
        symbol: char,
        position: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Nucleotide {
    A,
    C,
    G,
    T,
}

impl Nucleotide {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Self::A),
            'C' => Some(Self::C),
            'G' => Some(Self::G),
            'T' => Some(Self::T),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Self::A => 'A',
            Self::C => 'C',
            Self::G => 'G',
            Self::T => 'T',
        }
    }

    /// Returns `true` when the two bases form a canonical Watson-Crick pair.
    pub fn pairs_with(self, other: Nucleotide) -> bool {
        matches!(
            (self, other),
            (Self::A, Self::T) | (Self::T, Self::A) | (Self::C, Self::G) | (Self::G, Self::C)
        )
    }
}

/// An ordered single-stranded DNA sequence, 5' to 3'.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DnaSequence {
    bases: Vec<Nucleotide>,
}

impl DnaSequence {
    pub fn bases(&self) -> &[Nucleotide] {
        &self.bases
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Looks up a base by its 1-based index, the convention used by pair lists.
    pub fn base(&self, index: usize) -> Option<Nucleotide> {
        index.checked_sub(1).and_then(|i| self.bases.get(i).copied())
    }
}

impl FromStr for DnaSequence {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SequenceError::Empty { kind: "DNA" });
        }
        let bases = trimmed
            .chars()
            .enumerate()
            .map(|(i, c)| {
                Nucleotide::from_char(c).ok_or(SequenceError::InvalidSymbol {
                    kind: "DNA",
                    symbol: c,
                    position: i + 1,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { bases })
    }
}

impl fmt::Display for DnaSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for base in &self.bases {
            write!(f, "{}", base.to_char())?;
        }
        Ok(())
    }
}

const AMINO_ACIDS: &str = "ACDEFGHIKLMNPQRSTVWY";

/// A peptide analyte in one-letter amino-acid code, N- to C-terminus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeptideSequence {
    residues: String,
}

impl PeptideSequence {
    /// Parses a command-line peptide argument, mapping the sentinel to `None`.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, SequenceError> {
        if s.trim().eq_ignore_ascii_case(NO_PEPTIDE_SENTINEL) {
            return Ok(None);
        }
        s.parse().map(Some)
    }

    pub fn residues(&self) -> &str {
        &self.residues
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

impl FromStr for PeptideSequence {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SequenceError::Empty { kind: "peptide" });
        }
        let mut residues = String::with_capacity(trimmed.len());
        for (i, c) in trimmed.chars().enumerate() {
            let upper = c.to_ascii_uppercase();
            if !AMINO_ACIDS.contains(upper) {
                return Err(SequenceError::InvalidSymbol {
                    kind: "peptide",
                    symbol: c,
                    position: i + 1,
                });
            }
            residues.push(upper);
        }
        Ok(Self { residues })
    }
}

impl fmt::Display for PeptideSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.residues)
    }
}
