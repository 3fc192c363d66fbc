use serde::{Deserialize, Serialize};
use thiserror::Error;

const BRACKETS: [(char, char); 4] = [('(', ')'), ('[', ']'), ('{', '}'), ('<', '>')];

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SecondaryStructureError {
    #[error("Base index {index} is outside the sequence (length {length})")]
    IndexOutOfRange { index: usize, length: usize },
    #[error("Pair ({i}, {j}) is not ordered; the first index must be smaller")]
    NotOrdered { i: usize, j: usize },
    #[error("Base {index} appears in more than one pair")]
    IndexReused { index: usize },
    #[error("Unbalanced bracket '{symbol}' at position {position}")]
    UnbalancedBracket { symbol: char, position: usize },
    #[error("Invalid dot-bracket symbol '{symbol}' at position {position}")]
    InvalidSymbol { symbol: char, position: usize },
    #[error("Partner table is not symmetric at base {index}")]
    AsymmetricPartners { index: usize },
    #[error("Dot-bracket string has length {found}, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },
}

/// Two paired bases, as 1-based indices into the sequence with `i < j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasePair {
    pub i: usize,
    pub j: usize,
}

impl BasePair {
    pub fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }

    /// Two pairs cross when exactly one end of one lies inside the other (a pseudoknot).
    pub fn crosses(&self, other: &BasePair) -> bool {
        (self.i < other.i && other.i < self.j && self.j < other.j)
            || (other.i < self.i && self.i < other.j && other.j < self.j)
    }
}

/// The base-pairing pattern of a single strand.
///
/// Construction validates that every index lies in `1..=length`, that each pair is ordered,
/// and that no base takes part in more than one pair. Instances are immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SecondaryStructureRecord", into = "SecondaryStructureRecord")]
pub struct SecondaryStructure {
    length: usize,
    pairs: Vec<BasePair>,
}

impl SecondaryStructure {
    pub fn from_pairs(
        length: usize,
        pairs: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Self, SecondaryStructureError> {
        let mut seen = vec![false; length + 1];
        let mut validated = Vec::new();
        for (i, j) in pairs {
            for index in [i, j] {
                if index == 0 || index > length {
                    return Err(SecondaryStructureError::IndexOutOfRange { index, length });
                }
            }
            if i >= j {
                return Err(SecondaryStructureError::NotOrdered { i, j });
            }
            for index in [i, j] {
                if std::mem::replace(&mut seen[index], true) {
                    return Err(SecondaryStructureError::IndexReused { index });
                }
            }
            validated.push(BasePair::new(i, j));
        }
        validated.sort();
        Ok(Self {
            length,
            pairs: validated,
        })
    }

    /// A structure of the given length with no pairs at all.
    pub fn unpaired(length: usize) -> Self {
        Self {
            length,
            pairs: Vec::new(),
        }
    }

    pub fn from_dot_bracket(notation: &str) -> Result<Self, SecondaryStructureError> {
        let symbols: Vec<char> = notation.trim().chars().collect();
        let mut stacks: [Vec<usize>; BRACKETS.len()] = Default::default();
        let mut pairs = Vec::new();

        for (offset, &symbol) in symbols.iter().enumerate() {
            let position = offset + 1;
            if symbol == '.' {
                continue;
            }
            if let Some(level) = BRACKETS.iter().position(|(open, _)| *open == symbol) {
                stacks[level].push(position);
            } else if let Some(level) = BRACKETS.iter().position(|(_, close)| *close == symbol) {
                let opening = stacks[level]
                    .pop()
                    .ok_or(SecondaryStructureError::UnbalancedBracket { symbol, position })?;
                pairs.push((opening, position));
            } else {
                return Err(SecondaryStructureError::InvalidSymbol { symbol, position });
            }
        }

        for (level, stack) in stacks.iter().enumerate() {
            if let Some(&position) = stack.first() {
                return Err(SecondaryStructureError::UnbalancedBracket {
                    symbol: BRACKETS[level].0,
                    position,
                });
            }
        }

        Self::from_pairs(symbols.len(), pairs)
    }

    /// Builds a structure from a per-base partner table (1-based partners, 0 = unpaired).
    pub fn from_partner_table(partners: &[usize]) -> Result<Self, SecondaryStructureError> {
        let length = partners.len();
        let mut pairs = Vec::new();
        for (offset, &partner) in partners.iter().enumerate() {
            let index = offset + 1;
            if partner == 0 {
                continue;
            }
            if partner > length {
                return Err(SecondaryStructureError::IndexOutOfRange {
                    index: partner,
                    length,
                });
            }
            if partners[partner - 1] != index {
                return Err(SecondaryStructureError::AsymmetricPartners { index });
            }
            if index < partner {
                pairs.push((index, partner));
            }
        }
        Self::from_pairs(length, pairs)
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn pairs(&self) -> &[BasePair] {
        &self.pairs
    }

    /// Per-base pairing partners, 1-based, with 0 marking an unpaired base.
    pub fn partner_table(&self) -> Vec<usize> {
        let mut table = vec![0; self.length];
        for pair in &self.pairs {
            table[pair.i - 1] = pair.j;
            table[pair.j - 1] = pair.i;
        }
        table
    }

    /// Renders the structure in dot-bracket notation.
    ///
    /// Nested pairs use `()`. A pair that crosses every bracket level already in use is promoted
    /// to the next bracket type (`[]`, `{}`, `<>`), so pseudoknots survive a round trip.
    pub fn dot_bracket(&self) -> String {
        let mut symbols = vec!['.'; self.length];
        let mut levels: Vec<Vec<BasePair>> = Vec::new();
        for pair in &self.pairs {
            let level = levels
                .iter()
                .position(|placed| !placed.iter().any(|p| p.crosses(pair)))
                .unwrap_or(levels.len());
            if level == levels.len() {
                levels.push(Vec::new());
            }
            levels[level].push(*pair);
            let (open, close) = BRACKETS[level.min(BRACKETS.len() - 1)];
            symbols[pair.i - 1] = open;
            symbols[pair.j - 1] = close;
        }
        symbols.into_iter().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SecondaryStructureRecord {
    length: usize,
    dot_bracket: String,
    pairs: Vec<[usize; 2]>,
}

impl From<SecondaryStructure> for SecondaryStructureRecord {
    fn from(structure: SecondaryStructure) -> Self {
        Self {
            length: structure.length,
            dot_bracket: structure.dot_bracket(),
            pairs: structure.pairs.iter().map(|p| [p.i, p.j]).collect(),
        }
    }
}

impl TryFrom<SecondaryStructureRecord> for SecondaryStructure {
    type Error = SecondaryStructureError;

    fn try_from(record: SecondaryStructureRecord) -> Result<Self, Self::Error> {
        let found = record.dot_bracket.chars().count();
        if found != record.length {
            return Err(SecondaryStructureError::LengthMismatch {
                expected: record.length,
                found,
            });
        }
        Self::from_pairs(record.length, record.pairs.into_iter().map(|[i, j]| (i, j)))
    }
}
