use crate::engine::error::PipelineError;
use std::collections::BTreeMap;

/// Derives the equilibrium pairing from a per-frame pairing trajectory.
///
/// `frames` holds one partner table per frame (1-based partners, 0 = unpaired). For every base
/// the partner seen in most frames wins, with ties going to the smaller partner value (so
/// "unpaired" wins a tie against any pairing). Only mutually consistent pairs are kept.
pub fn equilibrium_partners(
    frames: &[Vec<usize>],
    length: usize,
) -> Result<Vec<usize>, PipelineError> {
    if frames.is_empty() {
        return Err(PipelineError::malformed_output(
            "trajectory analysis",
            "pairing trajectory has no frames",
        ));
    }

    let mut counts: Vec<BTreeMap<usize, usize>> = vec![BTreeMap::new(); length];
    for (index, frame) in frames.iter().enumerate() {
        if frame.len() != length {
            return Err(PipelineError::malformed_output(
                "trajectory analysis",
                format!("frame {index} covers {} bases, expected {length}", frame.len()),
            ));
        }
        for (base, &partner) in frame.iter().enumerate() {
            if partner > length || partner == base + 1 {
                return Err(PipelineError::malformed_output(
                    "trajectory analysis",
                    format!("frame {index} pairs base {} with invalid partner {partner}", base + 1),
                ));
            }
            *counts[base].entry(partner).or_default() += 1;
        }
    }

    let modal: Vec<usize> = counts
        .iter()
        .map(|tally| {
            let mut best = (0, 0);
            for (&partner, &count) in tally {
                if count > best.1 {
                    best = (partner, count);
                }
            }
            best.0
        })
        .collect();

    Ok(modal
        .iter()
        .enumerate()
        .map(|(base, &partner)| {
            if partner != 0 && modal[partner - 1] == base + 1 {
                partner
            } else {
                0
            }
        })
        .collect())
}

/// A symmetric distance between two pairing-partner tables.
///
/// Implementations must be reflexive: comparing a table with itself yields zero.
pub trait StructureComparator {
    fn distance(&self, predicted: &[usize], observed: &[usize]) -> Result<f64, PipelineError>;
}

/// Fraction of bases whose pairing partner differs between the two tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartnerMismatch;

impl StructureComparator for PartnerMismatch {
    fn distance(&self, predicted: &[usize], observed: &[usize]) -> Result<f64, PipelineError> {
        if predicted.len() != observed.len() {
            return Err(PipelineError::Configuration(format!(
                "cannot compare pairings of {} and {} bases",
                predicted.len(),
                observed.len()
            )));
        }
        if predicted.is_empty() {
            return Ok(0.0);
        }
        let differing = predicted
            .iter()
            .zip(observed)
            .filter(|(a, b)| a != b)
            .count();
        Ok(differing as f64 / predicted.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modal_partner_wins_across_frames() {
        let frames = vec![
            vec![4, 3, 2, 1],
            vec![4, 0, 0, 1],
            vec![4, 3, 2, 1],
        ];
        assert_eq!(equilibrium_partners(&frames, 4).unwrap(), vec![4, 3, 2, 1]);
    }

    #[test]
    fn ties_resolve_to_the_smaller_partner() {
        let frames = vec![vec![2, 1, 0], vec![0, 0, 0]];
        assert_eq!(equilibrium_partners(&frames, 3).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn one_sided_pairs_are_dropped() {
        // Base 1 mostly pairs with 3, but base 3 mostly sits unpaired.
        let frames = vec![vec![3, 0, 1], vec![3, 0, 0], vec![3, 0, 0]];
        assert_eq!(equilibrium_partners(&frames, 3).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn invalid_frames_are_malformed_output() {
        assert!(equilibrium_partners(&[], 3).is_err());
        assert!(equilibrium_partners(&[vec![0, 0]], 3).is_err());
        assert!(equilibrium_partners(&[vec![1, 0, 0]], 3).is_err());
        assert!(equilibrium_partners(&[vec![9, 0, 0]], 3).is_err());
    }

    #[test]
    fn mismatch_is_reflexive() {
        let table = vec![6, 5, 0, 0, 2, 1];
        assert_eq!(PartnerMismatch.distance(&table, &table).unwrap(), 0.0);
        assert_eq!(PartnerMismatch.distance(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn mismatch_is_symmetric_fraction_of_differing_bases() {
        let predicted = vec![4, 3, 2, 1];
        let observed = vec![4, 0, 0, 1];
        assert_eq!(PartnerMismatch.distance(&predicted, &observed).unwrap(), 0.5);
        assert_eq!(PartnerMismatch.distance(&observed, &predicted).unwrap(), 0.5);
    }

    #[test]
    fn mismatch_rejects_tables_of_different_length() {
        let err = PartnerMismatch.distance(&[0, 0], &[0]).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
