//! USR / USRCAT shape descriptors.
//!
//! A shape is described by 12 moments (`usr_space`, also stored as a point
//! cube for GIST lookups) and, for USRCAT, 60 moments: the same 12 computed
//! over all atoms, hydrophobes, aromatic atoms, acceptors and donors.

use serde::{Deserialize, Serialize};

use crate::error::{CredoError, Result};

pub const USR_SPACE_DIM: usize = 12;
pub const USRCAT_MOMENTS: usize = 60;

/// Per-channel weights: overall shape, hydrophobe, aromatic, acceptor, donor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsrWeights {
    pub ow: f64,
    pub hw: f64,
    pub rw: f64,
    pub aw: f64,
    pub dw: f64,
}

impl Default for UsrWeights {
    fn default() -> Self {
        Self {
            ow: 1.0,
            hw: 0.25,
            rw: 0.25,
            aw: 0.25,
            dw: 0.25,
        }
    }
}

impl UsrWeights {
    /// Shape only; reproduces classic USR.
    pub fn classic() -> Self {
        Self {
            ow: 1.0,
            hw: 0.0,
            rw: 0.0,
            aw: 0.0,
            dw: 0.0,
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.ow, self.hw, self.rw, self.aw, self.dw]
    }
}

/// Parameters of a shape search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsrParams {
    /// Enlargement of the query point cube used as the index probe.
    pub probe_radius: f64,
    pub threshold: f64,
    pub weights: UsrWeights,
}

impl Default for UsrParams {
    fn default() -> Self {
        Self {
            probe_radius: 0.75,
            threshold: 0.5,
            weights: UsrWeights::default(),
        }
    }
}

impl UsrParams {
    pub fn probe_radius(mut self, radius: f64) -> Self {
        self.probe_radius = radius;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn weights(mut self, weights: UsrWeights) -> Self {
        self.weights = weights;
        self
    }
}

pub fn validate_moments(moments: &[f64]) -> Result<()> {
    if moments.len() != USRCAT_MOMENTS {
        return Err(CredoError::invalid(format!(
            "USRCAT moments must have {USRCAT_MOMENTS} components, got {}",
            moments.len()
        )));
    }
    Ok(())
}

pub fn validate_space(space: &[f64]) -> Result<()> {
    if space.len() != USR_SPACE_DIM {
        return Err(CredoError::invalid(format!(
            "USR space must have {USR_SPACE_DIM} components, got {}",
            space.len()
        )));
    }
    Ok(())
}

/// Weighted USRCAT similarity; identical moments score 1.
///
/// Each channel contributes its weight times the mean absolute difference of
/// its 12 moments; the score is `1 / (1 + sum)`. It is a ranking score, not a
/// probability: weights are not normalised, so a negative channel weight lifts
/// it above 1, and the weighted sums computed by `arrayxd_usrcatsim` can
/// exceed 1 as well.
pub fn usrcat_similarity(a: &[f64], b: &[f64], weights: &UsrWeights) -> Result<f64> {
    validate_moments(a)?;
    validate_moments(b)?;

    let distance: f64 = a
        .chunks_exact(USR_SPACE_DIM)
        .zip(b.chunks_exact(USR_SPACE_DIM))
        .zip(weights.to_array())
        .map(|((ca, cb), weight)| {
            let manhattan: f64 = ca.iter().zip(cb).map(|(x, y)| (x - y).abs()).sum();
            weight * manhattan / USR_SPACE_DIM as f64
        })
        .sum();

    Ok(1.0 / (1.0 + distance))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moments(offset: f64) -> Vec<f64> {
        (0..USRCAT_MOMENTS).map(|i| i as f64 * 0.05 + offset).collect()
    }

    #[test]
    fn identical_moments_score_one() {
        let m = moments(0.0);
        let sim = usrcat_similarity(&m, &m, &UsrWeights::default()).expect("similarity");
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn classic_weights_ignore_pharmacophore_channels() {
        let a = moments(0.0);
        let mut b = a.clone();
        for v in &mut b[USR_SPACE_DIM..] {
            *v += 3.0;
        }
        let classic = usrcat_similarity(&a, &b, &UsrWeights::classic()).expect("classic");
        assert!((classic - 1.0).abs() < 1e-12);

        let weighted = usrcat_similarity(&a, &b, &UsrWeights::default()).expect("weighted");
        // four channels, each 0.25 * 3.0
        assert!((weighted - 1.0 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn weighted_scores_are_not_capped_at_one() {
        let a = moments(0.0);
        let mut b = a.clone();
        for v in &mut b[USR_SPACE_DIM..2 * USR_SPACE_DIM] {
            *v += 1.0;
        }
        let weights = UsrWeights {
            hw: -0.5,
            ..UsrWeights::default()
        };
        let sim = usrcat_similarity(&a, &b, &weights).expect("similarity");
        // hydrophobe channel: -0.5 * 1.0
        assert!((sim - 2.0).abs() < 1e-12);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = usrcat_similarity(&[0.0; 12], &moments(0.0), &UsrWeights::default())
            .expect_err("short moments");
        assert!(matches!(err, CredoError::InvalidArgument(_)));
        assert!(validate_space(&[0.0; 12]).is_ok());
        assert!(validate_space(&[0.0; 60]).is_err());
    }

    #[test]
    fn defaults_match_the_documented_search() {
        let params = UsrParams::default();
        assert_eq!(params.probe_radius, 0.75);
        assert_eq!(params.threshold, 0.5);
        assert_eq!(params.weights.to_array(), [1.0, 0.25, 0.25, 0.25, 0.25]);
    }
}
