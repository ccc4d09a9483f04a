use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Distance metric used to compare embeddings. Lower is more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// L2 norm of the componentwise difference. Range [0, inf).
    Euclidean,
    /// 1 - cosine similarity. Range [0, 2].
    Cosine,
}

impl Metric {
    /// Matching threshold used when the config does not supply one.
    /// A candidate matches only when its distance is strictly below this.
    pub fn default_threshold(&self) -> f32 {
        match self {
            Metric::Euclidean => 0.6,
            Metric::Cosine => 0.45,
        }
    }

    /// Distance between two embeddings of equal length.
    /// Mismatched lengths are an error, not a panic; callers decide whether
    /// to skip the candidate or abort.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(Error::DimensionMismatch {
                expected: a.len(),
                got: b.len(),
            });
        }
        Ok(match self {
            Metric::Euclidean => euclidean(a, b),
            Metric::Cosine => 1.0 - cosine_sim(a, b),
        })
    }

    /// Turns a winning distance into a user-facing confidence score.
    ///
    /// Euclidean yields `1 - distance` (negative for distances above 1,
    /// deliberately unclamped). Cosine yields a percentage rounded to two
    /// decimals, likewise unclamped.
    pub fn confidence(&self, distance: f32) -> f32 {
        match self {
            Metric::Euclidean => 1.0 - distance,
            Metric::Cosine => ((1.0 - distance) * 100.0 * 100.0).round() / 100.0,
        }
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    let mut sum: f64 = 0.0;
    for i in 0..a.len() {
        let d = a[i] as f64 - b[i] as f64;
        sum += d * d;
    }
    sum.sqrt() as f32
}

/// Cosine similarity between two vectors, clamped to [-1, 1].
/// Uses f64 intermediate precision.
fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    let mut dot: f64 = 0.0;
    let mut na: f64 = 0.0;
    let mut nb: f64 = 0.0;
    for i in 0..a.len() {
        let ai = a[i] as f64;
        let bi = b[i] as f64;
        dot += ai * bi;
        na += ai * ai;
        nb += bi * bi;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    ((dot / denom) as f32).clamp(-1.0, 1.0)
}
