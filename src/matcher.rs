use log::warn;

use crate::metric::Metric;
use crate::store::PersonRecord;

/// Winning candidate of a registry scan.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    pub name: String,
    pub confidence: f32,
}

/// Linear scan over `candidates` for the one closest to `query`.
///
/// Candidates whose embedding length differs from the query's are skipped
/// (a registry populated by two detector models stays usable; each skip is
/// logged). The minimum is tracked with strict less-than, so the first
/// candidate encountered at a tied minimum wins. A candidate is accepted
/// only when its distance is strictly below `threshold`; none under it
/// yields `None`.
pub fn find_best_match(
    query: &[f32],
    candidates: &[PersonRecord],
    metric: Metric,
    threshold: f32,
) -> Option<BestMatch> {
    let mut best: Option<(f32, &PersonRecord)> = None;

    for record in candidates {
        let distance = match metric.distance(query, &record.embedding) {
            Ok(d) => d,
            Err(e) => {
                warn!("skipping candidate {} ({}): {}", record.id, record.name, e);
                continue;
            }
        };
        match best {
            Some((min, _)) if distance >= min => {}
            _ => best = Some((distance, record)),
        }
    }

    let (distance, record) = best?;
    if distance < threshold {
        Some(BestMatch {
            name: record.name.clone(),
            confidence: metric.confidence(distance),
        })
    } else {
        None
    }
}
