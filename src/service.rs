use image::DynamicImage;
use log::{debug, info};
use serde::Serialize;

use crate::detector::{Detection, FaceDetector, Region};
use crate::error::{Error, Result};
use crate::matcher::find_best_match;
use crate::metric::Metric;
use crate::store::{FaceStore, PersonRecord};

/// Detections narrower or shorter than this are dropped before matching;
/// too small to produce a reliable embedding.
pub const MIN_FACE_SIZE: u32 = 60;

/// Sentinel name for a face that matched nobody under the threshold.
pub const UNKNOWN: &str = "Unknown";

/// Per-face recognition result, carrying the detection's region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatch {
    pub name: String,
    pub confidence: f32,
    #[serde(flatten)]
    pub region: Region,
}

/// Validates and enrolls one face under `name`.
///
/// When the detector reports several faces, the first detection is the one
/// enrolled. Each call appends exactly one record; enrolling the same name
/// twice accumulates two independent match targets.
pub async fn register_face(
    store: &FaceStore,
    detector: &dyn FaceDetector,
    name: &str,
    image: &DynamicImage,
) -> Result<PersonRecord> {
    if name.is_empty() {
        return Err(Error::Validation("name must not be empty"));
    }

    let detections = detector.represent(image).await?;
    let embedding = &detections.first().ok_or(Error::NoFaceDetected)?.embedding;

    let record = store.append(name, embedding)?;
    info!(
        "registered {} (id {}, {} dims)",
        record.name,
        record.id,
        record.embedding.len()
    );
    Ok(record)
}

/// Classifies each detection against the full registry snapshot.
///
/// Detections failing the size gate are excluded from the output entirely.
/// The rest are processed independently (two faces may legitimately match
/// the same identity) and results keep the input detection order. A registry
/// with zero enrolled identities is a reportable condition, not an
/// all-"Unknown" answer.
pub fn recognize_faces(
    detections: &[Detection],
    registry: &[PersonRecord],
    metric: Metric,
    threshold: f32,
) -> Result<Vec<FaceMatch>> {
    if registry.is_empty() {
        return Err(Error::EmptyRegistry);
    }

    let mut faces = Vec::new();
    for detection in detections {
        let region = detection.region;
        if region.width < MIN_FACE_SIZE || region.height < MIN_FACE_SIZE {
            debug!(
                "dropping {}x{} detection at ({}, {}): below size gate",
                region.width, region.height, region.x, region.y
            );
            continue;
        }

        let face = match find_best_match(&detection.embedding, registry, metric, threshold) {
            Some(best) => FaceMatch {
                name: best.name,
                confidence: best.confidence,
                region,
            },
            None => FaceMatch {
                name: UNKNOWN.to_string(),
                confidence: 0.0,
                region,
            },
        };
        faces.push(face);
    }
    Ok(faces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubDetector(Vec<Detection>);

    #[async_trait]
    impl FaceDetector for StubDetector {
        async fn represent(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
            if self.0.is_empty() {
                return Err(Error::NoFaceDetected);
            }
            Ok(self.0.clone())
        }
    }

    fn detection(embedding: &[f32], width: u32, height: u32) -> Detection {
        Detection {
            embedding: embedding.to_vec(),
            region: Region {
                x: 10,
                y: 20,
                width,
                height,
            },
        }
    }

    fn registry(entries: &[(&str, &[f32])]) -> Vec<PersonRecord> {
        entries
            .iter()
            .enumerate()
            .map(|(i, (name, embedding))| PersonRecord {
                id: i as i64 + 1,
                name: name.to_string(),
                embedding: embedding.to_vec(),
            })
            .collect()
    }

    #[test]
    fn empty_registry_is_an_error() {
        let detections = vec![detection(&[1.0, 0.0], 100, 100)];
        match recognize_faces(&detections, &[], Metric::Euclidean, 0.6) {
            Err(Error::EmptyRegistry) => {}
            other => panic!("expected EmptyRegistry, got {other:?}"),
        }
    }

    #[test]
    fn small_detections_are_excluded_entirely() {
        let reg = registry(&[("alice", &[1.0, 0.0])]);
        let detections = vec![
            detection(&[1.0, 0.0], 50, 80),  // fails the gate
            detection(&[1.0, 0.0], 60, 60),  // exactly at the floor: included
            detection(&[1.0, 0.0], 80, 50),  // fails on height
        ];
        let faces = recognize_faces(&detections, &reg, Metric::Euclidean, 0.6).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].name, "alice");
    }

    #[test]
    fn unmatched_faces_come_back_unknown_with_zero_confidence() {
        let reg = registry(&[("alice", &[1.0, 0.0])]);
        let detections = vec![detection(&[-5.0, 4.0], 100, 100)];
        let faces = recognize_faces(&detections, &reg, Metric::Euclidean, 0.6).unwrap();
        assert_eq!(faces[0].name, UNKNOWN);
        assert_eq!(faces[0].confidence, 0.0);
    }

    #[test]
    fn results_keep_detection_order_and_regions() {
        let reg = registry(&[("alice", &[1.0, 0.0]), ("bob", &[0.0, 1.0])]);
        let mut first = detection(&[0.0, 0.9], 100, 100);
        first.region.x = 1;
        let mut second = detection(&[0.9, 0.0], 100, 100);
        second.region.x = 2;

        let faces = recognize_faces(&[first, second], &reg, Metric::Euclidean, 0.6).unwrap();
        assert_eq!(faces[0].name, "bob");
        assert_eq!(faces[0].region.x, 1);
        assert_eq!(faces[1].name, "alice");
        assert_eq!(faces[1].region.x, 2);
    }

    #[test]
    fn two_faces_may_match_the_same_identity() {
        let reg = registry(&[("alice", &[1.0, 0.0])]);
        let detections = vec![
            detection(&[0.95, 0.0], 100, 100),
            detection(&[1.05, 0.0], 100, 100),
        ];
        let faces = recognize_faces(&detections, &reg, Metric::Euclidean, 0.6).unwrap();
        assert_eq!(faces.len(), 2);
        assert!(faces.iter().all(|f| f.name == "alice"));
    }

    #[test]
    fn cosine_end_to_end_scenario() {
        // alice and bob sit at cosine distance 0.9 from each other.
        let alice = [1.0, 0.0, 0.0];
        let bob = [0.1, 0.994_987_4, 0.0];
        let d = Metric::Cosine.distance(&alice, &bob).unwrap();
        assert!((d - 0.9).abs() < 1e-6);

        let reg = registry(&[("Alice", &alice), ("Bob", &bob)]);

        // Querying with alice's own embedding matches at full confidence.
        let faces = recognize_faces(
            &[detection(&alice, 100, 100)],
            &reg,
            Metric::Cosine,
            0.45,
        )
        .unwrap();
        assert_eq!(faces[0].name, "Alice");
        assert_eq!(faces[0].confidence, 100.0);

        // A vector far from both stays Unknown at confidence 0.
        let faces = recognize_faces(
            &[detection(&[0.0, 0.0, 1.0], 100, 100)],
            &reg,
            Metric::Cosine,
            0.45,
        )
        .unwrap();
        assert_eq!(faces[0].name, UNKNOWN);
        assert_eq!(faces[0].confidence, 0.0);
    }

    #[tokio::test]
    async fn register_rejects_empty_name() {
        let store = FaceStore::open_in_memory().unwrap();
        let det = StubDetector(vec![detection(&[1.0], 100, 100)]);
        let img = DynamicImage::new_rgb8(1, 1);
        match register_face(&store, &det, "", &img).await {
            Err(Error::Validation(_)) => {}
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_propagates_no_face_detected() {
        let store = FaceStore::open_in_memory().unwrap();
        let det = StubDetector(vec![]);
        let img = DynamicImage::new_rgb8(1, 1);
        match register_face(&store, &det, "alice", &img).await {
            Err(Error::NoFaceDetected) => {}
            other => panic!("expected NoFaceDetected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_enrolls_the_first_detection() {
        let store = FaceStore::open_in_memory().unwrap();
        let det = StubDetector(vec![
            detection(&[1.0, 2.0], 100, 100),
            detection(&[9.0, 9.0], 100, 100),
        ]);
        let img = DynamicImage::new_rgb8(1, 1);
        let record = register_face(&store, &det, "alice", &img).await.unwrap();
        assert_eq!(record.embedding, vec![1.0, 2.0]);
        assert_eq!(store.all().unwrap().len(), 1);
    }
}
