use std::io::Cursor;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};

/// Bounding region of a detected face, in pixels of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One face found by the external detector: its bounding region and the
/// fixed-length embedding produced by the extraction model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Detection {
    pub embedding: Vec<f32>,
    #[serde(flatten)]
    pub region: Region,
}

/// The face-detection/embedding-extraction collaborator.
///
/// Its model and failure modes are opaque; this crate only consumes the
/// output contract. Implementations return `Error::NoFaceDetected` when the
/// image contains no usable face, so callers branch on a typed result
/// instead of catching a raised condition.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Detects faces in `image` and returns one `Detection` per face.
    /// Never returns an empty list; zero faces is `Error::NoFaceDetected`.
    async fn represent(&self, image: &DynamicImage) -> Result<Vec<Detection>>;
}

/// Client for an extraction service reachable over HTTP.
///
/// Posts the image as base64-encoded PNG in `{"image": ...}` and expects
/// `{"detections": [{"embedding": [...], "x", "y", "width", "height"}]}`.
pub struct HttpDetector {
    client: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct RepresentResponse {
    detections: Vec<Detection>,
}

impl HttpDetector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl FaceDetector for HttpDetector {
    async fn represent(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| Error::Internal(format!("re-encoding frame: {e}")))?;

        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "image": BASE64.encode(&png) }))
            .send()
            .await?
            .error_for_status()?;

        let parsed: RepresentResponse = response.json().await?;
        if parsed.detections.is_empty() {
            return Err(Error::NoFaceDetected);
        }
        Ok(parsed.detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_parses_with_flattened_region() {
        let raw = r#"{"embedding": [0.1, 0.2], "x": 5, "y": -3, "width": 80, "height": 96}"#;
        let d: Detection = serde_json::from_str(raw).unwrap();
        assert_eq!(d.embedding, vec![0.1, 0.2]);
        assert_eq!(
            d.region,
            Region {
                x: 5,
                y: -3,
                width: 80,
                height: 96
            }
        );
    }
}
