use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, QueryRejection},
        Multipart, Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{PetSegError, Result};
use crate::http::{error::ApiError, state::HttpState};
use crate::pipeline::{decode_image, encode_png, OutputMode, SegmentOptions};
use crate::report::{detected_classes, DetectedClass, SegmentationResponse, SegmentationResult, MODEL_VERSION};
use crate::traits::SegmentationModel;

const TITLE: &str = "Cat & Dog Segmentation API";

#[derive(Debug, Default, Deserialize)]
pub struct SegmentQuery {
    pub mode: Option<OutputMode>,
    pub alpha: Option<f32>,
    pub threshold: Option<f32>,
}

impl SegmentQuery {
    fn options(&self, default_alpha: f32) -> SegmentOptions {
        let defaults = SegmentOptions::default();
        SegmentOptions {
            mode: self.mode.unwrap_or(defaults.mode),
            alpha: self.alpha.unwrap_or(default_alpha),
            threshold: self.threshold.unwrap_or(defaults.threshold),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskFormat {
    #[default]
    Color,
    Gray,
}

#[derive(Debug, Default, Deserialize)]
pub struct MaskQuery {
    pub format: Option<MaskFormat>,
    pub threshold: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    /// base64 encoded image files
    pub images: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArtifactLinks {
    pub input_image: String,
    pub mask: String,
    pub overlay: String,
}

enum SegmentOutput {
    Png {
        bytes: Vec<u8>,
        detected: Vec<DetectedClass>,
    },
    Envelope(SegmentationResult),
}

pub async fn health<M: SegmentationModel + 'static>(State(st): State<HttpState<M>>) -> Json<Value> {
    let segmenter = &st.segmenter;
    Json(json!({
        "status": "ok",
        "model_loaded": segmenter.is_model_loaded(),
        "model_input_size": segmenter.model_input_size().map(|(w, h)| [h, w]),
        "classes": class_labels(&st),
    }))
}

pub async fn info<M: SegmentationModel + 'static>(State(st): State<HttpState<M>>) -> Json<Value> {
    let colors: BTreeMap<String, [u8; 3]> = st
        .segmenter
        .palette()
        .classes()
        .iter()
        .map(|class| (class.label.clone(), class.color))
        .collect();
    Json(json!({
        "title": TITLE,
        "version": env!("CARGO_PKG_VERSION"),
        "model_version": MODEL_VERSION,
        "description": "Semantic segmentation of cat and dog images",
        "endpoints": {
            "/": "GET - health and model status",
            "/segment": "POST - multipart `file`; query mode=color|overlay|both, alpha, threshold",
            "/segment/mask": "POST - multipart `file`; query format=color|gray, threshold",
            "/segment/batch": "POST - JSON {\"images\": [base64, ...]}",
            "/predict": "POST - multipart `file`; saves input, mask and overlay and returns their URLs",
        },
        "class_labels": class_labels(&st),
        "colors": colors,
    }))
}

pub async fn segment<M: SegmentationModel + 'static>(
    State(st): State<HttpState<M>>,
    query: std::result::Result<Query<SegmentQuery>, QueryRejection>,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let started = Instant::now();
    let Query(query) = query.map_err(query_error)?;
    let options = query.options(st.default_alpha);
    options.validate()?;
    ensure_model(&st)?;
    let upload = read_upload(multipart).await?;

    let segmenter = Arc::clone(&st.segmenter);
    let output = run_blocking(move || {
        let segmentation = segmenter.segment_bytes(&upload, options)?;
        let palette = segmenter.palette();
        match options.mode {
            OutputMode::Both => Ok(SegmentOutput::Envelope(
                SegmentationResult::from_segmentation(&segmentation, palette)
                    .with_images(&segmentation)?,
            )),
            OutputMode::Color => Ok(SegmentOutput::Png {
                bytes: encode_png(&segmentation.color_mask)?,
                detected: detected_classes(&segmentation, palette),
            }),
            OutputMode::Overlay => {
                let overlay = segmentation.overlay.as_ref().unwrap_or(&segmentation.color_mask);
                Ok(SegmentOutput::Png {
                    bytes: encode_png(overlay)?,
                    detected: detected_classes(&segmentation, palette),
                })
            }
        }
    })
    .await?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(mode = ?options.mode, elapsed_ms, "segmented upload");
    Ok(match output {
        SegmentOutput::Envelope(result) => {
            Json(SegmentationResponse::new(vec![result], elapsed_ms)).into_response()
        }
        SegmentOutput::Png { bytes, detected } => png_response(bytes, elapsed_ms, &detected),
    })
}

pub async fn segment_mask<M: SegmentationModel + 'static>(
    State(st): State<HttpState<M>>,
    query: std::result::Result<Query<MaskQuery>, QueryRejection>,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let started = Instant::now();
    let Query(query) = query.map_err(query_error)?;
    let options = SegmentOptions {
        mode: OutputMode::Color,
        threshold: query.threshold.unwrap_or(SegmentOptions::default().threshold),
        ..Default::default()
    };
    options.validate()?;
    ensure_model(&st)?;
    let upload = read_upload(multipart).await?;
    let format = query.format.unwrap_or_default();

    let segmenter = Arc::clone(&st.segmenter);
    let (bytes, detected) = run_blocking(move || match format {
        MaskFormat::Color => {
            let segmentation = segmenter.segment_bytes(&upload, options)?;
            Ok((
                encode_png(&segmentation.color_mask)?,
                detected_classes(&segmentation, segmenter.palette()),
            ))
        }
        MaskFormat::Gray => {
            let original = decode_image(&upload)?;
            let (width, height) = original.dimensions();
            let classes = segmenter.classify(&original, options.threshold)?;
            let gray = classes.resize_nearest(width, height).to_gray_image();
            Ok((encode_png(&gray)?, Vec::new()))
        }
    })
    .await?;

    Ok(png_response(bytes, started.elapsed().as_millis() as u64, &detected))
}

pub async fn segment_batch<M: SegmentationModel + 'static>(
    State(st): State<HttpState<M>>,
    query: std::result::Result<Query<SegmentQuery>, QueryRejection>,
    request: std::result::Result<Json<BatchRequest>, JsonRejection>,
) -> std::result::Result<Json<SegmentationResponse>, ApiError> {
    let started = Instant::now();
    let Query(query) = query.map_err(query_error)?;
    let Json(request) = request.map_err(json_error)?;
    let mut options = query.options(st.default_alpha);
    // the envelope always carries both images
    options.mode = OutputMode::Both;
    options.validate()?;
    ensure_model(&st)?;

    let uploads = request
        .images
        .iter()
        .enumerate()
        .map(|(i, encoded)| {
            B64.decode(encoded.trim())
                .map_err(|e| PetSegError::validation("images", format!("entry {i} is not base64: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let segmenter = Arc::clone(&st.segmenter);
    let results = run_blocking(move || {
        segmenter
            .segment_many(&uploads, options)?
            .iter()
            .map(|segmentation| {
                SegmentationResult::from_segmentation(segmentation, segmenter.palette())
                    .with_images(segmentation)
            })
            .collect::<Result<Vec<_>>>()
    })
    .await?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(images = results.len(), elapsed_ms, "segmented batch");
    Ok(Json(SegmentationResponse::new(results, elapsed_ms)))
}

/// Persists input, mask and overlay under the artifact directory and
/// returns links to them.
pub async fn predict_links<M: SegmentationModel + 'static>(
    State(st): State<HttpState<M>>,
    multipart: Multipart,
) -> std::result::Result<Json<ArtifactLinks>, ApiError> {
    ensure_model(&st)?;
    let upload = read_upload(multipart).await?;
    let options = SegmentOptions {
        mode: OutputMode::Both,
        alpha: st.default_alpha,
        ..Default::default()
    };

    let segmenter = Arc::clone(&st.segmenter);
    let artifacts = Arc::clone(&st.artifacts);
    let (input, mask, overlay) = run_blocking(move || {
        if let Err(e) = artifacts.sweep() {
            tracing::warn!(error = %e, "artifact sweep failed");
        }
        let segmentation = segmenter.segment_bytes(&upload, options)?;
        let input = artifacts.save_png("image", &encode_png(&segmentation.original)?)?;
        let mask = artifacts.save_png("mask", &encode_png(&segmentation.color_mask)?)?;
        let overlay_image = segmentation.overlay.as_ref().unwrap_or(&segmentation.color_mask);
        let overlay = artifacts.save_png("overlay", &encode_png(overlay_image)?)?;
        Ok((input, mask, overlay))
    })
    .await?;

    Ok(Json(ArtifactLinks {
        input_image: st.artifact_url(&input),
        mask: st.artifact_url(&mask),
        overlay: st.artifact_url(&overlay),
    }))
}

fn ensure_model<M: SegmentationModel>(st: &HttpState<M>) -> Result<()> {
    if st.segmenter.is_model_loaded() {
        Ok(())
    } else {
        Err(PetSegError::ModelUnavailable {
            reason: "segmentation model not loaded".to_string(),
        })
    }
}

fn class_labels<M: SegmentationModel>(st: &HttpState<M>) -> BTreeMap<usize, String> {
    st.segmenter
        .palette()
        .classes()
        .iter()
        .enumerate()
        .map(|(index, class)| (index, class.label.clone()))
        .collect()
}

/// Reads the `file` field of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>> {
    let invalid = |reason: String| PetSegError::InvalidImage { reason };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("malformed multipart body", e))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if let Some(content_type) = field.content_type() {
            if !content_type.starts_with("image/") {
                return Err(PetSegError::UnsupportedMediaType {
                    content_type: content_type.to_string(),
                });
            }
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error("failed to read upload", e))?;
        return Ok(bytes.to_vec());
    }

    Err(invalid("missing multipart field `file`".to_string()))
}

fn multipart_error(context: &str, e: MultipartError) -> PetSegError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PetSegError::PayloadTooLarge {
            reason: e.body_text(),
        }
    } else {
        PetSegError::InvalidImage {
            reason: format!("{context}: {}", e.body_text()),
        }
    }
}

fn query_error(rejection: QueryRejection) -> PetSegError {
    PetSegError::validation("query", rejection.body_text())
}

fn json_error(rejection: JsonRejection) -> PetSegError {
    match rejection.status() {
        StatusCode::UNSUPPORTED_MEDIA_TYPE => PetSegError::UnsupportedMediaType {
            content_type: rejection.body_text(),
        },
        StatusCode::PAYLOAD_TOO_LARGE => PetSegError::PayloadTooLarge {
            reason: rejection.body_text(),
        },
        _ => PetSegError::validation("body", rejection.body_text()),
    }
}

/// Pipeline work is CPU bound; keep it off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PetSegError::Model {
            operation: "pipeline task".to_string(),
            source: Box::new(e),
        })?
}

fn png_response(bytes: Vec<u8>, elapsed_ms: u64, detected: &[DetectedClass]) -> Response {
    let mut response = ([(header::CONTENT_TYPE, "image/png")], bytes).into_response();
    let headers = response.headers_mut();
    headers.insert("x-execution-time", HeaderValue::from(elapsed_ms));
    headers.insert("x-model-version", HeaderValue::from_static(MODEL_VERSION));
    if !detected.is_empty() {
        match serde_json::to_string(detected)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                HeaderValue::from_str(&escape_non_ascii(&json)).map_err(|e| e.to_string())
            })
        {
            Ok(value) => {
                headers.insert("x-classes-detected", value);
            }
            Err(e) => tracing::warn!(error = %e, "x-classes-detected header dropped"),
        }
    }
    response
}

/// Header values must be visible ASCII; non-ASCII only occurs inside JSON
/// strings, where `\uXXXX` escapes keep the document equivalent.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units).iter() {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}
