//! SCRFD face detector via ONNX Runtime.
//!
//! Implements the SCRFD (Sample and Computation Redistribution for Efficient Face
//! Detection) model with 3-stride anchor-free decoding and NMS post-processing.
//! The detection resolution is set per instance with [`FaceDetector::set_input_size`].

use crate::types::{BoundingBox, DecodedImage, DetSize};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;
/// Largest detection canvas accepted, in pixels (4096 x 4096).
const MAX_CANVAS_PIXELS: u64 = 4096 * 4096;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download buffalo_l from insightface and set FACEMBED_MODEL_DIR")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("detection size not set; call prepare() before detecting")]
    InputSizeNotSet,
    #[error("cannot detect on an empty {0}x{1} image")]
    EmptyImage(u32, u32),
    #[error("detection size {}x{} exceeds the 4096x4096 canvas limit", .0.width, .0.height)]
    CanvasTooLarge(DetSize),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Output tensor indices for one stride: (score_idx, bbox_idx, kps_idx).
type StrideOutputIndices = (usize, usize, usize);

/// Placement of the source image inside the detection canvas.
///
/// The resized image sits at the top-left corner; the remainder is zero-filled.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CanvasFit {
    new_width: u32,
    new_height: u32,
    /// Canvas pixels per source pixel.
    scale: f32,
}

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    input_size: Option<DetSize>,
    /// Per-stride output indices [(score, bbox, kps)] for strides [8, 16, 32].
    /// Discovered by name at load time; falls back to positional ordering.
    stride_indices: [StrideOutputIndices; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str, intra_threads: usize) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        let num_outputs = output_names.len();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if num_outputs < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides × score/bbox/kps), got {num_outputs}"
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            input_size: None,
            stride_indices,
        })
    }

    /// Set the detection resolution every input is resized into.
    ///
    /// Canvases above 4096x4096 pixels are rejected before any tensor is
    /// allocated.
    pub fn set_input_size(&mut self, size: DetSize) -> Result<(), DetectorError> {
        check_canvas(size)?;
        tracing::debug!(width = size.width, height = size.height, "SCRFD input size set");
        self.input_size = Some(size);
        Ok(())
    }

    pub fn input_size(&self) -> Option<DetSize> {
        self.input_size
    }

    /// Detect faces in an RGB image, returning bounding boxes sorted by confidence.
    pub fn detect(&mut self, image: &DecodedImage) -> Result<Vec<BoundingBox>, DetectorError> {
        let size = self.input_size.ok_or(DetectorError::InputSizeNotSet)?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::EmptyImage(width, height));
        }
        check_canvas(size)?;

        let fit = fit_to_canvas(width, height, size);
        let input = preprocess(image, size, &fit);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut all_detections = Vec::new();

        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[kps_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            let dets = decode_stride(
                scores,
                bboxes,
                kps,
                stride,
                size,
                fit.scale,
                SCRFD_CONFIDENCE_THRESHOLD,
            )?;
            all_detections.extend(dets);
        }

        let mut result = nms(all_detections, SCRFD_NMS_THRESHOLD);
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        tracing::debug!(faces = result.len(), width, height, "SCRFD detection complete");
        Ok(result)
    }
}

fn check_canvas(size: DetSize) -> Result<(), DetectorError> {
    match (size.width as u64).checked_mul(size.height as u64) {
        Some(pixels) if pixels <= MAX_CANVAS_PIXELS => Ok(()),
        _ => Err(DetectorError::CanvasTooLarge(size)),
    }
}

/// Fit the source dimensions into the detection canvas, preserving aspect ratio.
fn fit_to_canvas(width: u32, height: u32, canvas: DetSize) -> CanvasFit {
    let im_ratio = height as f32 / width as f32;
    let model_ratio = canvas.height as f32 / canvas.width as f32;

    let (new_width, new_height) = if im_ratio > model_ratio {
        let new_height = canvas.height;
        ((new_height as f32 / im_ratio) as u32, new_height)
    } else {
        let new_width = canvas.width;
        (new_width, (new_width as f32 * im_ratio) as u32)
    };
    let new_width = new_width.clamp(1, canvas.width);
    let new_height = new_height.clamp(1, canvas.height);

    CanvasFit {
        new_width,
        new_height,
        scale: new_height as f32 / height as f32,
    }
}

/// Resize into the canvas and build a normalized NCHW RGB tensor.
///
/// Pixels outside the resized region stay at zero intensity.
fn preprocess(image: &DecodedImage, canvas: DetSize, fit: &CanvasFit) -> Array4<f32> {
    let resized = resize_bilinear(image, fit.new_width, fit.new_height);

    let (cw, ch) = (canvas.width as usize, canvas.height as usize);
    let background = (0.0 - SCRFD_MEAN) / SCRFD_STD;
    let mut tensor = Array4::<f32>::from_elem((1, 3, ch, cw), background);

    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            tensor[[0, c, y, x]] = (pixel[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    tensor
}

/// Bilinear resize with half-pixel centers and edge clamping.
///
/// Samples only the four nearest source pixels regardless of scale, so
/// downsampling matches OpenCV's `INTER_LINEAR` rather than a widened filter.
fn resize_bilinear(image: &DecodedImage, new_width: u32, new_height: u32) -> RgbImage {
    let (src_w, src_h) = image.dimensions();
    let scale_x = src_w as f32 / new_width as f32;
    let scale_y = src_h as f32 / new_height as f32;

    // Left/top neighbour and weight of the right/bottom one, per axis.
    let taps = |dst: u32, scale: f32, src_len: u32| -> (u32, u32, f32) {
        let pos = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
        let lo = (pos.floor() as u32).min(src_len - 1);
        let hi = (lo + 1).min(src_len - 1);
        let frac = if hi == lo { 0.0 } else { pos - lo as f32 };
        (lo, hi, frac)
    };

    let cols: Vec<_> = (0..new_width).map(|x| taps(x, scale_x, src_w)).collect();

    let mut out = RgbImage::new(new_width, new_height);
    for y in 0..new_height {
        let (y0, y1, fy) = taps(y, scale_y, src_h);
        for (x, &(x0, x1, fx)) in cols.iter().enumerate() {
            let p00 = image.get_pixel(x0, y0);
            let p10 = image.get_pixel(x1, y0);
            let p01 = image.get_pixel(x0, y1);
            let p11 = image.get_pixel(x1, y1);
            let mut px = [0u8; 3];
            for c in 0..3 {
                let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
                let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
                px[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
            }
            out.put_pixel(x as u32, y, image::Rgb(px));
        }
    }
    out
}

/// Discover output tensor ordering by name.
///
/// SCRFD models may export tensors with named outputs ("score_8", "bbox_16", ...) or
/// generic numeric names. If named pattern is detected, maps them to stride slots.
/// Otherwise falls back to the standard positional ordering:
///   [0-2] = scores (strides 8, 16, 32)
///   [3-5] = bboxes (strides 8, 16, 32)
///   [6-8] = kps    (strides 8, 16, 32)
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named: Option<Vec<StrideOutputIndices>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| Some((find("score", stride)?, find("bbox", stride)?, find("kps", stride)?)))
        .collect();

    match named {
        Some(found) => {
            tracing::info!("SCRFD: using name-based output tensor mapping");
            [found[0], found[1], found[2]]
        }
        None => {
            tracing::info!(
                ?names,
                "SCRFD: output names not recognized, using positional mapping [0-2]=scores, [3-5]=bboxes, [6-8]=kps"
            );
            [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
        }
    }
}

/// Decode detections for a single stride level, mapping back to source pixels.
///
/// The output tensors must cover exactly the `canvas / stride` anchor grid;
/// anything else means the model was exported for a different layout.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    canvas: DetSize,
    scale: f32,
    threshold: f32,
) -> Result<Vec<BoundingBox>, DetectorError> {
    let grid_h = canvas.height as usize / stride;
    let grid_w = canvas.width as usize / stride;
    let num_anchors = grid_h * grid_w * SCRFD_ANCHORS_PER_CELL;
    let s = stride as f32;

    for (name, len, per_anchor) in [("scores", scores.len(), 1), ("bboxes", bboxes.len(), 4), ("kps", kps.len(), 10)] {
        if len != num_anchors * per_anchor {
            return Err(DetectorError::InferenceFailed(format!(
                "stride {stride} {name}: expected {} values for a {grid_w}x{grid_h} grid, got {len}",
                num_anchors * per_anchor
            )));
        }
    }

    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let score = scores[idx];
        if score < threshold {
            continue;
        }

        let anchor_idx = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_cx = (anchor_idx % grid_w) as f32 * s;
        let anchor_cy = (anchor_idx / grid_w) as f32 * s;

        // Distances to the four box edges, in stride units
        let dist = &bboxes[idx * 4..idx * 4 + 4];
        let x1 = (anchor_cx - dist[0] * s) / scale;
        let y1 = (anchor_cy - dist[1] * s) / scale;
        let x2 = (anchor_cx + dist[2] * s) / scale;
        let y2 = (anchor_cy + dist[3] * s) / scale;

        let offsets = &kps[idx * 10..idx * 10 + 10];
        let landmarks: [(f32, f32); 5] = std::array::from_fn(|i| {
            (
                (anchor_cx + offsets[i * 2] * s) / scale,
                (anchor_cy + offsets[i * 2 + 1] * s) / scale,
            )
        });

        detections.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks: Some(landmarks),
        });
    }

    Ok(detections)
}

/// Non-Maximum Suppression: remove overlapping detections.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Compute Intersection-over-Union between two bounding boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union_area = a.width * a.height + b.width * b.height - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}
