//! YOLOv8 ONNX detector.
//!
//! Used for whole-frame vehicle detection (COCO weights) and for plate
//! region detection (single-class plate weights). Execution provider
//! selection:
//! - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use std::path::Path;
use std::sync::Mutex;

use image::{imageops::FilterType, RgbImage};
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use parkwatch_models::BoundingBox;
use tracing::{debug, info};

use super::{RawDetection, VehicleDetector};
use crate::error::{VisionError, VisionResult};
use crate::plate::PlateRegionDetector;

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

#[derive(Debug, Clone)]
pub struct YoloDetectorConfig {
    pub model_path: String,
    /// Class names in model output order.
    pub class_names: Vec<String>,
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Square model input size
    pub input_size: u32,
}

impl Default for YoloDetectorConfig {
    fn default() -> Self {
        Self::vehicles("models/yolov8n.onnx")
    }
}

impl YoloDetectorConfig {
    /// COCO-trained vehicle detector.
    pub fn vehicles(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            class_names: COCO_CLASSES.iter().map(|c| c.to_string()).collect(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }

    /// Single-class license plate detector.
    pub fn plates(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            class_names: vec!["license_plate".to_string()],
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    class_id: usize,
    confidence: f32,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

/// YOLOv8 detector over ONNX Runtime.
pub struct YoloDetector {
    session: Mutex<Session>,
    config: YoloDetectorConfig,
}

impl YoloDetector {
    /// Load the model. A missing or unreadable model is a load failure.
    pub fn new(config: YoloDetectorConfig) -> VisionResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(VisionError::model_not_found(&config.model_path));
        }
        if config.class_names.is_empty() {
            return Err(VisionError::model_load("Detector needs at least one class name"));
        }

        let session = Mutex::new(create_session(model_path)?);
        info!(
            model_path = %config.model_path,
            classes = config.class_names.len(),
            input_size = config.input_size,
            "YOLO detector initialized"
        );

        Ok(Self { session, config })
    }

    pub fn run(&self, image: &RgbImage) -> VisionResult<Vec<RawDetection>> {
        let input = self.preprocess(image)?;
        let outputs = self.run_inference(input)?;
        let candidates = self.postprocess(&outputs, image.width(), image.height())?;

        let detections: Vec<RawDetection> = non_maximum_suppression(candidates, self.config.nms_threshold)
            .into_iter()
            .map(|c| {
                RawDetection::new(
                    self.config.class_names[c.class_id].clone(),
                    c.confidence,
                    BoundingBox::new(c.x.round() as i32, c.y.round() as i32, c.width.round() as i32, c.height.round() as i32),
                )
            })
            .collect();

        debug!(count = detections.len(), "YOLO detection completed");
        Ok(detections)
    }

    /// Resize to the model input, normalize to [0, 1], NCHW layout.
    fn preprocess(&self, image: &RgbImage) -> VisionResult<Value> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
        let (w, h) = (size as usize, size as usize);

        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let pixel = resized.get_pixel(x as u32, y as u32);
                    chw_data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::internal(format!("Failed to create tensor: {}", e)))
    }

    fn run_inference(&self, input: Value) -> VisionResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| VisionError::detection_failed("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.iter().copied().collect())
    }

    /// YOLOv8 output is `[1, 4 + classes, boxes]` with center-format boxes.
    fn postprocess(&self, outputs: &[f32], orig_width: u32, orig_height: u32) -> VisionResult<Vec<Candidate>> {
        let num_classes = self.config.class_names.len();
        let num_features = 4 + num_classes;
        if outputs.is_empty() || outputs.len() % num_features != 0 {
            return Err(VisionError::detection_failed(format!(
                "Unexpected output size {} for {} features",
                outputs.len(),
                num_features
            )));
        }
        let num_boxes = outputs.len() / num_features;

        let output_array = Array::from_shape_vec((num_features, num_boxes), outputs.to_vec())
            .map_err(|e| VisionError::detection_failed(format!("Failed to reshape output: {}", e)))?;
        let transposed = output_array.t();

        let input_size = self.config.input_size as f32;
        let scale_w = orig_width as f32 / input_size;
        let scale_h = orig_height as f32 / input_size;

        let mut candidates = Vec::new();
        for i in 0..num_boxes {
            let mut best_class = 0;
            let mut best_score = 0.0f32;
            for c in 0..num_classes {
                let score = transposed[[i, 4 + c]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }
            if best_score < self.config.confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (
                transposed[[i, 0]],
                transposed[[i, 1]],
                transposed[[i, 2]],
                transposed[[i, 3]],
            );
            let x = ((cx - w / 2.0) * scale_w).max(0.0);
            let y = ((cy - h / 2.0) * scale_h).max(0.0);

            candidates.push(Candidate {
                class_id: best_class,
                confidence: best_score,
                x,
                y,
                width: (w * scale_w).min(orig_width as f32 - x),
                height: (h * scale_h).min(orig_height as f32 - y),
            });
        }

        Ok(candidates)
    }
}

impl VehicleDetector for YoloDetector {
    fn detect(&self, image: &RgbImage) -> VisionResult<Vec<RawDetection>> {
        self.run(image)
    }

    fn name(&self) -> &'static str {
        "yolov8"
    }
}

impl PlateRegionDetector for YoloDetector {
    fn detect_plates(&self, image: &RgbImage) -> VisionResult<Vec<RawDetection>> {
        self.run(image)
    }
}

/// Greedy per-class NMS, highest confidence first.
fn non_maximum_suppression(mut detections: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[i].class_id != detections[j].class_id {
                continue;
            }
            if iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> VisionResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| VisionError::model_load(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| VisionError::model_load(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VisionError::model_load(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for YOLO detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for YOLO detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for YOLO detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| VisionError::model_load(format!("Failed to load ONNX model: {}", e)))
}
