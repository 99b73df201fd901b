//! Startup wiring for the worker binary.
//!
//! A capability that fails to load is logged and left out. Cameras that need
//! it are rejected when they are registered, and everything else still runs.

use std::path::Path;
use std::sync::Arc;

use parkwatch_ml_client::{BlockingOcr, OcrClient, OcrClientConfig};
use parkwatch_models::{CameraStream, SlotRoi};
use parkwatch_vision::occupancy::{load_roi_config, save_roi_config};
use parkwatch_vision::source::{FfmpegSourceConfig, FfmpegSourceFactory};
use parkwatch_vision::{FrameSourceFactory, PlateReader, PlateReaderConfig, PlateValidator, RoiLayout, VehiclePipeline};
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use crate::config::{load_cameras_config, ServiceConfig};
use crate::error::{WorkerError, WorkerResult};

/// Slot ROIs for indoor scoring.
///
/// A missing document is replaced by the default layout, which is saved to
/// the configured path. An unreadable document leaves indoor cameras
/// without slots.
pub fn load_rois(config: &ServiceConfig) -> Vec<SlotRoi> {
    match config.roi_config.as_deref() {
        Some(path) if path.exists() => match load_roi_config(path) {
            Ok(rois) => rois,
            Err(e) => {
                error!(path = %path.display(), "Indoor scoring disabled: {}", e);
                Vec::new()
            }
        },
        Some(path) => {
            let rois = RoiLayout::default().generate();
            save_default_layout(path, &rois);
            rois
        }
        None => RoiLayout::default().generate(),
    }
}

fn save_default_layout(path: &Path, rois: &[SlotRoi]) {
    if let Err(e) = save_roi_config(path, rois) {
        warn!(path = %path.display(), "Failed to save default ROI layout: {}", e);
    }
}

/// Cameras to register. An unreadable document registers none.
pub fn load_cameras(config: &ServiceConfig) -> Vec<CameraStream> {
    let Some(path) = &config.cameras_config else {
        warn!("CAMERAS_CONFIG not set, no cameras will be registered");
        return Vec::new();
    };
    match load_cameras_config(path) {
        Ok(cameras) => cameras,
        Err(e) => {
            error!(path = %path.display(), "No cameras registered: {}", e);
            Vec::new()
        }
    }
}

/// Frame source factory selected by `FRAME_SOURCE`.
pub fn frame_sources(config: &ServiceConfig) -> Arc<dyn FrameSourceFactory> {
    #[cfg(feature = "opencv")]
    {
        if config.frame_source == "opencv" {
            return Arc::new(parkwatch_vision::source::OpenCvSourceFactory);
        }
    }

    if config.frame_source != "ffmpeg" {
        warn!(frame_source = %config.frame_source, "Unsupported frame source, using ffmpeg");
    }
    Arc::new(FfmpegSourceFactory::new(FfmpegSourceConfig {
        ffmpeg_path: config.ffmpeg_path.clone(),
        width: config.frame_width,
        height: config.frame_height,
    }))
}

/// Vehicle detection for gate cameras, or `None` when unavailable.
pub fn vehicle_pipeline(config: &ServiceConfig) -> Option<VehiclePipeline> {
    match try_vehicle_pipeline(config) {
        Ok(vehicles) => vehicles,
        Err(e) => {
            error!("Vehicle detection disabled: {}", e);
            None
        }
    }
}

#[cfg(feature = "onnx")]
fn try_vehicle_pipeline(config: &ServiceConfig) -> WorkerResult<Option<VehiclePipeline>> {
    use parkwatch_vision::{VehicleClassifier, YoloDetector, YoloDetectorConfig};

    let Some(path) = &config.vehicle_model_path else {
        warn!("VEHICLE_MODEL_PATH not set, gate cameras are disabled");
        return Ok(None);
    };
    let detector = YoloDetector::new(YoloDetectorConfig::vehicles(path.to_string_lossy().into_owned()))?;
    Ok(Some(VehiclePipeline::new(
        Arc::new(detector),
        VehicleClassifier::default(),
        config.vehicle_confidence_threshold,
    )))
}

#[cfg(not(feature = "onnx"))]
fn try_vehicle_pipeline(config: &ServiceConfig) -> WorkerResult<Option<VehiclePipeline>> {
    if config.vehicle_model_path.is_some() || config.plate_model_path.is_some() {
        warn!("Model paths set but the onnx feature is disabled, gate cameras are disabled");
    }
    Ok(None)
}

/// Plate reading for gate cameras, or `None` when unavailable.
///
/// An unhealthy OCR service only warns; reads fail until it recovers.
pub async fn plate_reader(config: &ServiceConfig) -> Option<PlateReader> {
    match try_plate_reader(config).await {
        Ok(reader) => reader,
        Err(e) => {
            error!("Plate reading disabled: {}", e);
            None
        }
    }
}

async fn try_plate_reader(config: &ServiceConfig) -> WorkerResult<Option<PlateReader>> {
    let Some(url) = &config.ocr_service_url else {
        warn!("OCR_SERVICE_URL not set, plate reading is disabled");
        return Ok(None);
    };

    let client = OcrClient::new(OcrClientConfig {
        base_url: url.clone(),
        ..OcrClientConfig::from_env()
    })
    .map_err(|e| WorkerError::config_error(format!("Failed to create OCR client: {}", e)))?;
    match client.health_check().await {
        Ok(true) => info!(url = %url, "OCR service is healthy"),
        Ok(false) => warn!(url = %url, "OCR service is not healthy yet"),
        Err(e) => warn!(url = %url, "OCR service health check failed: {}", e),
    }

    let ocr = BlockingOcr::new(Arc::new(client), Handle::current());
    let reader = PlateReader::new(Arc::new(ocr), PlateValidator::default(), PlateReaderConfig::default());

    #[cfg(feature = "onnx")]
    let reader = match &config.plate_model_path {
        Some(path) => {
            use parkwatch_vision::{YoloDetector, YoloDetectorConfig};
            let detector = YoloDetector::new(YoloDetectorConfig::plates(path.to_string_lossy().into_owned()))?;
            reader.with_region_detector(Arc::new(detector))
        }
        None => reader,
    };

    Ok(Some(reader))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config() -> ServiceConfig {
        ServiceConfig::default()
    }

    #[test]
    fn test_malformed_roi_document_disables_indoor_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"cameras": [{"cameraId": 1, "slots": ["#).unwrap();

        let config = ServiceConfig {
            roi_config: Some(file.path().to_path_buf()),
            ..config()
        };
        assert!(load_rois(&config).is_empty());
    }

    #[test]
    fn test_missing_roi_document_is_generated_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roi.json");
        let config = ServiceConfig {
            roi_config: Some(path.clone()),
            ..config()
        };

        assert_eq!(load_rois(&config).len(), 72);
        assert!(path.exists());
        assert_eq!(load_rois(&config).len(), 72);
    }

    #[test]
    fn test_malformed_camera_document_registers_none() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();

        let config = ServiceConfig {
            cameras_config: Some(file.path().to_path_buf()),
            ..config()
        };
        assert!(load_cameras(&config).is_empty());
        assert!(load_cameras(&ServiceConfig::default()).is_empty());
    }

    #[test]
    fn test_missing_vehicle_model_disables_detection() {
        let config = ServiceConfig {
            vehicle_model_path: Some("/nonexistent/vehicles.onnx".into()),
            ..config()
        };
        assert!(vehicle_pipeline(&config).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_garbled_ocr_health_still_builds_reader() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("up"))
            .expect(1)
            .mount(&server)
            .await;

        let config = ServiceConfig {
            ocr_service_url: Some(server.uri()),
            ..config()
        };
        assert!(plate_reader(&config).await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unreachable_ocr_still_builds_reader() {
        let config = ServiceConfig {
            ocr_service_url: Some("http://127.0.0.1:9".to_string()),
            ..config()
        };
        assert!(plate_reader(&config).await.is_some());
        assert!(plate_reader(&ServiceConfig::default()).await.is_none());
    }
}
