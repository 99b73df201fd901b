//! OCR client tests against a mock OCR service.

use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use parkwatch_ml_client::{BlockingOcr, OcrClient, OcrClientConfig, OcrError};
use parkwatch_vision::{PlateOcr, VisionError};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, max_retries: u32) -> OcrClient {
    OcrClient::new(OcrClientConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(2),
        max_retries,
    })
    .unwrap()
}

#[tokio::test]
async fn test_recognize_maps_polygons() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ocr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"bbox": [[2.0, 3.0], [40.0, 3.0], [40.0, 15.0], [2.0, 15.0]], "text": "KA01AB1234", "confidence": 0.91}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let candidates = client_for(&server, 0)
        .recognize(&RgbImage::new(64, 20))
        .await
        .unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].text, "KA01AB1234");
    assert_eq!(candidates[0].polygon.len(), 4);
    assert_eq!(candidates[0].polygon[1], (40.0, 3.0));
}

#[tokio::test]
async fn test_recognize_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ocr"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad image"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server, 3).recognize(&RgbImage::new(8, 8)).await;
    assert!(matches!(result, Err(OcrError::RequestFailed(_))));
}

#[tokio::test]
async fn test_recognize_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ocr"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let result = client_for(&server, 1).recognize(&RgbImage::new(8, 8)).await;
    assert!(matches!(result, Err(OcrError::ServiceUnavailable(_))));
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    assert!(client_for(&server, 0).health_check().await.unwrap());
}

#[tokio::test]
async fn test_health_check_non_json_body_is_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    assert!(!client_for(&server, 0).health_check().await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_adapter_from_worker_thread() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ocr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;

    let ocr = BlockingOcr::new(Arc::new(client_for(&server, 0)), tokio::runtime::Handle::current());
    let result = tokio::task::spawn_blocking(move || ocr.read(&RgbImage::new(8, 8)))
        .await
        .unwrap();
    assert!(result.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_adapter_maps_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ocr"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let ocr = BlockingOcr::new(Arc::new(client_for(&server, 0)), tokio::runtime::Handle::current());
    let result = tokio::task::spawn_blocking(move || ocr.read(&RgbImage::new(8, 8)))
        .await
        .unwrap();
    assert!(matches!(result, Err(VisionError::OcrFailed(_))));
}
