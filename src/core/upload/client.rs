use crate::core::sampler::FrameSet;
use crate::models::{HealthStatus, TyreAnalysisReport};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// 上传请求的硬性超时
pub const UPLOAD_TIMEOUT_SECS: u64 = 60;
/// 开发默认指向本机的分析服务，宿主可覆盖
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// 分析服务的端点配置
#[derive(Debug, Clone)]
pub struct AnalysisEndpoints {
    base_url: String,
}

impl AnalysisEndpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn predict_url(&self) -> String {
        format!("{}/predict", self.base_url)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

impl Default for AnalysisEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// 传输层的原始响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request deadline exceeded")]
    Timeout,
    #[error("no response received: {0}")]
    NoResponse(String),
}

/// multipart 上传中的单个文件分片
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// HTTP 传输能力，便于在测试中脚本化响应
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
    fn post_multipart(&self, url: &str, parts: Vec<UploadPart>)
        -> Result<HttpResponse, TransportError>;
}

/// 生产实现：阻塞式 reqwest 客户端，60 秒超时
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .unwrap();
        Self { client }
    }

    fn classify(error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::NoResponse(error.to_string())
        }
    }

    fn read(response: reqwest::blocking::Response) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response.bytes().map_err(Self::classify)?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self.client.get(url).send().map_err(Self::classify)?;
        Self::read(response)
    }

    fn post_multipart(
        &self,
        url: &str,
        parts: Vec<UploadPart>,
    ) -> Result<HttpResponse, TransportError> {
        let mut form = reqwest::blocking::multipart::Form::new();
        for part in parts {
            let piece = reqwest::blocking::multipart::Part::bytes(part.data)
                .file_name(part.file_name)
                .mime_str(&part.mime_type)
                .map_err(Self::classify)?;
            form = form.part(part.field, piece);
        }

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .map_err(Self::classify)?;
        Self::read(response)
    }
}

/// 按脚本顺序吐响应的测试传输，并记录收到的请求
pub struct MockTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedRequest {
    Get { url: String },
    PostMultipart { url: String, part_count: usize },
}

impl MockTransport {
    pub fn with_responses(responses: Vec<Result<HttpResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next(&self) -> Result<HttpResponse, TransportError> {
        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| Err(TransportError::NoResponse("no scripted response".to_string())))
    }
}

impl HttpTransport for MockTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest::Get { url: url.to_string() });
        }
        self.next()
    }

    fn post_multipart(
        &self,
        url: &str,
        parts: Vec<UploadPart>,
    ) -> Result<HttpResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest::PostMultipart {
                url: url.to_string(),
                part_count: parts.len(),
            });
        }
        self.next()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("upload rejected: payload too large (HTTP 413)")]
    PayloadTooLarge,
    #[error("analysis service error (HTTP {status})")]
    ServerError { status: u16 },
    #[error("analysis request timed out")]
    Timeout,
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("unexpected response from analysis service: {0}")]
    UnexpectedResponse(String),
}

/// 分析服务客户端：连通性探测 + 帧集上传。
/// 不做任何自动重试，重试语义归流水线所有
pub struct AnalysisClient {
    transport: Arc<dyn HttpTransport>,
    endpoints: AnalysisEndpoints,
}

impl AnalysisClient {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: AnalysisEndpoints) -> Self {
        Self { transport, endpoints }
    }

    /// 生产装配：reqwest 传输，base_url 为 None 时取默认端点
    pub fn with_base_url(base_url: Option<String>) -> Self {
        let endpoints = base_url
            .map(AnalysisEndpoints::new)
            .unwrap_or_default();
        Self::new(Arc::new(ReqwestTransport::new()), endpoints)
    }

    /// 探活。任何传输错误都折算为不可达，不向上传播
    pub fn check_health(&self) -> bool {
        let url = self.endpoints.health_url();
        debug!("🚀 GET {}", url);

        match self.transport.get(&url) {
            Ok(response) if response.is_success() => {
                if let Ok(health) = serde_json::from_slice::<HealthStatus>(&response.body) {
                    info!("✅ analysis service reachable: {}", health.status);
                } else {
                    info!("✅ analysis service reachable (HTTP {})", response.status);
                }
                true
            }
            Ok(response) => {
                warn!("⚠️ health probe returned HTTP {}", response.status);
                false
            }
            Err(e) => {
                warn!("❌ health probe failed: {}", e);
                false
            }
        }
    }

    /// 上传帧集并解析报告。失败归类为固定的错误谱系
    pub fn upload(&self, frames: &FrameSet) -> Result<TyreAnalysisReport, UploadError> {
        let url = self.endpoints.predict_url();
        let total_mb = frames.total_estimated_bytes() / (1024.0 * 1024.0);
        info!("🚀 POST {} ({} frames, ~{:.2}MB)", url, frames.len(), total_mb);

        let parts: Vec<UploadPart> = frames
            .iter()
            .enumerate()
            .map(|(index, frame)| UploadPart {
                field: "files".to_string(),
                file_name: format!("frame_{}.jpg", index),
                mime_type: frame.mime_type.clone(),
                data: frame.decoded_bytes(),
            })
            .collect();

        let response = self
            .transport
            .post_multipart(&url, parts)
            .map_err(|e| match e {
                TransportError::Timeout => {
                    error!("❌ upload timed out after {}s", UPLOAD_TIMEOUT_SECS);
                    UploadError::Timeout
                }
                TransportError::NoResponse(message) => {
                    error!("❌ upload got no response: {}", message);
                    UploadError::NetworkUnavailable(message)
                }
            })?;

        debug!("📥 HTTP {} ({} bytes)", response.status, response.body.len());

        if response.status == 413 {
            error!("❌ service rejected payload as too large");
            return Err(UploadError::PayloadTooLarge);
        }
        if response.status >= 500 {
            error!("❌ analysis service error: HTTP {}", response.status);
            return Err(UploadError::ServerError { status: response.status });
        }
        if !response.is_success() {
            error!("❌ unexpected status: HTTP {}", response.status);
            return Err(UploadError::UnexpectedResponse(format!(
                "HTTP {}",
                response.status
            )));
        }

        serde_json::from_slice::<TyreAnalysisReport>(&response.body)
            .map(|report| {
                info!(
                    "✅ analysis complete: overall {} ({} frames)",
                    report.overall.condition.as_str(),
                    report.frames_analyzed
                );
                report
            })
            .map_err(|e| {
                error!("❌ malformed analysis response: {}", e);
                UploadError::UnexpectedResponse(e.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampler::{FrameSet, SampledFrame};
    use crate::models::WearCondition;

    const REPORT_JSON: &str = r#"{
        "analysis": {
            "left":   {"tread_depth": 6.2, "condition": "good", "wear_pattern": "even"},
            "center": {"tread_depth": 4.8, "condition": "fair", "wear_pattern": "center wear"},
            "right":  {"tread_depth": 6.0, "condition": "good", "wear_pattern": "even"}
        },
        "overall": {
            "average_depth": 5.7,
            "condition": "good",
            "recommendation": "Tread is healthy."
        },
        "timestamp": "2024-06-01T10:00:00Z",
        "frames_analyzed": 5
    }"#;

    fn five_frames() -> FrameSet {
        FrameSet::new(
            (0..5u64)
                .map(|i| SampledFrame::from_bytes(i * 1000, "image/jpeg", &[i as u8; 64]))
                .collect(),
        )
    }

    fn client_with(responses: Vec<Result<HttpResponse, TransportError>>) -> (AnalysisClient, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::with_responses(responses));
        let client = AnalysisClient::new(
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
            AnalysisEndpoints::new("http://tyres.test"),
        );
        (client, transport)
    }

    #[test]
    fn test_endpoints_trim_trailing_slash() {
        let endpoints = AnalysisEndpoints::new("http://tyres.test/");
        assert_eq!(endpoints.predict_url(), "http://tyres.test/predict");
        assert_eq!(endpoints.health_url(), "http://tyres.test/health");
    }

    #[test]
    fn test_health_ok() {
        let (client, transport) = client_with(vec![Ok(HttpResponse::new(
            200,
            r#"{"status":"ok","timestamp":"2024-06-01T10:00:00Z"}"#,
        ))]);

        assert!(client.check_health());
        assert_eq!(
            transport.requests(),
            vec![RecordedRequest::Get {
                url: "http://tyres.test/health".to_string()
            }]
        );
    }

    #[test]
    fn test_health_transport_error_is_false() {
        let (client, _) = client_with(vec![Err(TransportError::NoResponse("refused".into()))]);
        assert!(!client.check_health());
    }

    #[test]
    fn test_health_server_error_is_false() {
        let (client, _) = client_with(vec![Ok(HttpResponse::new(503, ""))]);
        assert!(!client.check_health());
    }

    #[test]
    fn test_upload_success_parses_report() {
        let (client, transport) = client_with(vec![Ok(HttpResponse::new(200, REPORT_JSON))]);

        let report = client.upload(&five_frames()).expect("上传应当成功");
        assert_eq!(report.overall.condition, WearCondition::Good);
        assert_eq!(report.frames_analyzed, 5);
        assert_eq!(
            transport.requests(),
            vec![RecordedRequest::PostMultipart {
                url: "http://tyres.test/predict".to_string(),
                part_count: 5,
            }]
        );
    }

    #[test]
    fn test_upload_413_maps_to_payload_too_large() {
        let (client, _) = client_with(vec![Ok(HttpResponse::new(413, ""))]);
        assert_eq!(client.upload(&five_frames()), Err(UploadError::PayloadTooLarge));
    }

    #[test]
    fn test_upload_500_maps_to_server_error() {
        let (client, _) = client_with(vec![Ok(HttpResponse::new(500, "boom"))]);
        assert_eq!(
            client.upload(&five_frames()),
            Err(UploadError::ServerError { status: 500 })
        );
    }

    #[test]
    fn test_upload_timeout_maps_to_timeout() {
        let (client, _) = client_with(vec![Err(TransportError::Timeout)]);
        assert_eq!(client.upload(&five_frames()), Err(UploadError::Timeout));
    }

    #[test]
    fn test_upload_no_response_maps_to_network_unavailable() {
        let (client, _) = client_with(vec![Err(TransportError::NoResponse("dns failure".into()))]);
        assert!(matches!(
            client.upload(&five_frames()),
            Err(UploadError::NetworkUnavailable(message)) if message == "dns failure"
        ));
    }

    #[test]
    fn test_upload_malformed_body_is_unexpected_response() {
        let (client, _) = client_with(vec![Ok(HttpResponse::new(200, "not json"))]);
        assert!(matches!(
            client.upload(&five_frames()),
            Err(UploadError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_upload_empty_body_is_unexpected_response() {
        let (client, _) = client_with(vec![Ok(HttpResponse::new(200, ""))]);
        assert!(matches!(
            client.upload(&five_frames()),
            Err(UploadError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_upload_other_4xx_is_unexpected_response() {
        let (client, _) = client_with(vec![Ok(HttpResponse::new(422, ""))]);
        assert!(matches!(
            client.upload(&five_frames()),
            Err(UploadError::UnexpectedResponse(_))
        ));
    }
}
