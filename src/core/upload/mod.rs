//! 上传链路 - 本地校验与分析服务客户端

pub mod client;
pub mod validator;

pub use client::{
    AnalysisClient, AnalysisEndpoints, HttpResponse, HttpTransport, MockTransport,
    RecordedRequest, ReqwestTransport, TransportError, UploadError, UploadPart,
    DEFAULT_BASE_URL, UPLOAD_TIMEOUT_SECS,
};
pub use validator::{validate, ValidationError, MAX_PAYLOAD_MB};
