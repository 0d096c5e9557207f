//! 胎面分析器 - 完整分析流水线的桥接入口

use crate::core::capture::RecordingHandle;
use crate::core::sampler::{FrameSampler, PrefetchedThumbnails, ThumbnailImage};
use crate::core::upload::AnalysisClient;
use crate::models::TyreAnalysisReport;
use crate::pipeline::{AnalysisPipeline, PipelineState};
use flutter_rust_bridge::frb;
use log::info;
use serde::{Deserialize, Serialize};

/// 桥接友好的分析错误：谱系名 + 可展示的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanApiError {
    pub error_type: String,
    pub message: String,
}

impl ScanApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            error_type: "Internal".to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ScanApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.error_type, self.message)
    }
}

impl std::error::Error for ScanApiError {}

/// 宿主抽好的一张缩略图
#[derive(Debug, Clone)]
pub struct ThumbnailPayload {
    pub offset_ms: u64,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// 胎面分析器 - 探活、上传与报告解析
///
/// ```dart
/// final analyzer = TreadAnalyzer.create(baseUrl: null);
/// if (await analyzer.checkConnection()) {
///   final report = await analyzer.analyze(
///     mediaRef: handle.mediaRef,
///     durationMs: handle.durationMs,
///     thumbnails: thumbs,
///   );
/// }
/// ```
#[frb(opaque)]
pub struct TreadAnalyzer {
    pipeline: AnalysisPipeline,
}

impl TreadAnalyzer {
    /// 创建分析器。`base_url` 为空时指向默认服务端点
    #[frb(sync)]
    pub fn create(base_url: Option<String>) -> Self {
        crate::init_logging();
        info!("🔍 TreadAnalyzer: created");

        let client = AnalysisClient::with_base_url(base_url);
        Self {
            pipeline: AnalysisPipeline::new(FrameSampler::new(), client),
        }
    }

    /// 探测分析服务可达性，任何失败都折算为 false。
    /// 单纯探测，不推进流水线状态
    #[frb(dart_async)]
    pub async fn check_connection(&self) -> bool {
        self.pipeline.probe_health()
    }

    /// 对一次完成的录制跑完整分析流水线。
    /// 宿主将平台抽好的 5 张缩略图一并传入
    #[frb(dart_async)]
    pub async fn analyze(
        &self,
        media_ref: String,
        duration_ms: u64,
        thumbnails: Vec<ThumbnailPayload>,
    ) -> Result<TyreAnalysisReport, ScanApiError> {
        let handle = RecordingHandle {
            media_ref,
            duration_ms,
        };
        let provider = prefetched(thumbnails);
        Self::unpack(self.pipeline.run(&handle, &provider))
    }

    /// 失败后的重试：丢弃此前所有半成品，整段重来
    #[frb(dart_async)]
    pub async fn retry(
        &self,
        media_ref: String,
        duration_ms: u64,
        thumbnails: Vec<ThumbnailPayload>,
    ) -> Result<TyreAnalysisReport, ScanApiError> {
        let handle = RecordingHandle {
            media_ref,
            duration_ms,
        };
        let provider = prefetched(thumbnails);
        Self::unpack(self.pipeline.retry(&handle, &provider))
    }

    /// 离开结果页后归位
    #[frb(sync)]
    pub fn dismiss(&self) {
        self.pipeline.dismiss();
    }

    /// 当前流水线阶段的简短标签，供进度页轮询
    #[frb(sync, getter)]
    pub fn stage(&self) -> String {
        self.pipeline.state().label().to_string()
    }

    fn unpack(state: PipelineState) -> Result<TyreAnalysisReport, ScanApiError> {
        match state {
            PipelineState::Complete { report } => Ok(report),
            PipelineState::Failed { kind, message } => Err(ScanApiError {
                error_type: kind.as_str().to_string(),
                message,
            }),
            other => Err(ScanApiError::internal(format!(
                "pipeline halted in {} state",
                other.label()
            ))),
        }
    }
}

impl Drop for TreadAnalyzer {
    fn drop(&mut self) {
        info!("🗑️ TreadAnalyzer: released");
    }
}

fn prefetched(thumbnails: Vec<ThumbnailPayload>) -> PrefetchedThumbnails {
    PrefetchedThumbnails::from_pairs(thumbnails.into_iter().map(|t| {
        (
            t.offset_ms,
            ThumbnailImage {
                data: t.data,
                mime_type: t.mime_type,
            },
        )
    }))
}
