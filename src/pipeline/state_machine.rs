use crate::core::sampler::FRAME_COUNT;
use crate::core::upload::{UploadError, ValidationError};
use crate::models::TyreAnalysisReport;
use log::warn;

/// 流水线失败的扁平谱系。每个子系统错误在进入
/// 流水线前都恰好映射到其中一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PermissionDenied,
    CaptureFailure,
    FrameExtraction,
    FrameCountMismatch,
    PayloadTooLarge,
    Timeout,
    NetworkUnavailable,
    ServerError,
    UnexpectedResponse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::PermissionDenied => "PermissionDenied",
            FailureKind::CaptureFailure => "CaptureFailure",
            FailureKind::FrameExtraction => "FrameExtractionFailure",
            FailureKind::FrameCountMismatch => "FrameCountMismatch",
            FailureKind::PayloadTooLarge => "PayloadTooLarge",
            FailureKind::Timeout => "Timeout",
            FailureKind::NetworkUnavailable => "NetworkUnavailable",
            FailureKind::ServerError => "ServerError",
            FailureKind::UnexpectedResponse => "UnexpectedResponse",
        }
    }
}

impl From<&ValidationError> for FailureKind {
    fn from(error: &ValidationError) -> Self {
        match error {
            ValidationError::FrameCountMismatch { .. } => FailureKind::FrameCountMismatch,
            ValidationError::PayloadTooLarge { .. } => FailureKind::PayloadTooLarge,
        }
    }
}

impl From<&UploadError> for FailureKind {
    fn from(error: &UploadError) -> Self {
        match error {
            UploadError::PayloadTooLarge => FailureKind::PayloadTooLarge,
            UploadError::ServerError { .. } => FailureKind::ServerError,
            UploadError::Timeout => FailureKind::Timeout,
            UploadError::NetworkUnavailable(_) => FailureKind::NetworkUnavailable,
            UploadError::UnexpectedResponse(_) => FailureKind::UnexpectedResponse,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    Connecting,
    Extracting { completed: usize },
    Analyzing,
    Complete { report: TyreAnalysisReport },
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Start,
    HealthOk,
    HealthFailed,
    FrameReady,
    ExtractionFailed { index: usize, message: String },
    ValidationFailed { kind: FailureKind, message: String },
    UploadSucceeded { report: TyreAnalysisReport },
    UploadFailed { kind: FailureKind, message: String },
    Retry,
    Dismiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineAction {
    None,
    ProbeHealth,
    ExtractFrames,
    UploadFrames,
}

impl PipelineState {
    pub fn new() -> Self {
        PipelineState::Idle
    }

    /// 状态迁移。除 Failed--Retry-->Connecting 外只向前推进；
    /// 不适用于当前状态的事件原地忽略
    pub fn transition(&self, event: PipelineEvent) -> (PipelineState, PipelineAction) {
        match (self, event) {
            (PipelineState::Idle, PipelineEvent::Start) => {
                (PipelineState::Connecting, PipelineAction::ProbeHealth)
            }

            (PipelineState::Connecting, PipelineEvent::HealthOk) => (
                PipelineState::Extracting { completed: 0 },
                PipelineAction::ExtractFrames,
            ),
            (PipelineState::Connecting, PipelineEvent::HealthFailed) => (
                PipelineState::Failed {
                    kind: FailureKind::NetworkUnavailable,
                    message: "analysis service unreachable".to_string(),
                },
                PipelineAction::None,
            ),

            (PipelineState::Extracting { completed }, PipelineEvent::FrameReady) => {
                let done = completed + 1;
                if done >= FRAME_COUNT {
                    (PipelineState::Analyzing, PipelineAction::UploadFrames)
                } else {
                    (
                        PipelineState::Extracting { completed: done },
                        PipelineAction::None,
                    )
                }
            }
            (
                PipelineState::Extracting { .. },
                PipelineEvent::ExtractionFailed { index, message },
            ) => (
                PipelineState::Failed {
                    kind: FailureKind::FrameExtraction,
                    message: format!("frame {}: {}", index, message),
                },
                PipelineAction::None,
            ),

            (PipelineState::Analyzing, PipelineEvent::ValidationFailed { kind, message })
            | (PipelineState::Analyzing, PipelineEvent::UploadFailed { kind, message }) => (
                PipelineState::Failed { kind, message },
                PipelineAction::None,
            ),
            (PipelineState::Analyzing, PipelineEvent::UploadSucceeded { report }) => {
                (PipelineState::Complete { report }, PipelineAction::None)
            }

            (PipelineState::Failed { .. }, PipelineEvent::Retry) => {
                (PipelineState::Connecting, PipelineAction::ProbeHealth)
            }
            (PipelineState::Complete { .. }, PipelineEvent::Dismiss) => {
                (PipelineState::Idle, PipelineAction::None)
            }

            (state, event) => {
                warn!("⏭️ event {:?} ignored in state {:?}", event, state.label());
                (state.clone(), PipelineAction::None)
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Complete { .. } | PipelineState::Failed { .. }
        )
    }

    /// 状态的简短标签，用于日志与宿主进度展示
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Connecting => "connecting",
            PipelineState::Extracting { .. } => "extracting",
            PipelineState::Analyzing => "analyzing",
            PipelineState::Complete { .. } => "complete",
            PipelineState::Failed { .. } => "failed",
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}
