//! 录制会话 - 权限门控与定时视频采集
//!
//! 相机、授权对话框等平台能力以 trait 注入，
//! 会话只负责生命周期：就绪判定、计时、上限自停、成品移交

pub mod backend;
pub mod permissions;
pub mod session;

pub use backend::{CaptureBackend, CaptureError, CapturedMedia, HostCaptureBackend, MockCaptureBackend};
pub use permissions::{
    HostPermissionGateway, MockPermissionGateway, Permission, PermissionGateway, PermissionSet,
};
pub use session::{
    RecordingHandle, RecordingSession, SessionConfig, TickListener, MAX_RECORDING_MS,
    TICK_INTERVAL_MS,
};
