use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// 平台相机产出的媒体引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedMedia {
    pub media_ref: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture failed to start: {0}")]
    StartFailed(String),
    #[error("capture resource error: {0}")]
    Backend(String),
    #[error("camera produced no media")]
    NoMedia,
    #[error("capture did not finalize in time")]
    FinalizeTimeout,
}

/// 定时录制能力。实际的相机会话在平台侧，
/// 这里只约定启动 / 请求停止 / 收取结果三个动作
pub trait CaptureBackend: Send + Sync {
    /// 开始一段最长 `max_duration_ms` 的录制
    fn begin(&self, max_duration_ms: u64) -> Result<(), CaptureError>;

    /// 请求提前结束，幂等且非阻塞
    fn request_stop(&self);

    /// 收取录制结果；平台尚未产出媒体时返回 None
    fn harvest(&self) -> Option<Result<CapturedMedia, CaptureError>>;
}

/// 宿主桥接后端：相机由宿主驱动，结果经 provide/fail 喂入
pub struct HostCaptureBackend {
    slot: Mutex<Option<Result<CapturedMedia, CaptureError>>>,
    stop_requested: AtomicBool,
}

impl HostCaptureBackend {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// 宿主相机录制完成后喂入媒体引用
    pub fn provide(&self, media_ref: String) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(Ok(CapturedMedia { media_ref }));
        }
    }

    /// 宿主相机报错时喂入失败原因
    pub fn fail(&self, message: String) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(Err(CaptureError::Backend(message)));
        }
    }

    /// 宿主轮询：会话是否已要求停止录制
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

impl Default for HostCaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for HostCaptureBackend {
    fn begin(&self, _max_duration_ms: u64) -> Result<(), CaptureError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn harvest(&self) -> Option<Result<CapturedMedia, CaptureError>> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// 可编排失败场景的测试后端
pub struct MockCaptureBackend {
    begin_error: Option<CaptureError>,
    end_error: Option<CaptureError>,
    media_ref: String,
    begin_count: AtomicU32,
    stop_count: AtomicU32,
    stopped: AtomicBool,
}

impl MockCaptureBackend {
    pub fn succeeding() -> Self {
        Self {
            begin_error: None,
            end_error: None,
            media_ref: "mock://tread-video".to_string(),
            begin_count: AtomicU32::new(0),
            stop_count: AtomicU32::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn failing_begin(message: &str) -> Self {
        Self {
            begin_error: Some(CaptureError::StartFailed(message.to_string())),
            ..Self::succeeding()
        }
    }

    pub fn failing_end(message: &str) -> Self {
        Self {
            end_error: Some(CaptureError::Backend(message.to_string())),
            ..Self::succeeding()
        }
    }

    pub fn begin_count(&self) -> u32 {
        self.begin_count.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for MockCaptureBackend {
    fn begin(&self, _max_duration_ms: u64) -> Result<(), CaptureError> {
        self.begin_count.fetch_add(1, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);
        match &self.begin_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn request_stop(&self) {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn harvest(&self) -> Option<Result<CapturedMedia, CaptureError>> {
        if !self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        match &self.end_error {
            Some(err) => Some(Err(err.clone())),
            None => Some(Ok(CapturedMedia {
                media_ref: self.media_ref.clone(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_backend_roundtrip() {
        let backend = HostCaptureBackend::new();
        backend.begin(5000).unwrap();
        assert!(backend.harvest().is_none());

        backend.provide("file:///tmp/tyre.mp4".to_string());
        backend.request_stop();
        assert!(backend.stop_requested());

        let media = backend.harvest().unwrap().unwrap();
        assert_eq!(media.media_ref, "file:///tmp/tyre.mp4");

        // 结果只能收取一次
        assert!(backend.harvest().is_none());
    }

    #[test]
    fn test_host_backend_begin_clears_stale_result() {
        let backend = HostCaptureBackend::new();
        backend.provide("file:///old.mp4".to_string());
        backend.begin(5000).unwrap();
        assert!(backend.harvest().is_none());
    }

    #[test]
    fn test_host_backend_failure() {
        let backend = HostCaptureBackend::new();
        backend.begin(5000).unwrap();
        backend.fail("encoder died".to_string());

        match backend.harvest() {
            Some(Err(CaptureError::Backend(msg))) => assert_eq!(msg, "encoder died"),
            other => panic!("unexpected harvest result: {:?}", other),
        }
    }

    #[test]
    fn test_mock_backend_harvest_after_stop() {
        let backend = MockCaptureBackend::succeeding();
        backend.begin(5000).unwrap();
        assert!(backend.harvest().is_none());

        backend.request_stop();
        let media = backend.harvest().unwrap().unwrap();
        assert_eq!(media.media_ref, "mock://tread-video");
        assert_eq!(backend.begin_count(), 1);
        assert_eq!(backend.stop_count(), 1);
    }
}
