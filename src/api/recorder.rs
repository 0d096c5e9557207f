//! 录制控制器 - 宿主相机的 Rust 侧会话管理

use crate::core::capture::{
    CaptureError, HostCaptureBackend, HostPermissionGateway, PermissionSet, RecordingHandle,
    RecordingSession,
};
use flutter_rust_bridge::frb;
use log::info;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// 录制控制器 - 权限门控 + 定时录制生命周期
///
/// 相机本体运行在宿主侧，控制器负责就绪判定、计时、
/// 上限自停与成品移交：
///
/// ```dart
/// final recorder = TreadRecorder.create();
/// recorder.updatePermissions(camera: true, microphone: true, mediaLibrary: true);
/// recorder.markCameraReady();
/// recorder.start();
/// // ... 宿主相机录完后
/// final handle = recorder.finish(mediaUri: uri);
/// ```
#[frb(opaque)]
pub struct TreadRecorder {
    session: Mutex<RecordingSession>,
    gateway: Arc<HostPermissionGateway>,
    backend: Arc<HostCaptureBackend>,
}

impl TreadRecorder {
    #[frb(sync)]
    pub fn create() -> Self {
        crate::init_logging();
        info!("🎥 TreadRecorder: created");

        let gateway = Arc::new(HostPermissionGateway::new());
        let backend = Arc::new(HostCaptureBackend::new());
        let session = RecordingSession::new(
            Arc::clone(&gateway) as _,
            Arc::clone(&backend) as _,
        );

        Self {
            session: Mutex::new(session),
            gateway,
            backend,
        }
    }

    /// 宿主同步三项授权结果。返回当前是否全部就绪
    #[frb(sync)]
    pub fn update_permissions(&self, camera: bool, microphone: bool, media_library: bool) -> bool {
        self.gateway.sync_from_host(PermissionSet {
            camera,
            microphone,
            media_library,
        });
        self.with_session(|session| session.request_permissions().all_granted())
    }

    #[frb(sync)]
    pub fn mark_camera_ready(&self) {
        self.with_session(|session| session.mark_camera_ready());
    }

    #[frb(sync, getter)]
    pub fn is_ready(&self) -> bool {
        self.with_session(|session| session.is_ready())
    }

    #[frb(sync, getter)]
    pub fn is_recording(&self) -> bool {
        self.with_session(|session| session.is_recording())
    }

    /// 录制已进行的毫秒数，UI 以 100ms 分辨率轮询展示
    #[frb(sync, getter)]
    pub fn elapsed_ms(&self) -> u64 {
        self.with_session(|session| session.elapsed_ms())
    }

    /// 会话是否已要求宿主停止相机（到达 5s 上限或手动停止）
    #[frb(sync, getter)]
    pub fn stop_requested(&self) -> bool {
        self.backend.stop_requested()
    }

    /// 开始定时录制。未就绪或已在录制时为无操作
    #[frb(sync)]
    pub fn start(&self) -> Result<(), CaptureError> {
        self.with_session(|session| session.start_recording())
    }

    /// 手动提前停止
    #[frb(sync)]
    pub fn stop(&self) {
        self.with_session(|session| session.stop_recording());
    }

    /// 宿主相机录制完成后移交媒体，阻塞直到会话收尾，
    /// 返回含实际时长的录制成品
    pub fn finish(&self, media_uri: String) -> Result<RecordingHandle, CaptureError> {
        info!("🎥 host delivered media: {}", media_uri);
        self.backend.provide(media_uri);
        self.with_session(|session| session.stop_recording());
        self.await_completion()
    }

    /// 宿主相机报错。收尾后把失败原因作为错误返回
    pub fn report_failure(&self, message: String) -> Result<RecordingHandle, CaptureError> {
        self.backend.fail(message);
        self.with_session(|session| session.stop_recording());
        self.await_completion()
    }

    /// 重拍：无条件丢弃当前录制与已持有的成品
    #[frb(sync)]
    pub fn reset(&self) {
        self.with_session(|session| session.reset_recording());
    }

    /// 最近一次完成的录制成品
    #[frb(sync, getter)]
    pub fn recording(&self) -> Option<RecordingHandle> {
        self.with_session(|session| session.recording().cloned())
    }

    fn await_completion(&self) -> Result<RecordingHandle, CaptureError> {
        if !self.with_session(|session| session.is_recording()) {
            return Err(CaptureError::NoMedia);
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = self.with_session(|session| session.poll_completion()) {
                return result;
            }
            if Instant::now() >= deadline {
                return Err(CaptureError::FinalizeTimeout);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut RecordingSession) -> R) -> R {
        let mut guard = match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl Drop for TreadRecorder {
    fn drop(&mut self) {
        info!("🗑️ TreadRecorder: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_recorder() -> TreadRecorder {
        let recorder = TreadRecorder::create();
        assert!(recorder.update_permissions(true, true, true));
        recorder.mark_camera_ready();
        recorder
    }

    #[test]
    fn test_not_ready_until_permissions_and_camera() {
        let recorder = TreadRecorder::create();
        assert!(!recorder.is_ready());

        assert!(!recorder.update_permissions(true, true, false));
        recorder.mark_camera_ready();
        assert!(!recorder.is_ready());

        assert!(recorder.update_permissions(true, true, true));
        assert!(recorder.is_ready());
    }

    #[test]
    fn test_record_finish_roundtrip() {
        let recorder = ready_recorder();
        recorder.start().unwrap();
        assert!(recorder.is_recording());

        std::thread::sleep(Duration::from_millis(150));
        let handle = recorder
            .finish("file:///tmp/tyre.mp4".to_string())
            .expect("finish should succeed");

        assert_eq!(handle.media_ref, "file:///tmp/tyre.mp4");
        assert!(handle.duration_ms > 0);
        assert!(!recorder.is_recording());
        assert_eq!(recorder.recording(), Some(handle));
    }

    #[test]
    fn test_host_failure_surfaces() {
        let recorder = ready_recorder();
        recorder.start().unwrap();

        let err = recorder
            .report_failure("camera interrupted".to_string())
            .unwrap_err();
        assert!(matches!(err, CaptureError::Backend(_)));
        assert_eq!(recorder.recording(), None);
    }

    #[test]
    fn test_reset_discards_recording() {
        let recorder = ready_recorder();
        recorder.start().unwrap();
        recorder.finish("file:///tmp/tyre.mp4".to_string()).unwrap();

        recorder.reset();
        assert_eq!(recorder.recording(), None);
    }
}
