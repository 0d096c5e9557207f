use crate::core::capture::backend::{CaptureBackend, CaptureError, CapturedMedia};
use crate::core::capture::permissions::{Permission, PermissionGateway, PermissionSet};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// 单次录制的时长上限
pub const MAX_RECORDING_MS: u64 = 5_000;
/// 录制计时的上报分辨率
pub const TICK_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_duration_ms: u64,
    pub tick_interval_ms: u64,
    /// 请求停止后等待平台产出媒体的时限
    pub finalize_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_duration_ms: MAX_RECORDING_MS,
            tick_interval_ms: TICK_INTERVAL_MS,
            finalize_timeout_ms: 2_000,
        }
    }
}

/// 一次完成录制的不可变产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingHandle {
    pub media_ref: String,
    pub duration_ms: u64,
}

/// 纯展示用途的计时回调，不参与正确性
pub type TickListener = Arc<dyn Fn(u64) + Send + Sync>;

struct ActiveRecording {
    elapsed_ms: Arc<AtomicU64>,
    stop_flag: Arc<AtomicBool>,
    outcome: Arc<Mutex<Option<Result<CapturedMedia, CaptureError>>>>,
    worker: Option<JoinHandle<()>>,
}

impl ActiveRecording {
    fn teardown(mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// 录制会话：权限门控 + 定时采集生命周期。
///
/// 计时线程每个 tick 更新一次耗时，到达上限自动请求停止；
/// 手动 stop 与自动停止共用同一条收尾路径，计时线程绝不越过会话存活
pub struct RecordingSession {
    config: SessionConfig,
    permissions: Arc<dyn PermissionGateway>,
    backend: Arc<dyn CaptureBackend>,
    granted: PermissionSet,
    camera_ready: bool,
    tick_listener: Option<TickListener>,
    active: Option<ActiveRecording>,
    handle: Option<RecordingHandle>,
}

impl RecordingSession {
    pub fn new(permissions: Arc<dyn PermissionGateway>, backend: Arc<dyn CaptureBackend>) -> Self {
        Self::with_config(SessionConfig::default(), permissions, backend)
    }

    pub fn with_config(
        config: SessionConfig,
        permissions: Arc<dyn PermissionGateway>,
        backend: Arc<dyn CaptureBackend>,
    ) -> Self {
        Self {
            config,
            permissions,
            backend,
            granted: PermissionSet::default(),
            camera_ready: false,
            tick_listener: None,
            active: None,
            handle: None,
        }
    }

    /// 请求全部三项授权并缓存结果，可安全重复调用
    pub fn request_permissions(&mut self) -> PermissionSet {
        let mut granted = PermissionSet::default();
        for permission in Permission::ALL {
            granted.set(permission, self.permissions.request(permission));
        }
        if !granted.all_granted() {
            info!("🔒 permissions incomplete: {:?}", granted);
        }
        self.granted = granted;
        granted
    }

    pub fn permissions(&self) -> PermissionSet {
        self.granted
    }

    pub fn mark_camera_ready(&mut self) {
        self.camera_ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.granted.all_granted() && self.camera_ready
    }

    pub fn set_tick_listener(&mut self, listener: TickListener) {
        self.tick_listener = Some(listener);
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn elapsed_ms(&self) -> u64 {
        match &self.active {
            Some(active) => active.elapsed_ms.load(Ordering::SeqCst),
            None => self.handle.as_ref().map(|h| h.duration_ms).unwrap_or(0),
        }
    }

    pub fn recording(&self) -> Option<&RecordingHandle> {
        self.handle.as_ref()
    }

    pub fn take_recording(&mut self) -> Option<RecordingHandle> {
        self.handle.take()
    }

    /// 开始一段定时录制。已在录制或未就绪时为无操作
    pub fn start_recording(&mut self) -> Result<(), CaptureError> {
        if self.is_recording() {
            warn!("🎬 start ignored: already recording");
            return Ok(());
        }
        if !self.is_ready() {
            warn!("🎬 start ignored: session not ready (permissions or camera)");
            return Ok(());
        }

        self.handle = None;
        self.backend.begin(self.config.max_duration_ms).map_err(|e| {
            error!("❌ capture failed to start: {}", e);
            e
        })?;

        info!(
            "🎬 recording started (ceiling {}ms)",
            self.config.max_duration_ms
        );

        let elapsed_ms = Arc::new(AtomicU64::new(0));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let outcome = Arc::new(Mutex::new(None));

        let worker = spawn_recording_worker(
            self.config.clone(),
            Arc::clone(&self.backend),
            Arc::clone(&elapsed_ms),
            Arc::clone(&stop_flag),
            Arc::clone(&outcome),
            self.tick_listener.clone(),
        );

        self.active = Some(ActiveRecording {
            elapsed_ms,
            stop_flag,
            outcome,
            worker: Some(worker),
        });
        Ok(())
    }

    /// 请求提前结束录制，实际收尾由计时线程完成
    pub fn stop_recording(&mut self) {
        if let Some(active) = &self.active {
            debug!("🛑 stop requested at {}ms", active.elapsed_ms.load(Ordering::SeqCst));
            active.stop_flag.store(true, Ordering::SeqCst);
        }
    }

    /// 收取录制结果。宿主事件循环轮询调用；
    /// 未完成时返回 None，完成后恰好返回一次
    pub fn poll_completion(&mut self) -> Option<Result<RecordingHandle, CaptureError>> {
        let finished = {
            let active = self.active.as_ref()?;
            let outcome = active.outcome.lock().ok()?;
            outcome.is_some()
        };
        if !finished {
            return None;
        }

        let mut active = self.active.take()?;
        if let Some(worker) = active.worker.take() {
            let _ = worker.join();
        }
        let result = active.outcome.lock().ok()?.take()?;
        let duration_ms = active
            .elapsed_ms
            .load(Ordering::SeqCst)
            .min(self.config.max_duration_ms);

        match result {
            Ok(media) => {
                let handle = RecordingHandle {
                    media_ref: media.media_ref,
                    duration_ms,
                };
                info!("✅ recording complete: {}ms -> {}", duration_ms, handle.media_ref);
                self.handle = Some(handle.clone());
                Some(Ok(handle))
            }
            Err(err) => {
                error!("❌ recording failed: {}", err);
                self.handle = None;
                Some(Err(err))
            }
        }
    }

    /// 无条件丢弃当前录制与持有的成品（用于重拍）
    pub fn reset_recording(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("🗑️ discarding in-flight recording");
            active.teardown();
        }
        self.handle = None;
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.teardown();
        }
    }
}

fn spawn_recording_worker(
    config: SessionConfig,
    backend: Arc<dyn CaptureBackend>,
    elapsed_ms: Arc<AtomicU64>,
    stop_flag: Arc<AtomicBool>,
    outcome: Arc<Mutex<Option<Result<CapturedMedia, CaptureError>>>>,
    tick_listener: Option<TickListener>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let started = Instant::now();
        let tick = Duration::from_millis(config.tick_interval_ms);

        loop {
            std::thread::sleep(tick);
            let raw_elapsed = started.elapsed().as_millis() as u64;
            let capped = raw_elapsed.min(config.max_duration_ms);
            elapsed_ms.store(capped, Ordering::SeqCst);
            if let Some(listener) = &tick_listener {
                listener(capped);
            }

            if stop_flag.load(Ordering::SeqCst) {
                break;
            }
            if raw_elapsed >= config.max_duration_ms {
                debug!("⏱️ recording ceiling reached, auto-stopping");
                break;
            }
        }

        backend.request_stop();

        let deadline = Instant::now() + Duration::from_millis(config.finalize_timeout_ms);
        let result = loop {
            if let Some(result) = backend.harvest() {
                break result;
            }
            if Instant::now() >= deadline {
                break Err(CaptureError::FinalizeTimeout);
            }
            std::thread::sleep(Duration::from_millis(10));
        };

        if let Ok(mut slot) = outcome.lock() {
            *slot = Some(result);
        }
    })
}
