use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// 录制所需的三类平台授权
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Camera,
    Microphone,
    MediaLibrary,
}

impl Permission {
    pub const ALL: [Permission; 3] = [
        Permission::Camera,
        Permission::Microphone,
        Permission::MediaLibrary,
    ];
}

/// 三类授权的当前状态快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionSet {
    pub camera: bool,
    pub microphone: bool,
    pub media_library: bool,
}

impl PermissionSet {
    pub fn granted_all() -> Self {
        Self {
            camera: true,
            microphone: true,
            media_library: true,
        }
    }

    /// 三项全部授权才视为就绪，部分授权等同于未就绪
    pub fn all_granted(&self) -> bool {
        self.camera && self.microphone && self.media_library
    }

    pub fn get(&self, permission: Permission) -> bool {
        match permission {
            Permission::Camera => self.camera,
            Permission::Microphone => self.microphone,
            Permission::MediaLibrary => self.media_library,
        }
    }

    pub fn set(&mut self, permission: Permission, granted: bool) {
        match permission {
            Permission::Camera => self.camera = granted,
            Permission::Microphone => self.microphone = granted,
            Permission::MediaLibrary => self.media_library = granted,
        }
    }
}

/// 平台授权网关。请求必须幂等，可安全重复调用
pub trait PermissionGateway: Send + Sync {
    fn request(&self, permission: Permission) -> bool;
}

/// 按固定模式授权的测试网关
pub struct MockPermissionGateway {
    grant_pattern: Option<Box<dyn Fn(Permission) -> bool + Send + Sync>>,
    request_count: AtomicU32,
}

impl MockPermissionGateway {
    pub fn granting_all() -> Self {
        Self {
            grant_pattern: None,
            request_count: AtomicU32::new(0),
        }
    }

    pub fn denying_all() -> Self {
        Self::with_pattern(|_| false)
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(Permission) -> bool + Send + Sync + 'static,
    {
        Self {
            grant_pattern: Some(Box::new(pattern)),
            request_count: AtomicU32::new(0),
        }
    }

    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::SeqCst)
    }
}

impl PermissionGateway for MockPermissionGateway {
    fn request(&self, permission: Permission) -> bool {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.grant_pattern
            .as_ref()
            .map(|p| p(permission))
            .unwrap_or(true)
    }
}

/// 宿主桥接网关：实际的授权对话框在平台侧弹出，
/// 宿主把结果同步进来，request 只回读最近一次已知状态
#[derive(Default)]
pub struct HostPermissionGateway {
    state: Mutex<PermissionSet>,
}

impl HostPermissionGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync_from_host(&self, granted: PermissionSet) {
        if let Ok(mut state) = self.state.lock() {
            *state = granted;
        }
    }
}

impl PermissionGateway for HostPermissionGateway {
    fn request(&self, permission: Permission) -> bool {
        self.state
            .lock()
            .map(|state| state.get(permission))
            .unwrap_or(false)
    }
}
