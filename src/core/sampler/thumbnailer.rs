use image::ImageOutputFormat;
use log::debug;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// 平台抽帧能力产出的一张编码图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl ThumbnailImage {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            data,
            mime_type: "image/jpeg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ThumbnailError {
    #[error("no thumbnail available at {offset_ms}ms")]
    Unavailable { offset_ms: u64 },
    #[error("thumbnail generation failed: {0}")]
    Generation(String),
}

/// 按时间偏移取帧的外部能力（平台侧的缩略图服务）
pub trait ThumbnailProvider: Send + Sync {
    fn thumbnail_at(&self, media_ref: &str, offset_ms: u64) -> Result<ThumbnailImage, ThumbnailError>;
}

/// 可编排失败偏移的测试提供者
pub struct MockThumbnailProvider {
    fail_pattern: Option<Box<dyn Fn(u64) -> bool + Send + Sync>>,
    frame_bytes: usize,
    call_count: AtomicU32,
}

impl MockThumbnailProvider {
    pub fn succeeding() -> Self {
        Self {
            fail_pattern: None,
            frame_bytes: 1024,
            call_count: AtomicU32::new(0),
        }
    }

    pub fn with_frame_bytes(frame_bytes: usize) -> Self {
        Self {
            frame_bytes,
            ..Self::succeeding()
        }
    }

    pub fn failing_at<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> bool + Send + Sync + 'static,
    {
        Self {
            fail_pattern: Some(Box::new(pattern)),
            ..Self::succeeding()
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl ThumbnailProvider for MockThumbnailProvider {
    fn thumbnail_at(&self, _media_ref: &str, offset_ms: u64) -> Result<ThumbnailImage, ThumbnailError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(pattern) = &self.fail_pattern {
            if pattern(offset_ms) {
                return Err(ThumbnailError::Unavailable { offset_ms });
            }
        }
        // 以偏移填充字节，保证不同偏移产出可区分的内容
        let fill = (offset_ms / 100 % 256) as u8;
        Ok(ThumbnailImage::jpeg(vec![fill; self.frame_bytes]))
    }
}

/// 宿主预取的缩略图集合：平台层抽好帧后按偏移喂入，
/// 在核心管线看来与任何其他抽帧能力无异
pub struct PrefetchedThumbnails {
    by_offset: HashMap<u64, ThumbnailImage>,
}

impl PrefetchedThumbnails {
    pub fn new(by_offset: HashMap<u64, ThumbnailImage>) -> Self {
        Self { by_offset }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (u64, ThumbnailImage)>) -> Self {
        Self {
            by_offset: pairs.into_iter().collect(),
        }
    }
}

impl ThumbnailProvider for PrefetchedThumbnails {
    fn thumbnail_at(&self, _media_ref: &str, offset_ms: u64) -> Result<ThumbnailImage, ThumbnailError> {
        self.by_offset
            .get(&offset_ms)
            .cloned()
            .ok_or(ThumbnailError::Unavailable { offset_ms })
    }
}

/// 将图片重编码为较低质量的 JPEG，解码失败时返回 None
pub fn reencode_jpeg(data: &[u8], quality: u8) -> Option<Vec<u8>> {
    let img = image::load_from_memory(data).ok()?;

    let mut buffer = Cursor::new(Vec::new());
    if img.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality)).is_ok() {
        let out = buffer.into_inner();
        debug!("🔧 re-encoded thumbnail: {} -> {} bytes (q{})", data.len(), out.len(), quality);
        Some(out)
    } else {
        None
    }
}
