//! 帧采样器 - 从完成的录制中按固定偏移取 5 帧
//!
//! 核心约定：
//! 1. 采样点按名义时长 5000ms 计算，与实际录制时长无关
//! 2. 5 帧全部成功或整体失败，绝不产出残缺帧集
//! 3. 内部并行抽取，结果始终按时间顺序重组

pub mod frame;
pub mod thumbnailer;

pub use frame::{FrameSet, SampledFrame};
pub use thumbnailer::{
    MockThumbnailProvider, PrefetchedThumbnails, ThumbnailError, ThumbnailImage, ThumbnailProvider,
};

use crate::core::capture::RecordingHandle;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// 上传要求的帧数
pub const FRAME_COUNT: usize = 5;
/// 采样偏移所依据的名义录制窗口
pub const NOMINAL_DURATION_MS: u64 = 5_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SamplerError {
    #[error("frame {index} extraction failed: {source}")]
    ExtractionFailed {
        index: usize,
        #[source]
        source: ThumbnailError,
    },
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub frame_count: usize,
    pub nominal_duration_ms: u64,
    /// 单帧超过该体积时尝试降质重编码
    pub per_frame_budget_bytes: usize,
    pub reencode_quality: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            frame_count: FRAME_COUNT,
            nominal_duration_ms: NOMINAL_DURATION_MS,
            // 9MB 上传限额摊到 5 帧（留 4% 余量）
            per_frame_budget_bytes: 1_800_000,
            reencode_quality: 70,
        }
    }
}

/// 帧采样器：调用外部抽帧能力并封装为内联 data URL 帧集
pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self::with_config(SamplerConfig::default())
    }

    pub fn with_config(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// 采样偏移序列：i * (名义时长 / 帧数)，i ∈ 0..帧数
    pub fn sample_offsets(&self) -> Vec<u64> {
        let step = self.config.nominal_duration_ms / self.config.frame_count as u64;
        (0..self.config.frame_count as u64).map(|i| i * step).collect()
    }

    /// 抽取全部采样帧。任一帧失败则整体失败；
    /// `on_frame` 在每帧完成时收到累计完成数，仅用于进度展示
    pub fn extract_frames(
        &self,
        handle: &RecordingHandle,
        provider: &dyn ThumbnailProvider,
        on_frame: &(dyn Fn(usize) + Send + Sync),
    ) -> Result<FrameSet, SamplerError> {
        if handle.duration_ms < self.config.nominal_duration_ms {
            warn!(
                "⚠️ recording is {}ms but sampling spans the nominal {}ms window",
                handle.duration_ms, self.config.nominal_duration_ms
            );
        }

        let offsets = self.sample_offsets();
        info!("🖼️ extracting {} frames from {}", offsets.len(), handle.media_ref);

        let completed = AtomicUsize::new(0);
        let results: Vec<Result<SampledFrame, SamplerError>> = offsets
            .par_iter()
            .enumerate()
            .map(|(index, &offset_ms)| {
                let thumb = provider
                    .thumbnail_at(&handle.media_ref, offset_ms)
                    .map_err(|source| SamplerError::ExtractionFailed { index, source })?;

                let frame = self.encode_frame(offset_ms, thumb);
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                on_frame(done);
                Ok(frame)
            })
            .collect();

        // collect 保持索引顺序，逐个回收即按时间顺序重组
        let mut frames = Vec::with_capacity(results.len());
        for result in results {
            frames.push(result?);
        }

        debug!("✅ all {} frames extracted", frames.len());
        Ok(FrameSet::new(frames))
    }

    /// 超出单帧预算的图片先尝试降质重编码，失败则保留原图，
    /// 最终体积由上传前的校验器把关
    fn encode_frame(&self, offset_ms: u64, thumb: ThumbnailImage) -> SampledFrame {
        if thumb.data.len() > self.config.per_frame_budget_bytes {
            if let Some(smaller) =
                thumbnailer::reencode_jpeg(&thumb.data, self.config.reencode_quality)
            {
                if smaller.len() < thumb.data.len() {
                    return SampledFrame::from_bytes(offset_ms, "image/jpeg", &smaller);
                }
            }
            warn!(
                "⚠️ frame at {}ms is {} bytes and could not be shrunk",
                offset_ms,
                thumb.data.len()
            );
        }
        SampledFrame::from_bytes(offset_ms, &thumb.mime_type, &thumb.data)
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new()
    }
}
