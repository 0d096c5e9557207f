use crate::core::sampler::{FrameSet, FRAME_COUNT};
use thiserror::Error;

/// 整体上传载荷的上限（按估算的解码体积）
pub const MAX_PAYLOAD_MB: f64 = 9.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("expected {expected} frames, got {actual}")]
    FrameCountMismatch { expected: usize, actual: usize },
    #[error("estimated payload {actual_mb:.2}MB exceeds the {limit_mb}MB upload limit")]
    PayloadTooLarge { limit_mb: f64, actual_mb: f64 },
}

/// 上传前的本地校验，纯函数，不触网也不修改帧集。
///
/// 体积按 base64 ×0.75 估算，是近似值而非精确字节数；
/// 上限取闭区间：恰好 9.00MB 放行，超出第一字节即拒绝
pub fn validate(frames: &FrameSet) -> Result<(), ValidationError> {
    if frames.len() != FRAME_COUNT {
        return Err(ValidationError::FrameCountMismatch {
            expected: FRAME_COUNT,
            actual: frames.len(),
        });
    }

    let actual_mb = frames.total_estimated_bytes() / BYTES_PER_MB;
    if actual_mb > MAX_PAYLOAD_MB {
        return Err(ValidationError::PayloadTooLarge {
            limit_mb: MAX_PAYLOAD_MB,
            actual_mb,
        });
    }

    Ok(())
}
