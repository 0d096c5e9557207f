use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::error;
use once_cell::sync::Lazy;
use regex::Regex;

/// data URL 前缀，例如 `data:image/jpeg;base64,`
static DATA_URL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:(?P<mime>[\w.+-]+/[\w.+-]+);base64,").expect("valid regex"));

/// 单个采样帧：固定偏移处取出的一张编码图片，
/// 以内联 data URL 形式携带
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledFrame {
    pub offset_ms: u64,
    pub mime_type: String,
    pub data_url: String,
}

impl SampledFrame {
    pub fn from_bytes(offset_ms: u64, mime_type: &str, data: &[u8]) -> Self {
        Self {
            offset_ms,
            mime_type: mime_type.to_string(),
            data_url: format!("data:{};base64,{}", mime_type, STANDARD.encode(data)),
        }
    }

    /// data URL 中的 base64 载荷；没有合法前缀时按整串处理
    pub fn base64_payload(&self) -> &str {
        match DATA_URL_PREFIX.find(&self.data_url) {
            Some(prefix) => &self.data_url[prefix.end()..],
            None => &self.data_url,
        }
    }

    /// 估算解码后的字节数，按 base64 膨胀率 ×0.75 折算。
    /// 只是近似值，不是精确字节数
    pub fn estimated_decoded_bytes(&self) -> f64 {
        self.base64_payload().len() as f64 * 0.75
    }

    /// 解码出原始图片字节。帧由本 crate 编码而来，
    /// 载荷异常只可能来自宿主注入的数据，此时记日志并退化为空
    pub fn decoded_bytes(&self) -> Vec<u8> {
        match STANDARD.decode(self.base64_payload()) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("❌ frame at {}ms has invalid base64 payload: {}", self.offset_ms, e);
                Vec::new()
            }
        }
    }
}

/// 按时间顺序排列的采样帧集合。
/// 采样器保证恰好 5 帧；校验器在上传前强制这一不变量
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSet {
    frames: Vec<SampledFrame>,
}

impl FrameSet {
    pub fn new(frames: Vec<SampledFrame>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[SampledFrame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SampledFrame> {
        self.frames.iter()
    }

    /// 全部帧的估算解码体积之和
    pub fn total_estimated_bytes(&self) -> f64 {
        self.frames.iter().map(|f| f.estimated_decoded_bytes()).sum()
    }
}
