use serde::{Deserialize, Deserializer, Serialize};

/// 胎面分区 - 左 / 中 / 右三个独立评估区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Left,
    Center,
    Right,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Left, Zone::Center, Zone::Right];
}

/// 磨损等级，服务端返回未知字符串时降级为 Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WearCondition {
    Good,
    Fair,
    Poor,
    #[default]
    Unknown,
}

impl WearCondition {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "good" => WearCondition::Good,
            "fair" => WearCondition::Fair,
            "poor" => WearCondition::Poor,
            _ => WearCondition::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WearCondition::Good => "good",
            WearCondition::Fair => "fair",
            WearCondition::Poor => "poor",
            WearCondition::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for WearCondition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(WearCondition::parse(&raw))
    }
}

/// 单个分区的磨损评估
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneAssessment {
    pub tread_depth: f64,
    pub condition: WearCondition,
    pub wear_pattern: String,
}

/// 三个分区的评估集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneBreakdown {
    pub left: ZoneAssessment,
    pub center: ZoneAssessment,
    pub right: ZoneAssessment,
}

impl ZoneBreakdown {
    pub fn zone(&self, zone: Zone) -> &ZoneAssessment {
        match zone {
            Zone::Left => &self.left,
            Zone::Center => &self.center,
            Zone::Right => &self.right,
        }
    }
}

/// 整体结论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    pub average_depth: f64,
    pub condition: WearCondition,
    pub recommendation: String,
}

/// 分析服务 `/predict` 的完整响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TyreAnalysisReport {
    pub analysis: ZoneBreakdown,
    pub overall: OverallAssessment,
    pub timestamp: String,
    pub frames_analyzed: u32,
}

/// `/health` 探活响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}
