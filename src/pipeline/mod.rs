//! 分析流水线 - 从录制完成到磨损报告的主状态机
//!
//! 核心流程：
//! 1. 连通性探测 - /health 探活，不可达立即失败
//! 2. 抽帧 - 按固定偏移取 5 帧，全部成功或整体失败
//! 3. 本地校验 - 帧数与载荷体积在触网前把关
//! 4. 上传解析 - multipart 上传并解析分区磨损报告
//!
//! 失败后的重试永远整段重来，不复用半成品帧集

pub mod runner;
pub mod state_machine;

pub use runner::{AnalysisPipeline, StateListener};
pub use state_machine::{FailureKind, PipelineAction, PipelineEvent, PipelineState};
