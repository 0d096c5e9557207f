use crate::core::capture::RecordingHandle;
use crate::core::sampler::{FrameSampler, SamplerError, ThumbnailProvider};
use crate::core::upload::{validate, AnalysisClient};
use crate::pipeline::state_machine::{PipelineAction, PipelineEvent, PipelineState};
use log::{debug, info};
use std::sync::{Arc, Mutex};

/// 每次状态迁移后收到新状态的观察者（驱动宿主进度 UI）。
/// 在持锁期间回调，实现内不得反向调用流水线
pub type StateListener = Arc<dyn Fn(&PipelineState) + Send + Sync>;

/// 流水线编排器：唯一持有并推进 `PipelineState`，
/// 依次驱动探活 → 抽帧 → 校验 → 上传。
///
/// 重试永远从 Connecting 整段重来，之前的半成品帧一律丢弃，
/// 不会跨一次瞬时失败复用可能不一致的帧集
pub struct AnalysisPipeline {
    sampler: FrameSampler,
    client: AnalysisClient,
    state: Mutex<PipelineState>,
    listener: Option<StateListener>,
}

impl AnalysisPipeline {
    pub fn new(sampler: FrameSampler, client: AnalysisClient) -> Self {
        Self {
            sampler,
            client,
            state: Mutex::new(PipelineState::Idle),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: StateListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(PipelineState::Idle)
    }

    fn apply(&self, event: PipelineEvent) -> (PipelineState, PipelineAction) {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (next, action) = guard.transition(event);
        *guard = next.clone();
        if let Some(listener) = &self.listener {
            listener(&next);
        }
        (next, action)
    }

    /// 跑完整一轮分析。每次调用都是全新一轮：
    /// 上一轮的状态与结果先被释放
    pub fn run(
        &self,
        handle: &RecordingHandle,
        provider: &dyn ThumbnailProvider,
    ) -> PipelineState {
        {
            let mut guard = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = PipelineState::Idle;
        }

        info!(
            "🎬 analysis run starting: {} ({}ms)",
            handle.media_ref, handle.duration_ms
        );
        let (_, action) = self.apply(PipelineEvent::Start);
        debug_assert_eq!(action, PipelineAction::ProbeHealth);

        self.execute(handle, provider)
    }

    /// 从失败状态重试。帧与结果全部清零后整段重来
    pub fn retry(
        &self,
        handle: &RecordingHandle,
        provider: &dyn ThumbnailProvider,
    ) -> PipelineState {
        if !matches!(self.state(), PipelineState::Failed { .. }) {
            debug!("🔁 retry outside Failed state, running fresh");
            return self.run(handle, provider);
        }

        info!("🔁 retrying analysis from scratch");
        let (_, action) = self.apply(PipelineEvent::Retry);
        debug_assert_eq!(action, PipelineAction::ProbeHealth);

        self.execute(handle, provider)
    }

    /// 结果页离开后归位，本轮就此终结
    pub fn dismiss(&self) {
        self.apply(PipelineEvent::Dismiss);
    }

    /// 单纯的连通性探测，不推进状态机
    pub fn probe_health(&self) -> bool {
        self.client.check_health()
    }

    /// Connecting 起步的主序列。帧集只存在于本次调用栈上，
    /// 离开即释放，天然满足"重试不保留半成品"
    fn execute(
        &self,
        handle: &RecordingHandle,
        provider: &dyn ThumbnailProvider,
    ) -> PipelineState {
        if !self.client.check_health() {
            return self.apply(PipelineEvent::HealthFailed).0;
        }
        let (_, action) = self.apply(PipelineEvent::HealthOk);
        debug_assert_eq!(action, PipelineAction::ExtractFrames);

        let frames = match self.sampler.extract_frames(handle, provider, &|_done| {
            self.apply(PipelineEvent::FrameReady);
        }) {
            Ok(frames) => frames,
            Err(SamplerError::ExtractionFailed { index, source }) => {
                return self
                    .apply(PipelineEvent::ExtractionFailed {
                        index,
                        message: source.to_string(),
                    })
                    .0;
            }
        };

        if let Err(error) = validate(&frames) {
            return self
                .apply(PipelineEvent::ValidationFailed {
                    kind: (&error).into(),
                    message: error.to_string(),
                })
                .0;
        }

        match self.client.upload(&frames) {
            Ok(report) => self.apply(PipelineEvent::UploadSucceeded { report }).0,
            Err(error) => {
                let kind = (&error).into();
                self.apply(PipelineEvent::UploadFailed {
                    kind,
                    message: error.to_string(),
                })
                .0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capture::RecordingHandle;
    use crate::core::sampler::{MockThumbnailProvider, SamplerConfig};
    use crate::core::upload::{
        AnalysisEndpoints, HttpResponse, HttpTransport, MockTransport, RecordedRequest,
        TransportError,
    };
    use crate::models::WearCondition;
    use crate::pipeline::state_machine::FailureKind;

    const REPORT_JSON: &str = r#"{
        "analysis": {
            "left":   {"tread_depth": 6.2, "condition": "good", "wear_pattern": "even"},
            "center": {"tread_depth": 5.8, "condition": "good", "wear_pattern": "even"},
            "right":  {"tread_depth": 6.0, "condition": "good", "wear_pattern": "even"}
        },
        "overall": {
            "average_depth": 6.0,
            "condition": "good",
            "recommendation": "Tread is healthy."
        },
        "timestamp": "2024-06-01T10:00:00Z",
        "frames_analyzed": 5
    }"#;

    const HEALTH_JSON: &str = r#"{"status":"ok","timestamp":"2024-06-01T10:00:00Z"}"#;

    fn handle() -> RecordingHandle {
        RecordingHandle {
            media_ref: "mock://tread-video".to_string(),
            duration_ms: 5_000,
        }
    }

    fn pipeline_with(
        responses: Vec<Result<HttpResponse, TransportError>>,
    ) -> (AnalysisPipeline, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::with_responses(responses));
        let client = AnalysisClient::new(
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
            AnalysisEndpoints::new("http://tyres.test"),
        );
        (AnalysisPipeline::new(FrameSampler::new(), client), transport)
    }

    fn collecting_listener() -> (StateListener, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: StateListener = Arc::new(move |state: &PipelineState| {
            if let Ok(mut log) = sink.lock() {
                log.push(state.label().to_string());
            }
        });
        (listener, seen)
    }

    #[test]
    fn test_happy_path_reaches_complete_with_report() {
        let (pipeline, transport) = pipeline_with(vec![
            Ok(HttpResponse::new(200, HEALTH_JSON)),
            Ok(HttpResponse::new(200, REPORT_JSON)),
        ]);
        let provider = MockThumbnailProvider::succeeding();

        let state = pipeline.run(&handle(), &provider);
        match state {
            PipelineState::Complete { report } => {
                assert_eq!(report.overall.condition, WearCondition::Good);
                assert_eq!(report.frames_analyzed, 5);
            }
            other => panic!("expected Complete, got {:?}", other),
        }

        assert_eq!(
            transport.requests(),
            vec![
                RecordedRequest::Get {
                    url: "http://tyres.test/health".to_string()
                },
                RecordedRequest::PostMultipart {
                    url: "http://tyres.test/predict".to_string(),
                    part_count: 5,
                },
            ]
        );
    }

    #[test]
    fn test_listener_observes_forward_progression() {
        let (pipeline, _) = pipeline_with(vec![
            Ok(HttpResponse::new(200, HEALTH_JSON)),
            Ok(HttpResponse::new(200, REPORT_JSON)),
        ]);
        let (listener, seen) = collecting_listener();
        let pipeline = pipeline.with_listener(listener);
        let provider = MockThumbnailProvider::succeeding();

        pipeline.run(&handle(), &provider);

        let labels = seen.lock().unwrap().clone();
        assert_eq!(labels.first().map(String::as_str), Some("connecting"));
        assert_eq!(labels.last().map(String::as_str), Some("complete"));
        assert!(labels.iter().any(|l| l == "extracting"));
        assert!(labels.iter().any(|l| l == "analyzing"));
    }

    #[test]
    fn test_unreachable_service_skips_extraction() {
        let (pipeline, transport) =
            pipeline_with(vec![Err(TransportError::NoResponse("refused".into()))]);
        let provider = MockThumbnailProvider::succeeding();

        let state = pipeline.run(&handle(), &provider);
        assert!(matches!(
            state,
            PipelineState::Failed {
                kind: FailureKind::NetworkUnavailable,
                ..
            }
        ));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_extraction_failure_fails_pipeline() {
        let (pipeline, transport) =
            pipeline_with(vec![Ok(HttpResponse::new(200, HEALTH_JSON))]);
        let provider = MockThumbnailProvider::failing_at(|offset| offset == 4000);

        let state = pipeline.run(&handle(), &provider);
        match state {
            PipelineState::Failed { kind, message } => {
                assert_eq!(kind, FailureKind::FrameExtraction);
                assert!(message.contains("frame 4"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        // 抽帧失败后绝不触发上传
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_oversized_payload_fails_validation_before_upload() {
        let transport = Arc::new(MockTransport::with_responses(vec![Ok(HttpResponse::new(
            200,
            HEALTH_JSON,
        ))]));
        let client = AnalysisClient::new(
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
            AnalysisEndpoints::new("http://tyres.test"),
        );
        let sampler = FrameSampler::with_config(SamplerConfig {
            // 关闭单帧重编码，让校验器接住超限载荷
            per_frame_budget_bytes: usize::MAX,
            ..SamplerConfig::default()
        });
        let pipeline = AnalysisPipeline::new(sampler, client);
        // 5 帧 × 3MB，估算体积远超 9MB 上限
        let provider = MockThumbnailProvider::with_frame_bytes(3_000_000);

        let state = pipeline.run(&handle(), &provider);
        assert!(matches!(
            state,
            PipelineState::Failed {
                kind: FailureKind::PayloadTooLarge,
                ..
            }
        ));
        // 校验在本地拦截，predict 不应收到请求
        assert_eq!(
            transport.requests(),
            vec![RecordedRequest::Get {
                url: "http://tyres.test/health".to_string()
            }]
        );
    }

    #[test]
    fn test_upload_413_maps_to_payload_too_large() {
        let (pipeline, _) = pipeline_with(vec![
            Ok(HttpResponse::new(200, HEALTH_JSON)),
            Ok(HttpResponse::new(413, "")),
        ]);
        let provider = MockThumbnailProvider::succeeding();

        let state = pipeline.run(&handle(), &provider);
        assert!(matches!(
            state,
            PipelineState::Failed {
                kind: FailureKind::PayloadTooLarge,
                ..
            }
        ));
    }

    #[test]
    fn test_upload_timeout_maps_to_timeout() {
        let (pipeline, _) = pipeline_with(vec![
            Ok(HttpResponse::new(200, HEALTH_JSON)),
            Err(TransportError::Timeout),
        ]);
        let provider = MockThumbnailProvider::succeeding();

        let state = pipeline.run(&handle(), &provider);
        assert!(matches!(
            state,
            PipelineState::Failed {
                kind: FailureKind::Timeout,
                ..
            }
        ));
    }

    #[test]
    fn test_retry_discards_partial_frames_and_succeeds() {
        // 第一轮第 4 帧抽取失败，第二轮全部成功
        let (pipeline, _) = pipeline_with(vec![
            Ok(HttpResponse::new(200, HEALTH_JSON)),
            Ok(HttpResponse::new(200, HEALTH_JSON)),
            Ok(HttpResponse::new(200, REPORT_JSON)),
        ]);
        let (listener, seen) = collecting_listener();
        let pipeline = pipeline.with_listener(listener);

        let flaky = MockThumbnailProvider::failing_at(|offset| offset == 3000);
        let state = pipeline.run(&handle(), &flaky);
        assert!(matches!(state, PipelineState::Failed { .. }));

        seen.lock().unwrap().clear();
        let steady = MockThumbnailProvider::succeeding();
        let state = pipeline.retry(&handle(), &steady);
        assert!(matches!(state, PipelineState::Complete { .. }));

        // 重试整段重来：5 帧全部重新抽取，无任何复用
        assert_eq!(steady.call_count(), 5);
        let labels = seen.lock().unwrap().clone();
        assert_eq!(labels.first().map(String::as_str), Some("connecting"));
    }

    #[test]
    fn test_dismiss_returns_to_idle() {
        let (pipeline, _) = pipeline_with(vec![
            Ok(HttpResponse::new(200, HEALTH_JSON)),
            Ok(HttpResponse::new(200, REPORT_JSON)),
        ]);
        let provider = MockThumbnailProvider::succeeding();

        pipeline.run(&handle(), &provider);
        pipeline.dismiss();
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }
}
