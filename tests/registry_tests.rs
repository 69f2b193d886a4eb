use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use teler_rt_rs::protocol::models::{ProviderCall, TranscriptTurn};
use teler_rt_rs::{
    CallOrchestrator, CallProvider, CallRequest, CallStatus, ConversationRelay, Error,
    LanguageModel, SessionRegistry, TurnRole,
};

struct MockProvider {
    fail: bool,
    calls: AtomicUsize,
}

impl MockProvider {
    fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl CallProvider for MockProvider {
    async fn create_call(
        &self,
        _request: &CallRequest,
    ) -> teler_rt_rs::Result<ProviderCall> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(Error::Provider {
                status: Some(503),
                message: "call provider rejected the request".to_string(),
            });
        }
        Ok(ProviderCall {
            call_id: format!("call-{n}"),
            status: CallStatus::Initiated,
        })
    }

    async fn get_status(&self, _call_id: &str) -> teler_rt_rs::Result<CallStatus> {
        if self.fail {
            return Err(Error::Provider {
                status: Some(503),
                message: "call provider rejected the request".to_string(),
            });
        }
        Ok(CallStatus::InProgress)
    }
}

fn orchestrator(provider: MockProvider) -> CallOrchestrator {
    CallOrchestrator::new(Arc::new(provider), Arc::new(SessionRegistry::new()))
}

#[tokio::test]
async fn create_records_initiated_call() {
    let orch = orchestrator(MockProvider::ok());
    let request = CallRequest::new(
        "+918065193776",
        "+916360154904",
        "https://example.com/flow",
    );

    let session = orch.create(request).await.expect("create failed");
    assert_eq!(session.id, "call-1");
    assert_eq!(session.status, CallStatus::Initiated);
    assert!(session.transcript.is_empty());

    let fetched = orch.registry().get("call-1").expect("get failed");
    assert_eq!(fetched, session);
}

#[tokio::test]
async fn status_update_is_visible_on_next_get() {
    let orch = orchestrator(MockProvider::ok());
    let request = CallRequest::new("+15550001111", "+15550002222", "https://example.com/flow");
    let session = orch.create(request).await.expect("create failed");

    orch.apply_status_update(&session.id, CallStatus::Completed)
        .expect("update failed");
    assert_eq!(
        orch.status(&session.id).expect("status failed"),
        CallStatus::Completed
    );
}

#[tokio::test]
async fn refresh_status_mirrors_the_provider() {
    let orch = orchestrator(MockProvider::ok());
    let request = CallRequest::new("+15550001111", "+15550002222", "https://example.com/flow");
    let session = orch.create(request).await.expect("create failed");

    let status = orch
        .refresh_status(&session.id)
        .await
        .expect("refresh failed");
    assert_eq!(status, CallStatus::InProgress);
    assert_eq!(
        orch.status(&session.id).expect("status failed"),
        CallStatus::InProgress
    );

    match orch.refresh_status("missing").await {
        Err(Error::NotFound(_)) => {}
        other => panic!("Expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_from_number_is_rejected_before_the_provider() {
    let provider = MockProvider::ok();
    let registry = Arc::new(SessionRegistry::new());
    let orch = CallOrchestrator::new(Arc::new(provider), Arc::clone(&registry));

    let request = CallRequest::new("  ", "+15550002222", "https://example.com/flow");
    match orch.create(request).await {
        Err(Error::InvalidRequest(_)) => {}
        other => panic!("Expected InvalidRequest, got {other:?}"),
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn invalid_flow_url_is_rejected() {
    let orch = orchestrator(MockProvider::ok());
    let request = CallRequest::new("+15550001111", "+15550002222", "not a url");
    match orch.create(request).await {
        Err(Error::InvalidRequest(_)) => {}
        other => panic!("Expected InvalidRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn provider_failure_creates_no_record() {
    let registry = Arc::new(SessionRegistry::new());
    let orch = CallOrchestrator::new(Arc::new(MockProvider::failing()), Arc::clone(&registry));

    let request = CallRequest::new("+15550001111", "+15550002222", "https://example.com/flow");
    match orch.create(request).await {
        Err(Error::Provider { status, .. }) => assert_eq!(status, Some(503)),
        other => panic!("Expected Provider error, got {other:?}"),
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn list_preserves_insertion_order() {
    let orch = orchestrator(MockProvider::ok());
    for n in 0..3 {
        let request = CallRequest::new(
            format!("+1555000{n}"),
            "+15550009999",
            "https://example.com/flow",
        );
        orch.create(request).await.expect("create failed");
    }

    let ids: Vec<String> = orch.registry().list().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, ["call-1", "call-2", "call-3"]);
}

#[test]
fn unknown_call_is_not_found() {
    let registry = SessionRegistry::new();
    match registry.get("missing") {
        Err(Error::NotFound(_)) => {}
        other => panic!("Expected NotFound, got {other:?}"),
    }
    match registry.update_status("missing", CallStatus::Completed) {
        Err(Error::NotFound(_)) => {}
        other => panic!("Expected NotFound, got {other:?}"),
    }
}

#[test]
fn transcript_turns_stay_in_order() {
    let registry = SessionRegistry::new();
    registry.insert(sample_session("call-1"));

    registry
        .append_transcript_turn("call-1", TurnRole::Caller, "hello")
        .expect("append failed");
    registry
        .append_transcript_turn("call-1", TurnRole::Assistant, "hi, how can I help?")
        .expect("append failed");

    let transcript = registry.transcript("call-1").expect("transcript failed");
    assert_eq!(
        transcript,
        vec![
            TranscriptTurn::new(TurnRole::Caller, "hello"),
            TranscriptTurn::new(TurnRole::Assistant, "hi, how can I help?"),
        ]
    );
}

#[test]
fn updates_to_different_calls_run_concurrently() {
    let registry = Arc::new(SessionRegistry::new());
    registry.insert(sample_session("call-a"));
    registry.insert(sample_session("call-b"));

    let handles: Vec<_> = ["call-a", "call-b"]
        .into_iter()
        .map(|id| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for n in 0..100 {
                    registry
                        .append_transcript_turn(id, TurnRole::Caller, format!("turn {n}"))
                        .expect("append failed");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer panicked");
    }

    assert_eq!(registry.transcript("call-a").expect("a").len(), 100);
    assert_eq!(registry.transcript("call-b").expect("b").len(), 100);
}

struct RecordingModel {
    seen_history: std::sync::Mutex<Vec<usize>>,
}

#[async_trait::async_trait]
impl LanguageModel for RecordingModel {
    async fn complete(
        &self,
        history: &[TranscriptTurn],
        input: &str,
    ) -> teler_rt_rs::Result<String> {
        self.seen_history
            .lock()
            .expect("lock poisoned")
            .push(history.len());
        Ok(format!("reply to: {input}"))
    }
}

#[tokio::test]
async fn relay_records_both_sides_of_each_turn() {
    let registry = Arc::new(SessionRegistry::new());
    registry.insert(sample_session("call-1"));
    let model = Arc::new(RecordingModel {
        seen_history: std::sync::Mutex::new(Vec::new()),
    });
    let relay = ConversationRelay::new(model, Arc::clone(&registry));

    let reply = relay
        .reply_for_call("call-1", "what are your hours?")
        .await
        .expect("reply failed");
    assert_eq!(reply, "reply to: what are your hours?");

    let transcript = registry.transcript("call-1").expect("transcript failed");
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, TurnRole::Caller);
    assert_eq!(transcript[1].role, TurnRole::Assistant);
}

#[tokio::test]
async fn relay_caps_history_sent_to_the_model() {
    let registry = Arc::new(SessionRegistry::new());
    registry.insert(sample_session("call-1"));
    let model = Arc::new(RecordingModel {
        seen_history: std::sync::Mutex::new(Vec::new()),
    });
    let relay =
        ConversationRelay::new(model.clone(), Arc::clone(&registry)).history_limit(4);

    for n in 0..6 {
        relay
            .reply_for_call("call-1", &format!("turn {n}"))
            .await
            .expect("reply failed");
    }

    let seen = model.seen_history.lock().expect("lock poisoned");
    // Each reply adds two turns; the prior-turn window stops at the cap.
    assert_eq!(*seen, vec![0, 2, 4, 4, 4, 4]);
}

#[tokio::test]
async fn relay_rejects_unknown_call() {
    let registry = Arc::new(SessionRegistry::new());
    let model = Arc::new(RecordingModel {
        seen_history: std::sync::Mutex::new(Vec::new()),
    });
    let relay = ConversationRelay::new(model, registry);

    match relay.reply_for_call("missing", "hello").await {
        Err(Error::NotFound(_)) => {}
        other => panic!("Expected NotFound, got {other:?}"),
    }
}

struct KeywordStt;

#[async_trait::async_trait]
impl teler_rt_rs::SpeechToText for KeywordStt {
    async fn transcribe(&self, raw: &[u8]) -> teler_rt_rs::Result<Option<String>> {
        // Silence in, no transcript out.
        if raw.iter().all(|&b| b == 0) {
            Ok(None)
        } else {
            Ok(Some("hello".to_string()))
        }
    }
}

struct TextBytesTts;

#[async_trait::async_trait]
impl teler_rt_rs::TextToSpeech for TextBytesTts {
    async fn synthesize(&self, text: &str) -> teler_rt_rs::Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }
}

#[tokio::test]
async fn voice_agent_round_trips_a_spoken_turn() {
    let registry = Arc::new(SessionRegistry::new());
    registry.insert(sample_session("call-1"));
    let model = Arc::new(RecordingModel {
        seen_history: std::sync::Mutex::new(Vec::new()),
    });
    let relay = Arc::new(ConversationRelay::new(model, Arc::clone(&registry)));
    let agent = teler_rt_rs::VoiceAgent::new(Arc::new(KeywordStt), Arc::new(TextBytesTts), relay);

    let reply = agent
        .handle_chunk("call-1", &[1, 2, 3])
        .await
        .expect("turn failed");
    assert_eq!(reply, Some(b"reply to: hello".to_vec()));
    assert_eq!(registry.transcript("call-1").expect("transcript").len(), 2);

    // Silence produces no reply and no transcript turns.
    let silent = agent
        .handle_chunk("call-1", &[0, 0, 0])
        .await
        .expect("silent turn failed");
    assert_eq!(silent, None);
    assert_eq!(registry.transcript("call-1").expect("transcript").len(), 2);
}

fn sample_session(id: &str) -> teler_rt_rs::CallSession {
    teler_rt_rs::CallSession {
        id: id.to_string(),
        from_number: "+15550001111".to_string(),
        to_number: "+15550002222".to_string(),
        flow_url: "https://example.com/flow".to_string(),
        status: CallStatus::Initiated,
        status_callback_url: None,
        record: true,
        created_at: 0,
        transcript: Vec::new(),
    }
}
