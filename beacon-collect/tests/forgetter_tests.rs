use beacon_collect::{Forgetter, Transport, TransportOutcome};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify};

const COLLECT_URL: &str = "https://collect.test/v1/events";

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 45).unwrap()
}

#[derive(Default)]
struct MockTransport {
    outcomes: Mutex<VecDeque<TransportOutcome>>,
    calls: AtomicUsize,
    bodies: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
}

impl MockTransport {
    fn with_outcomes(outcomes: impl IntoIterator<Item = TransportOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    async fn send(&self, _url: &str, body: Vec<u8>) -> TransportOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .lock()
            .await
            .push(String::from_utf8(body).unwrap());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        self.outcomes.lock().await.pop_front().unwrap_or(TransportOutcome {
            status: 204,
            network_error: false,
        })
    }
}

const FAILURE_500: TransportOutcome = TransportOutcome {
    status: 500,
    network_error: false,
};

fn make_forgetter(
    transport: Arc<MockTransport>,
    successes: Arc<AtomicUsize>,
) -> Forgetter<MockTransport> {
    Forgetter::new(
        COLLECT_URL,
        transport,
        "SomeUserID",
        ts(),
        "4.2.1",
        "RequestDataDeletion",
        move || {
            successes.fetch_add(1, Ordering::SeqCst);
        },
    )
    .unwrap()
}

#[tokio::test]
async fn payload_has_the_fixed_forget_me_shape() {
    let transport = Arc::new(MockTransport::default());
    let forgetter = make_forgetter(transport.clone(), Arc::new(AtomicUsize::new(0)));
    forgetter.attempt_to_forget().await;

    let bodies = transport.bodies.lock().await;
    let parsed: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
    let event = &parsed["eventList"][0];

    assert_eq!(event["eventName"], "ddnaForgetMe");
    assert_eq!(event["userID"], "SomeUserID");
    assert_eq!(event["eventTimestamp"], "2024-03-05 12:30:45");
    assert_eq!(event["eventVersion"], 1);
    assert_eq!(event["eventParams"]["clientVersion"], "4.2.1");
    assert_eq!(event["eventParams"]["sdkMethod"], "RequestDataDeletion");
    uuid::Uuid::parse_str(event["eventUUID"].as_str().unwrap()).unwrap();
}

#[tokio::test]
async fn success_fires_the_callback_once_and_latches() {
    let transport = Arc::new(MockTransport::default());
    let successes = Arc::new(AtomicUsize::new(0));
    let forgetter = make_forgetter(transport.clone(), successes.clone());

    forgetter.attempt_to_forget().await;
    assert!(forgetter.has_succeeded());
    assert_eq!(successes.load(Ordering::SeqCst), 1);

    // Latched: later heartbeats neither send nor re-fire the callback.
    forgetter.attempt_to_forget().await;
    forgetter.attempt_to_forget().await;
    assert_eq!(transport.calls(), 1);
    assert_eq!(successes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failure_allows_a_retry_then_latches_on_success() {
    let transport = Arc::new(MockTransport::with_outcomes([FAILURE_500]));
    let successes = Arc::new(AtomicUsize::new(0));
    let forgetter = make_forgetter(transport.clone(), successes.clone());

    forgetter.attempt_to_forget().await;
    assert!(!forgetter.has_succeeded());
    assert_eq!(successes.load(Ordering::SeqCst), 0);

    forgetter.attempt_to_forget().await;
    assert!(forgetter.has_succeeded());
    assert_eq!(successes.load(Ordering::SeqCst), 1);

    forgetter.attempt_to_forget().await;
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn retries_send_the_identical_payload() {
    let transport = Arc::new(MockTransport::with_outcomes([FAILURE_500]));
    let forgetter = make_forgetter(transport.clone(), Arc::new(AtomicUsize::new(0)));

    forgetter.attempt_to_forget().await;
    forgetter.attempt_to_forget().await;

    let bodies = transport.bodies.lock().await;
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn concurrent_attempts_send_exactly_one_request() {
    let gate = Arc::new(Notify::new());
    let transport = Arc::new(MockTransport::gated(gate.clone()));
    let successes = Arc::new(AtomicUsize::new(0));
    let forgetter = Arc::new(make_forgetter(transport.clone(), successes.clone()));

    let background = {
        let forgetter = forgetter.clone();
        tokio::spawn(async move { forgetter.attempt_to_forget().await })
    };
    while transport.calls() == 0 {
        tokio::task::yield_now().await;
    }

    // Back-to-back attempt while the first request is held open: no-op.
    forgetter.attempt_to_forget().await;
    assert_eq!(transport.calls(), 1);

    gate.notify_one();
    background.await.unwrap();

    assert!(forgetter.has_succeeded());
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls(), 1);
}
