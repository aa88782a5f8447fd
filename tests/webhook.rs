use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use chrono::Utc;
use phishwatch::certstream::CertificateUpdate;
use phishwatch::sink::{CertificateEvent, Event, EventSink, WebhookSink};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use url::Url;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct Receiver {
    status: StatusCode,
    delay: Duration,
    bodies: mpsc::UnboundedSender<Value>,
}

async fn receive(State(receiver): State<Receiver>, Json(body): Json<Value>) -> StatusCode {
    let _ = receiver.bodies.send(body);
    sleep(receiver.delay).await;
    receiver.status
}

// Answers every POST to /events with `status` after `delay` and forwards the
// decoded bodies.
async fn serve_with_delay(
    status: StatusCode,
    delay: Duration,
) -> (Url, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new()
        .route("/events", post(receive))
        .with_state(Receiver {
            status,
            delay,
            bodies: tx,
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let url = Url::parse(&format!("http://{}/events", addr)).unwrap();
    (url, rx)
}

async fn serve(status: StatusCode) -> (Url, mpsc::UnboundedReceiver<Value>) {
    serve_with_delay(status, Duration::ZERO).await
}

fn certificate_event(cert_index: u64) -> Event {
    Event::Certificate(CertificateEvent {
        timestamp: Utc::now(),
        data: CertificateUpdate {
            cert_index,
            ..Default::default()
        },
    })
}

#[tokio::test]
async fn test_posts_each_event_as_json() {
    let (url, mut bodies) = serve(StatusCode::OK).await;

    let mut sink = WebhookSink::new(url, 16).unwrap();
    sink.publish(certificate_event(1));
    sink.publish(certificate_event(2));
    sink.close();
    timeout(TEST_TIMEOUT, sink.finished()).await.unwrap();

    let mut indices = Vec::new();
    for _ in 0..2 {
        let value = timeout(TEST_TIMEOUT, bodies.recv()).await.unwrap().unwrap();
        assert_eq!(value["type"], "certificate");
        indices.push(value["data"]["cert_index"].as_u64().unwrap());
    }
    assert_eq!(indices, vec![1, 2]);
}

#[tokio::test]
async fn test_rejected_events_do_not_stop_delivery() {
    let (url, mut bodies) = serve(StatusCode::INTERNAL_SERVER_ERROR).await;

    let mut sink = WebhookSink::new(url, 16).unwrap();
    sink.publish(certificate_event(1));
    sink.publish(certificate_event(2));
    sink.close();
    timeout(TEST_TIMEOUT, sink.finished()).await.unwrap();

    assert!(timeout(TEST_TIMEOUT, bodies.recv()).await.unwrap().is_some());
    assert!(timeout(TEST_TIMEOUT, bodies.recv()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_unreachable_webhook_is_logged_not_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{}/events", addr)).unwrap();
    let mut sink = WebhookSink::new(url, 16).unwrap();
    sink.publish(certificate_event(1));
    sink.close();
    timeout(TEST_TIMEOUT, sink.finished()).await.unwrap();
}

#[tokio::test]
async fn test_finish_within_gives_up_on_a_stalled_webhook() {
    let (url, mut bodies) = serve_with_delay(StatusCode::OK, Duration::from_secs(30)).await;

    let mut sink = WebhookSink::new(url, 16).unwrap();
    for cert_index in 1..=3 {
        sink.publish(certificate_event(cert_index));
    }
    sink.close();

    // The first POST is in flight before the grace period starts.
    let first = timeout(TEST_TIMEOUT, bodies.recv()).await.unwrap().unwrap();
    assert_eq!(first["data"]["cert_index"], 1);

    let started = Instant::now();
    let drained = timeout(TEST_TIMEOUT, sink.finish_within(Duration::from_millis(200)))
        .await
        .unwrap();
    assert!(!drained);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_finish_within_reports_a_drained_queue() {
    let (url, mut bodies) = serve(StatusCode::OK).await;

    let mut sink = WebhookSink::new(url, 16).unwrap();
    sink.publish(certificate_event(1));
    sink.close();

    assert!(timeout(TEST_TIMEOUT, sink.finish_within(TEST_TIMEOUT)).await.unwrap());
    assert!(bodies.try_recv().is_ok());
}
