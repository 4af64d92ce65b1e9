mod common;

use std::time::Duration;

use common::{event_json, fast_settings, send, ScriptedServer, Step};
use genwatch_core::JobStatus;
use genwatch_engine::{ChannelHandle, ChannelSignal, EngineSettings, LiveChannel};
use pretty_assertions::assert_eq;

async fn collect(mut channel: ChannelHandle) -> Vec<ChannelSignal> {
    let mut signals = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), channel.next()).await {
            Ok(Some(signal)) => signals.push(signal),
            Ok(None) => return signals,
            Err(_) => panic!("channel did not finish; got {signals:?}"),
        }
    }
}

fn statuses(signals: &[ChannelSignal]) -> Vec<String> {
    signals
        .iter()
        .map(|signal| match signal {
            ChannelSignal::Event(event) => event.status.to_string(),
            ChannelSignal::Failed { .. } => "<failed>".to_string(),
            ChannelSignal::Closed => "<closed>".to_string(),
        })
        .collect()
}

#[tokio::test]
async fn delivers_events_in_order_and_skips_malformed_frames() {
    genwatch_logging::initialize_for_tests();
    let server = ScriptedServer::start(vec![vec![
        send(&event_json("processing", 40, "Analyzing repos")),
        send("{not json"),
        send(r#"{"step":"missing status"}"#),
        send(&event_json("completed", 100, "Done")),
        Step::Close,
    ]])
    .await;

    let channel = LiveChannel::open(&server.settings(0), "job1");
    assert_eq!(channel.job_id(), "job1");
    let signals = collect(channel).await;

    assert_eq!(statuses(&signals), vec!["processing", "completed", "<closed>"]);
    match &signals[0] {
        ChannelSignal::Event(event) => {
            assert_eq!(event.progress, 40);
            assert_eq!(event.step, "Analyzing repos");
        }
        other => panic!("unexpected signal {other:?}"),
    }
    assert_eq!(server.paths(), vec!["/ws/generation/job1".to_string()]);
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn early_close_without_retries_fails_exactly_once() {
    genwatch_logging::initialize_for_tests();
    let server = ScriptedServer::start(vec![vec![Step::Close]]).await;

    let signals = collect(LiveChannel::open(&server.settings(0), "job1")).await;

    assert_eq!(signals.len(), 1);
    assert!(matches!(signals[0], ChannelSignal::Failed { .. }));
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn retries_are_bounded_before_failing() {
    genwatch_logging::initialize_for_tests();
    // Every connection is dropped right after the handshake.
    let server = ScriptedServer::start(Vec::new()).await;

    let signals = collect(LiveChannel::open(&server.settings(2), "job1")).await;

    assert_eq!(statuses(&signals), vec!["<failed>"]);
    assert_eq!(server.connections(), 3);
}

#[tokio::test]
async fn reconnect_resumes_the_stream() {
    genwatch_logging::initialize_for_tests();
    let server = ScriptedServer::start(vec![
        vec![send(&event_json("processing", 30, "Fetching repos"))],
        vec![send(&event_json("completed", 100, "Done")), Step::Close],
    ])
    .await;

    let signals = collect(LiveChannel::open(&server.settings(1), "job1")).await;

    assert_eq!(statuses(&signals), vec!["processing", "completed", "<closed>"]);
    assert_eq!(server.connections(), 2);
}

#[tokio::test]
async fn connection_refused_fails_after_retries() {
    genwatch_logging::initialize_for_tests();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let settings = fast_settings(&format!("http://{addr}"), 1);
    let signals = collect(LiveChannel::open(&settings, "job1")).await;

    assert_eq!(signals.len(), 1);
    assert!(matches!(signals[0], ChannelSignal::Failed { .. }));
}

#[tokio::test]
async fn invalid_stream_url_fails_immediately() {
    genwatch_logging::initialize_for_tests();
    let settings = EngineSettings {
        ws_base: Some("not a url".to_string()),
        ..EngineSettings::default()
    };
    let signals = collect(LiveChannel::open(&settings, "job1")).await;
    assert_eq!(statuses(&signals), vec!["<failed>"]);
}

#[tokio::test]
async fn close_stops_listening() {
    genwatch_logging::initialize_for_tests();
    let server = ScriptedServer::start(vec![vec![
        send(&event_json("processing", 10, "Starting")),
        Step::Hold,
    ]])
    .await;

    let mut channel = LiveChannel::open(&server.settings(3), "job1");
    let first = tokio::time::timeout(Duration::from_secs(5), channel.next())
        .await
        .expect("first event");
    match first {
        Some(ChannelSignal::Event(event)) => assert_eq!(event.status, JobStatus::Processing),
        other => panic!("unexpected signal {other:?}"),
    }

    channel.close();
    let rest = collect(channel).await;
    assert!(rest.is_empty(), "no signals after close, got {rest:?}");
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn stalled_handshake_times_out_and_fails() {
    genwatch_logging::initialize_for_tests();
    // Accepts TCP connections but never answers the upgrade request.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let settings = EngineSettings {
        connect_timeout: Duration::from_millis(200),
        ..fast_settings(&format!("http://{addr}"), 0)
    };
    let signals = collect(LiveChannel::open(&settings, "job1")).await;

    assert_eq!(signals.len(), 1);
    match &signals[0] {
        ChannelSignal::Failed { reason } => assert!(reason.contains("timed out"), "{reason}"),
        other => panic!("unexpected signal {other:?}"),
    }
}

#[tokio::test]
async fn flapping_server_exhausts_the_retry_budget() {
    genwatch_logging::initialize_for_tests();
    let flap = vec![send(&event_json("processing", 10, "Starting")), Step::Close];
    let server = ScriptedServer::start(vec![flap; 10]).await;

    let signals = collect(LiveChannel::open(&server.settings(1), "job1")).await;

    assert_eq!(
        statuses(&signals),
        vec!["processing", "processing", "<failed>"]
    );
    assert_eq!(server.connections(), 2);
}
