// HttpFetcher against a one-shot local HTTP server

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Utc;
use pyromon::error::FetchError;
use pyromon::format::UnitMode;
use pyromon::handlers::Dashboard;
use pyromon::poll::{Fetch, HttpFetcher, PollState, Poller, Timer};
use pyromon::snapshot::MetricKind;

/// Serve a single canned response and return the endpoint URL.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        let mut line = String::new();
        // Drain the request head
        while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
            if line == "\r\n" {
                break;
            }
            line.clear();
        }
        let mut stream = stream;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).expect("write");
    });
    (format!("http://{}/json/charts", addr), handle)
}

#[test]
fn test_fetch_decodes_snapshot() {
    let (url, server) = serve_once("200 OK", r#"{"cpu_usage": 12.5, "foo": true}"#);
    let mut fetcher = HttpFetcher::new(url, Duration::from_secs(5)).expect("client");
    let snapshot = fetcher.fetch().expect("fetch");
    server.join().unwrap();

    let kinds: Vec<_> = snapshot.fields().map(|(kind, _)| kind).collect();
    assert_eq!(kinds, vec![MetricKind::CpuUsage]);
}

#[test]
fn test_non_success_status_is_an_error() {
    let (url, server) = serve_once("500 Internal Server Error", "{}");
    let mut fetcher = HttpFetcher::new(url.clone(), Duration::from_secs(5)).expect("client");
    let err = fetcher.fetch().unwrap_err();
    server.join().unwrap();

    assert!(matches!(err, FetchError::Status { status: 500, .. }));
    assert!(err.to_string().contains(&url));
}

#[test]
fn test_json_array_is_not_a_snapshot() {
    let (url, server) = serve_once("200 OK", "[1, 2, 3]");
    let mut fetcher = HttpFetcher::new(url, Duration::from_secs(5)).expect("client");
    let err = fetcher.fetch().unwrap_err();
    server.join().unwrap();

    assert!(matches!(err, FetchError::NotAnObject { .. }));
}

#[test]
fn test_invalid_body_is_a_decode_error() {
    let (url, server) = serve_once("200 OK", "<html>");
    let mut fetcher = HttpFetcher::new(url, Duration::from_secs(5)).expect("client");
    let err = fetcher.fetch().unwrap_err();
    server.join().unwrap();

    assert!(matches!(err, FetchError::Decode { .. }));
}

#[test]
fn test_connection_refused_is_a_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    };
    let url = format!("http://127.0.0.1:{}/json/charts", port);
    let mut fetcher = HttpFetcher::new(url.clone(), Duration::from_secs(2)).expect("client");
    let err = fetcher.fetch().unwrap_err();

    assert!(matches!(err, FetchError::Transport { .. }));
    assert!(err.to_string().contains(&url));
}

#[test]
fn test_slow_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}/json/charts", listener.local_addr().expect("local addr"));
    let (release, hold) = mpsc::channel::<()>();
    // Accept and keep the connection open without answering
    let server = std::thread::spawn(move || {
        let (_stream, _) = listener.accept().expect("accept");
        let _ = hold.recv_timeout(Duration::from_secs(10));
    });

    let wait = Duration::from_millis(2000);
    let fetcher = HttpFetcher::new(url.clone(), Duration::from_millis(300)).expect("client");
    let mut poller = Poller::new(
        fetcher,
        Dashboard::new(10, UnitMode::Binary),
        wait,
        Duration::from_millis(250),
    );

    let t0 = Instant::now();
    poller.start(t0);
    let outcome = poller.fetch();
    let elapsed = t0.elapsed();
    release.send(()).expect("release server");
    server.join().unwrap();

    let err = outcome.as_ref().unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }));
    assert!(err.to_string().contains(&url));
    assert!(elapsed < Duration::from_secs(5), "timed out after {:?}", elapsed);

    let done = Instant::now();
    let plan = poller.finish(outcome, done, Utc::now());
    assert_eq!(plan.next_poll, wait);
    assert_eq!(poller.scheduler().pending(Timer::Poll), Some(done + wait));
    assert_eq!(poller.state(), PollState::ScheduledWait);
    assert_eq!(poller.session().errors, 1);
    assert!(poller.dashboard().display.error_banner().is_some_and(|b| b.contains(&url)));
}
