//! Minimal HTTP/1.1 upsert endpoint for integration tests.
//!
//! Accepts `POST /api/deals`, reads the JSON body's `id`, and answers with the
//! next status from that id's script (or the default status once the script
//! is used up). Status `0` in a script drops the connection without a
//! response. Every request is counted; peak concurrency and the `X-API-Key`
//! header are recorded.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Drop the connection instead of answering.
pub const DROP: u16 = 0;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Status for ids with no (remaining) script.
    pub default_status: u16,
    /// Time spent "processing" each request before answering.
    pub delay: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            default_status: 200,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Default)]
struct State {
    scripts: Mutex<HashMap<i64, Vec<u16>>>,
    attempts: Mutex<HashMap<i64, u32>>,
    api_keys: Mutex<Vec<Option<String>>>,
    started: Mutex<Vec<Instant>>,
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

pub struct UpsertServer {
    /// e.g. "http://127.0.0.1:12345/api"
    pub base_url: String,
    state: Arc<State>,
}

impl UpsertServer {
    pub fn start() -> Self {
        Self::start_with_options(ServerOptions::default())
    }

    pub fn start_with_options(opts: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(State::default());
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state, opts));
            }
        });
        Self {
            base_url: format!("http://127.0.0.1:{}/api", port),
            state,
        }
    }

    /// Statuses for successive attempts of record `id`.
    pub fn script(&self, id: i64, statuses: &[u16]) {
        self.state
            .scripts
            .lock()
            .unwrap()
            .insert(id, statuses.to_vec());
    }

    /// Requests received for record `id`.
    pub fn attempts(&self, id: i64) -> u32 {
        self.state
            .attempts
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    pub fn api_keys(&self) -> Vec<Option<String>> {
        self.state.api_keys.lock().unwrap().clone()
    }

    /// Arrival time of every request, in arrival order.
    pub fn request_times(&self) -> Vec<Instant> {
        self.state.started.lock().unwrap().clone()
    }
}

/// A port with nothing listening on it.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/api", port)
}

struct Request {
    path: String,
    api_key: Option<String>,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = std::str::from_utf8(&buf[..header_end]).ok()?.to_string();
    let mut lines = head.lines();
    let path = lines.next()?.split_whitespace().nth(1)?.to_string();
    let mut content_length = 0usize;
    let mut api_key = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse().ok()?;
        } else if name.eq_ignore_ascii_case("x-api-key") {
            api_key = Some(value.to_string());
        }
    }
    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some(Request {
        path,
        api_key,
        body,
    })
}

fn next_status(state: &State, id: i64, default_status: u16) -> u16 {
    let attempt = {
        let mut attempts = state.attempts.lock().unwrap();
        let n = attempts.entry(id).or_insert(0);
        *n += 1;
        *n as usize - 1
    };
    state
        .scripts
        .lock()
        .unwrap()
        .get(&id)
        .and_then(|s| s.get(attempt).copied())
        .unwrap_or(default_status)
}

fn reason(code: u16) -> &'static str {
    match code {
        200 => "OK",
        202 => "Accepted",
        400 => "Bad Request",
        404 => "Not Found",
        408 => "Request Timeout",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Status",
    }
}

fn handle(mut stream: TcpStream, state: &State, opts: ServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    state.started.lock().unwrap().push(Instant::now());
    state.requests.fetch_add(1, Ordering::SeqCst);
    state.api_keys.lock().unwrap().push(req.api_key);

    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak.fetch_max(now, Ordering::SeqCst);

    let id = serde_json::from_slice::<serde_json::Value>(&req.body)
        .ok()
        .and_then(|v| v.get("id").and_then(|id| id.as_i64()))
        .unwrap_or(0);
    let status = if req.path == "/api/deals" {
        next_status(state, id, opts.default_status)
    } else {
        404
    };

    if !opts.delay.is_zero() {
        thread::sleep(opts.delay);
    }
    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    if status == DROP {
        let _ = stream.shutdown(std::net::Shutdown::Both);
        return;
    }
    let body = match status {
        200 => String::from(r#"{"ok":true}"#),
        202 => String::from(r#"{"ok":true,"suppressed":true}"#),
        code => format!(r#"{{"error":"scripted {}"}}"#, code),
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason(status),
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
