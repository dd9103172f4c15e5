//! In-process HTTP server used by the download tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub method: Method,
    pub range: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub body: Vec<u8>,
    /// Answer HEAD with a Content-Length.
    pub head_length: bool,
    /// Value of the Accept-Ranges header on HEAD, if any.
    pub accept_ranges: Option<&'static str>,
    /// Reply 200 with the full body even when a Range is requested.
    pub ignore_range: bool,
    /// Status for unranged GETs.
    pub full_status: StatusCode,
    /// Ranged GETs starting at this offset get a 404.
    pub fail_range_start: Option<u64>,
    /// Ranged GETs starting at this offset get a well-formed 206 for the
    /// requested span whose body holds only its first `SHORT_BODY_LEN` bytes.
    pub short_range_start: Option<u64>,
    /// Ranged GETs starting at this offset are answered with the same number
    /// of bytes taken from the start of the body, labelled as such.
    pub shifted_range_start: Option<u64>,
    /// Wait this long before answering any ranged GET.
    pub range_delay: Option<Duration>,
}

pub const SHORT_BODY_LEN: usize = 10;

impl ServerConfig {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            head_length: true,
            accept_ranges: Some("bytes"),
            ignore_range: false,
            full_status: StatusCode::OK,
            fail_range_start: None,
            short_range_start: None,
            shifted_range_start: None,
            range_delay: None,
        }
    }
}

struct ServerState {
    config: ServerConfig,
    requests: Mutex<Vec<Recorded>>,
}

pub struct TestServer {
    pub url: String,
    state: Arc<ServerState>,
}

impl TestServer {
    pub async fn spawn(config: ServerConfig) -> Self {
        let state = Arc::new(ServerState {
            config,
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/file.bin", get(get_file).head(head_file))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/file.bin", addr),
            state,
        }
    }

    pub fn gets(&self) -> Vec<Recorded> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == Method::GET)
            .cloned()
            .collect()
    }

    pub fn ranges_requested(&self) -> Vec<String> {
        let mut ranges: Vec<String> = self.gets().into_iter().filter_map(|r| r.range).collect();
        ranges.sort();
        ranges
    }
}

pub fn patterned_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Names of every file in `dir`, sorted.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn record(state: &ServerState, method: Method, headers: &HeaderMap) -> Option<String> {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.requests.lock().unwrap().push(Recorded {
        method,
        range: range.clone(),
    });
    range
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

async fn head_file(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    record(&state, Method::HEAD, &headers);
    let config = &state.config;
    if !config.head_length {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, config.body.len().to_string());
    if let Some(unit) = config.accept_ranges {
        response = response.header(header::ACCEPT_RANGES, unit);
    }
    response.body(Body::empty()).unwrap()
}

async fn get_file(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    let range = record(&state, Method::GET, &headers);
    let config = &state.config;

    let range = match range {
        Some(range) if !config.ignore_range => range,
        _ => {
            return Response::builder()
                .status(config.full_status)
                .body(Body::from(config.body.clone()))
                .unwrap();
        }
    };

    let Some((start, end)) = parse_range(&range) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if let Some(delay) = config.range_delay {
        tokio::time::sleep(delay).await;
    }
    if config.fail_range_start == Some(start) {
        return (StatusCode::NOT_FOUND, "no such segment").into_response();
    }
    let len = config.body.len() as u64;
    if start > end || end >= len {
        return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
    }

    let (start, end) = if config.shifted_range_start == Some(start) {
        (0, end - start)
    } else {
        (start, end)
    };
    let mut slice = config.body[start as usize..=end as usize].to_vec();
    if config.short_range_start == Some(start) {
        slice.truncate(SHORT_BODY_LEN);
    }

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, len))
        .body(Body::from(slice))
        .unwrap()
}
