//! HTTP listener on top of `tiny_http`.
//!
//! A fixed set of worker threads share one listener. Each worker polls with
//! a timeout so a shutdown request is noticed without extra wakeups.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::json;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::app::App;
use crate::router::{self, ApiRequest, HttpMethod, Reply, USER_HEADER};

/// How often an idle worker checks the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Largest request body accepted, in bytes.
const MAX_BODY_BYTES: u64 = 1024 * 1024;

pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting requests and wait for in-flight ones to finish.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for worker in self.workers {
            if worker.join().is_err() {
                tracing::error!("HTTP worker panicked");
            }
        }
        tracing::info!(addr = %self.addr, "HTTP server stopped");
    }
}

/// Bind `bind` and start `workers` request threads.
pub fn start(app: Arc<App>, bind: &str, workers: usize) -> std::io::Result<ServerHandle> {
    let server = Server::http(bind)
        .map_err(|e| std::io::Error::other(format!("cannot bind {bind}: {e}")))?;
    let addr = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| std::io::Error::other(format!("{bind} is not an IP listener")))?;
    let server = Arc::new(server);
    let shutdown = Arc::new(AtomicBool::new(false));

    let workers = (0..workers.max(1))
        .map(|n| {
            let server = Arc::clone(&server);
            let app = Arc::clone(&app);
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name(format!("hostel-http-{n}"))
                .spawn(move || worker_loop(&server, &app, &shutdown))
        })
        .collect::<std::io::Result<Vec<_>>>()?;

    tracing::info!(%addr, workers = workers.len(), "HTTP server listening");
    Ok(ServerHandle {
        addr,
        shutdown,
        workers,
    })
}

fn worker_loop(server: &Server, app: &App, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::SeqCst) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => handle(app, request),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("accept error: {e}");
            }
        }
    }
}

fn method_of(method: &Method) -> HttpMethod {
    match method {
        Method::Get => HttpMethod::Get,
        Method::Post => HttpMethod::Post,
        Method::Patch => HttpMethod::Patch,
        Method::Delete => HttpMethod::Delete,
        _ => HttpMethod::Other,
    }
}

/// Read at most `limit` bytes. A longer body is refused with 413 rather
/// than cut short.
fn read_body(reader: impl Read, limit: u64) -> Result<Vec<u8>, Reply> {
    let mut body = Vec::new();
    match reader.take(limit + 1).read_to_end(&mut body) {
        Ok(_) if body.len() as u64 > limit => Err(Reply::new(
            413,
            json!({ "error": {
                "kind": "VALIDATION_ERROR",
                "message": format!("request body exceeds {limit} bytes"),
            } }),
        )),
        Ok(_) => Ok(body),
        Err(e) => Err(Reply::new(
            400,
            json!({ "error": {
                "kind": "VALIDATION_ERROR",
                "message": format!("unreadable body: {e}"),
            } }),
        )),
    }
}

fn handle(app: &App, mut request: Request) {
    let mut api = ApiRequest::new(method_of(request.method()), request.url());
    api.user = request
        .headers()
        .iter()
        .find(|h| h.field.equiv(USER_HEADER))
        .map(|h| h.value.as_str().to_string());

    let reply = match read_body(request.as_reader(), MAX_BODY_BYTES) {
        Ok(body) => {
            api.body = body;
            router::dispatch(app, &api)
        }
        Err(reply) => reply,
    };

    let mut response =
        Response::from_string(reply.body.to_string()).with_status_code(StatusCode(reply.status));
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        tracing::warn!(path = %api.path, "failed to write response: {e}");
    }
}
