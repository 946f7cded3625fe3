//! Web front end: index page, live MJPEG feed, capture action, result page.
//!
//! A blocking accept loop on a background thread hands every connection to its
//! own thread, so a long-lived `/live_feed` response never blocks `/capture`.

mod http;

use anyhow::{anyhow, Context, Result};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::capture::{CapturePipeline, ResultStore, CAPTURED_IMAGE_NAME};
use crate::frame::FrameSlot;
use crate::ingest::{CameraConfig, CameraSource, FrameStream};
use crate::stream::MjpegEncoder;
use crate::view::{ResultView, INDEX_HTML};

use http::{
    read_request, write_error, write_json_response, write_redirect, write_response,
    write_stream_head, HttpRequest,
};

pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";
/// A live feed whose client stops reading for this long is closed.
pub const DEFAULT_STREAM_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
        }
    }
}

/// Everything a request handler can touch.
pub struct AppState {
    pub slot: Arc<FrameSlot>,
    pub camera: CameraConfig,
    pub pipeline: CapturePipeline,
    pub results: ResultStore,
    pub encoder: MjpegEncoder,
    pub stream_write_timeout: Duration,
}

impl AppState {
    pub fn new(slot: Arc<FrameSlot>, camera: CameraConfig, pipeline: CapturePipeline) -> Self {
        Self {
            slot,
            camera,
            pipeline,
            results: ResultStore::new(),
            encoder: MjpegEncoder::default(),
            stream_write_timeout: DEFAULT_STREAM_WRITE_TIMEOUT,
        }
    }

    pub fn with_encoder(mut self, encoder: MjpegEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_stream_write_timeout(mut self, timeout: Duration) -> Self {
        self.stream_write_timeout = timeout.max(Duration::from_millis(1));
        self
    }
}

#[derive(Debug)]
pub struct WebHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WebHandle {
    /// Stop accepting connections and wait for the accept loop to exit.
    /// Open live feeds end at their next frame.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("web server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct WebServer {
    cfg: ServerConfig,
    state: AppState,
}

impl WebServer {
    pub fn new(cfg: ServerConfig, state: AppState) -> Self {
        Self { cfg, state }
    }

    pub fn spawn(self) -> Result<WebHandle> {
        let configured_addr: SocketAddr = self
            .cfg
            .addr
            .parse()
            .with_context(|| format!("invalid listen address '{}'", self.cfg.addr))?;
        if let Some(upload_dir) = self.state.pipeline.image_path().parent() {
            std::fs::create_dir_all(upload_dir)
                .with_context(|| format!("create upload dir {}", upload_dir.display()))?;
        }
        let listener = TcpListener::bind(configured_addr)
            .with_context(|| format!("bind {}", configured_addr))?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let state = Arc::new(self.state);
        let join = std::thread::Builder::new()
            .name("nutricam-accept".to_string())
            .spawn(move || {
                if let Err(err) = run_server(listener, state, shutdown_thread) {
                    log::error!("web server stopped: {}", err);
                }
            })?;
        log::info!("web server listening on http://{}", addr);

        Ok(WebHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_server(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                let state = state.clone();
                let shutdown = shutdown.clone();
                let spawned = std::thread::Builder::new()
                    .name("nutricam-conn".to_string())
                    .spawn(move || {
                        if let Err(err) = handle_connection(stream, &state, &shutdown) {
                            log::warn!("request from {} failed: {}", peer, err);
                        }
                    });
                if let Err(err) = spawned {
                    log::warn!("could not spawn connection thread: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, state: &AppState, shutdown: &AtomicBool) -> Result<()> {
    stream.set_nonblocking(false)?;
    let request = read_request(&mut stream)?;
    log::debug!(
        "{} {} ({})",
        request.method,
        request.path,
        request
            .headers
            .get("user-agent")
            .map(String::as_str)
            .unwrap_or("-")
    );

    let allowed = match request.path.as_str() {
        "/" | "/live_feed" | "/result" => "GET",
        "/capture" => "POST",
        path if path.starts_with("/uploads/") => "GET",
        _ => {
            return write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#);
        }
    };
    if request.method != allowed {
        return write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#);
    }

    match request.path.as_str() {
        "/" => write_response(&mut stream, 200, "text/html; charset=utf-8", INDEX_HTML.as_bytes()),
        "/live_feed" => live_feed(&mut stream, state, shutdown),
        "/capture" => capture(&mut stream, state),
        "/result" => result(&mut stream, state, &request),
        path => upload(&mut stream, state, path),
    }
}

fn live_feed(stream: &mut TcpStream, state: &AppState, shutdown: &AtomicBool) -> Result<()> {
    let source = match CameraSource::open(&state.camera) {
        Ok(source) => source,
        Err(err) => {
            log::error!("camera {} unavailable: {:#}", state.camera.url, err);
            return write_error(stream, 503, "camera unavailable");
        }
    };
    // A client that stops reading fails the blocked write and ends the feed.
    stream.set_write_timeout(Some(state.stream_write_timeout))?;
    write_stream_head(stream, state.encoder.content_type())?;
    let frames = FrameStream::new(source, state.slot.clone())
        .take_while(|_| !shutdown.load(Ordering::SeqCst));
    let sent = state.encoder.write_stream(stream, frames)?;
    log::debug!("live feed ended after {} frames", sent);
    Ok(())
}

fn capture(stream: &mut TcpStream, state: &AppState) -> Result<()> {
    match state.pipeline.capture() {
        Ok(result) => {
            let id = state.results.insert(result);
            write_redirect(stream, &format!("/result?id={}", id))
        }
        Err(err) => {
            log::error!("{}", err);
            write_error(stream, 500, &err.to_string())
        }
    }
}

fn result(stream: &mut TcpStream, state: &AppState, request: &HttpRequest) -> Result<()> {
    let stored = request
        .query
        .get("id")
        .and_then(|id| state.results.get(id));
    let view = match stored {
        Some(result) => ResultView::from_result(&result),
        None => ResultView::from_query(&request.query),
    };
    write_response(
        stream,
        200,
        "text/html; charset=utf-8",
        view.render().as_bytes(),
    )
}

fn upload(stream: &mut TcpStream, state: &AppState, path: &str) -> Result<()> {
    if path.strip_prefix("/uploads/") != Some(CAPTURED_IMAGE_NAME) {
        return write_json_response(stream, 404, r#"{"error":"not_found"}"#);
    }
    match std::fs::read(state.pipeline.image_path()) {
        Ok(bytes) => write_response(stream, 200, "image/jpeg", &bytes),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            write_json_response(stream, 404, r#"{"error":"not_found"}"#)
        }
        Err(err) => Err(err.into()),
    }
}
