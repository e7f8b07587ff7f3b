//! Static asset server for the dashboard.
//!
//! A lightweight HTTP server (sync, via `tiny_http`) that exposes two
//! directories:
//! - the dashboard assets at `/`
//! - the collector assets under `/collector`
//!
//! There are no other routes. Launched via `riskwatch serve` (default:
//! `http://127.0.0.1:3000`).

mod static_files;

pub use static_files::{AssetRoots, content_type_for};

use std::io::Cursor;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::config::schema::{ServerConfig, expand_home};

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A bound asset server. Call [`AssetServer::run`] to start serving.
pub struct AssetServer {
    server: Server,
    roots: AssetRoots,
}

impl AssetServer {
    /// Bind to `addr`. Port `0` picks a free port; see [`local_addr`](Self::local_addr).
    pub fn bind(addr: &str, roots: AssetRoots) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;
        Ok(Self { server, roots })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let roots = AssetRoots::new(
            expand_home(&config.dashboard_dir),
            expand_home(&config.collector_dir),
        );
        Self::bind(&config.bind, roots)
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    pub fn roots(&self) -> &AssetRoots {
        &self.roots
    }

    /// Serve requests until the process exits.
    ///
    /// Requests are handled sequentially. A failed response write is logged
    /// and never stops the loop.
    pub fn run(self) -> Result<()> {
        for request in self.server.incoming_requests() {
            let method = request.method().clone();
            let url = request.url().to_string();

            let response = handle(&self.roots, &method, &url);
            let status = response.status_code().0;

            if let Err(e) = request.respond(response) {
                tracing::warn!(%method, %url, error = %e, "failed to send response");
            }

            tracing::info!(%method, %url, status, "request");
        }

        Ok(())
    }
}

/// Start the asset server from config. Blocks the current thread.
pub fn serve(config: &ServerConfig) -> Result<()> {
    let server = AssetServer::from_config(config)?;
    let addr = server
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|| config.bind.clone());

    for (prefix, root) in [("/", server.roots().dashboard()), ("/collector", server.roots().collector())] {
        if !root.is_dir() {
            tracing::warn!(prefix, root = %root.display(), "asset directory does not exist");
        }
    }

    println!("Dashboard server listening at http://{addr}");
    println!("Press Ctrl+C to stop.\n");

    server.run().context("asset server stopped")
}

// ---------------------------------------------------------------------------
// Request handling
// ---------------------------------------------------------------------------

/// Build the response for one request.
pub fn handle(roots: &AssetRoots, method: &Method, url: &str) -> Response<Cursor<Vec<u8>>> {
    if !matches!(method, Method::Get | Method::Head) {
        return plain_status(405, "method not allowed");
    }

    let Some(path) = roots.resolve(url) else {
        return not_found();
    };

    match std::fs::read(&path) {
        Ok(bytes) => {
            let content_type = content_type_for(&path);
            let mut response = Response::from_data(bytes).with_status_code(StatusCode(200));
            if let Ok(header) = Header::from_bytes("Content-Type", content_type.as_bytes()) {
                response = response.with_header(header);
            }
            response
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read asset");
            plain_status(500, "internal server error")
        }
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// 404 response.
fn not_found() -> Response<Cursor<Vec<u8>>> {
    plain_status(404, "not found")
}

fn plain_status(code: u16, body: &str) -> Response<Cursor<Vec<u8>>> {
    let mut response =
        Response::from_data(body.as_bytes().to_vec()).with_status_code(StatusCode(code));
    if let Ok(header) = Header::from_bytes("Content-Type", "text/plain; charset=utf-8") {
        response = response.with_header(header);
    }
    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
