//! HTTP front of the Cilium PowerStrip adapter.
//!
//! PowerStrip posts every intercepted Docker or Kubernetes API exchange to one
//! of the adapter routes in [`HOOK_ROUTES`]; the route tells the dispatcher
//! which API the exchange belongs to. `POST /db` serves the store RPC used by
//! `HttpStore` clients on other nodes, `GET /health` answers liveness probes.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

use cilium_core::{CoreError, Dispatcher};
use cilium_schema::{decode_request, SchemaError};
use cilium_store::{dispatch, Db, DbRequest};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, warn};

pub const DOCKER_DAEMON_ROUTE: &str = "/docker/daemon/cilium-adapter";
pub const DOCKER_SWARM_ROUTE: &str = "/docker/swarm/cilium-adapter";
pub const KUBERNETES_MASTER_ROUTE: &str = "/kubernetes/master/cilium-adapter";
pub const COMPOSE2KUBE_ROUTE: &str = "/compose2kube/master/cilium-adapter";
pub const KUBE2COMPOSE_ROUTE: &str = "/kube2compose/master/cilium-adapter";

pub const HOOK_ROUTES: &[&str] = &[
    DOCKER_DAEMON_ROUTE,
    DOCKER_SWARM_ROUTE,
    KUBERNETES_MASTER_ROUTE,
    COMPOSE2KUBE_ROUTE,
    KUBE2COMPOSE_ROUTE,
];

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Envelope(#[from] SchemaError),
    #[error(transparent)]
    Dispatch(#[from] CoreError),
    #[error("invalid store request: {0}")]
    StoreRequest(serde_json::Error),
    #[error("response serialization failed: {0}")]
    Response(serde_json::Error),
}

impl ServerError {
    pub fn status(&self) -> u16 {
        match self {
            Self::Envelope(_) | Self::StoreRequest(_) => 400,
            Self::Dispatch(_) | Self::Response(_) => 500,
        }
    }
}

/// Dispatcher plus the store it reads, shared by every request.
pub struct Adapter {
    dispatcher: Dispatcher,
    db: Arc<dyn Db>,
}

impl Adapter {
    pub fn new(dispatcher: Dispatcher) -> Self {
        let db = Arc::clone(&dispatcher.context().db);
        Self { dispatcher, db }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Process one PowerStrip envelope posted to `route`.
    pub fn handle_hook(&self, route: &str, body: &[u8]) -> Result<Vec<u8>, ServerError> {
        let request = decode_request(body)?;
        request.hook()?;
        let response = self.dispatcher.process(route, &request)?;
        serde_json::to_vec(&response).map_err(ServerError::Response)
    }

    pub fn handle_db(&self, body: &[u8]) -> Result<Vec<u8>, ServerError> {
        let request: DbRequest = serde_json::from_slice(body).map_err(ServerError::StoreRequest)?;
        let response = dispatch(self.db.as_ref(), request);
        serde_json::to_vec(&response).map_err(ServerError::Response)
    }
}

fn json_header() -> Header {
    Header::from_bytes("Content-Type", "application/json").expect("valid header")
}

fn respond_err(req: tiny_http::Request, code: u16, msg: &str) {
    let body = json!({ "error": msg }).to_string();
    let _ = req.respond(
        Response::from_string(body)
            .with_status_code(StatusCode(code))
            .with_header(json_header()),
    );
}

fn respond_json(req: tiny_http::Request, json: impl Into<Vec<u8>>) {
    let _ = req.respond(Response::from_data(json.into()).with_header(json_header()));
}

fn read_body(req: &mut tiny_http::Request) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    if req.as_reader().read_to_end(&mut body).is_ok() {
        Some(body)
    } else {
        None
    }
}

fn respond_result(req: tiny_http::Request, url: &str, result: Result<Vec<u8>, ServerError>) {
    match result {
        Ok(body) => respond_json(req, body),
        Err(e) => {
            let code = e.status();
            if code >= 500 {
                error!("{url}: {e}");
            } else {
                warn!("{url}: {e}");
            }
            respond_err(req, code, &e.to_string());
        }
    }
}

/// Handle a single HTTP request, dispatching to the appropriate route handler.
pub fn handle_request(adapter: &Adapter, mut req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let path = url.split('?').next().unwrap_or_default();
    if path == "/health" && method == Method::Get {
        respond_json(req, r#"{"status":"ok"}"#);
        return;
    }
    let is_hook = HOOK_ROUTES.contains(&path);
    if !is_hook && path != "/db" {
        respond_err(req, 404, "not found");
        return;
    }
    if method != Method::Post {
        respond_err(req, 405, "method not allowed");
        return;
    }
    let Some(body) = read_body(&mut req) else {
        respond_err(req, 500, "read error");
        return;
    };
    let result = if is_hook {
        adapter.handle_hook(path, &body)
    } else {
        adapter.handle_db(&body)
    };
    respond_result(req, &url, result);
}

/// Start the server loop, blocking the current thread.
pub fn run_server(adapter: &Arc<Adapter>, addr: &str) {
    let server = Server::http(addr).expect("failed to bind HTTP server");
    for request in server.incoming_requests() {
        let adapter = Arc::clone(adapter);
        std::thread::spawn(move || handle_request(&adapter, request));
    }
}

/// A test helper that starts the adapter on a random port in a background thread.
///
/// Drop the `TestServer` to stop the server (via `Server::unblock`).
pub struct TestServer {
    pub url: String,
    pub port: u16,
    server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl TestServer {
    /// Binds to `127.0.0.1:0` (random port).
    pub fn start(adapter: Adapter) -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let adapter = Arc::new(adapter);
        let srv = Arc::clone(&server);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&adapter, request);
            }
        });

        Self {
            url,
            port,
            server,
            _handle: handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}
