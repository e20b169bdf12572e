// src/test_utils/mock_server.rs
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::Response;
use axum::Router;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    body: Vec<u8>,
    content_type: &'static str,
}

/// Canned responses for one path; the last reply repeats once the queue drains
#[derive(Debug, Clone)]
pub struct MockResponse {
    replies: Vec<Reply>,
}

impl MockResponse {
    pub fn bytes(body: Vec<u8>) -> Self {
        Self {
            replies: vec![Reply {
                status: 200,
                body,
                content_type: "application/octet-stream",
            }],
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            replies: vec![Reply {
                status: 200,
                body: body.into().into_bytes(),
                content_type: "application/json",
            }],
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            replies: vec![Reply {
                status,
                body: Vec::new(),
                content_type: "text/plain",
            }],
        }
    }

    pub fn sequence(responses: Vec<MockResponse>) -> Self {
        Self {
            replies: responses.into_iter().flat_map(|r| r.replies).collect(),
        }
    }
}

#[derive(Clone, Default)]
struct MockServerState {
    routes: Arc<Mutex<HashMap<String, VecDeque<Reply>>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

async fn file_handler(State(state): State<MockServerState>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    *state.hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

    let reply = {
        let mut routes = state.routes.lock().unwrap();
        match routes.get_mut(&path) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    };

    match reply {
        Some(reply) => {
            log::debug!("Mock file server answering {} with {}", path, reply.status);
            Response::builder()
                .status(StatusCode::from_u16(reply.status).unwrap())
                .header(header::CONTENT_TYPE, reply.content_type)
                .body(Body::from(reply.body))
                .unwrap()
        }
        None => {
            log::debug!("Mock file server has no route for {}", path);
            Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Body::empty())
                .unwrap()
        }
    }
}

/// Local HTTP server serving canned files, manifests and version documents
pub struct MockFileServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    state: MockServerState,
}

impl MockFileServer {
    pub async fn start(routes: Vec<(&str, MockResponse)>) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let state = MockServerState::default();
        {
            let mut table = state.routes.lock().unwrap();
            for (path, response) in routes {
                table.insert(path.to_string(), response.replies.into_iter().collect());
            }
        }

        let app = Router::new()
            .fallback(file_handler)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock server to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();
        log::info!("Mock file server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| {
                    log::error!("Mock file server error: {}", e);
                });
        });

        MockFileServer {
            addr,
            shutdown_tx,
            state,
        }
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address(), path)
    }

    /// Number of requests received for `path`
    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    /// Replace the responses for a path while the server is running
    pub fn set_route(&self, path: &str, response: MockResponse) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(path.to_string(), response.replies.into_iter().collect());
    }

    /// A URL on a port nothing listens on
    pub async fn unreachable_url(path: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}{}", addr, path)
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock file server shutdown signal already sent or receiver dropped.");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
}
