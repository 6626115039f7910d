//! In-process HTTP stub for tests.
//!
//! [`StubServer`] binds `127.0.0.1:0`, serves canned responses by path, and
//! counts every request it receives so tests can assert how often an
//! artifact was actually fetched. Drop it to stop the server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tiny_http::{Response, Server, StatusCode};

#[derive(Default)]
struct State {
    routes: HashMap<String, (u16, Vec<u8>)>,
    hits: HashMap<String, usize>,
    last_user_agent: Option<String>,
}

pub struct StubServer {
    url: String,
    server: Arc<Server>,
    state: Arc<Mutex<State>>,
    total: Arc<AtomicUsize>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl StubServer {
    pub fn start() -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind stub HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let state = Arc::new(Mutex::new(State::default()));
        let total = Arc::new(AtomicUsize::new(0));

        let srv = Arc::clone(&server);
        let st = Arc::clone(&state);
        let count = Arc::clone(&total);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                count.fetch_add(1, Ordering::SeqCst);
                let path = request
                    .url()
                    .split(['?', '#'])
                    .next()
                    .unwrap_or_default()
                    .to_owned();
                let agent = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("User-Agent"))
                    .map(|h| h.value.as_str().to_owned());

                let (status, body) = {
                    let mut state = st.lock().unwrap();
                    *state.hits.entry(path.clone()).or_default() += 1;
                    state.last_user_agent = agent;
                    state
                        .routes
                        .get(&path)
                        .cloned()
                        .unwrap_or((404, b"not found".to_vec()))
                };
                let _ = request.respond(Response::from_data(body).with_status_code(StatusCode(status)));
            }
        });

        Self {
            url,
            server,
            state,
            total,
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Absolute URI for `path` on this server.
    pub fn uri(&self, path: &str) -> String {
        format!("{}{path}", self.url)
    }

    pub fn route(&self, path: &str, status: u16, body: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert(path.to_owned(), (status, body.to_vec()));
    }

    /// Serve `body` with status 200 at `path`.
    pub fn serve(&self, path: &str, body: &[u8]) {
        self.route(path, 200, body);
    }

    /// Total number of requests received.
    pub fn requests(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn requests_for(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .hits
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn last_user_agent(&self) -> Option<String> {
        self.state.lock().unwrap().last_user_agent.clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
