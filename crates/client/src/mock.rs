//! `MockTransport`: a test double for `HttpTransport`.
//!
//! Routes are matched on method plus URL path suffix. Every request is
//! recorded so tests can assert what went over the wire and in which order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::transport::{HttpMethod, HttpResponse, HttpTransport, RequestSpec};
use crate::ClientError;

/// What a route answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with a status and JSON body.
    Json(HttpResponse),
    /// Fail at the transport level with the given message.
    Fail(String),
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        Self::Json(HttpResponse::new(status, body))
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Self::Fail(msg.into())
    }
}

struct Route {
    method: HttpMethod,
    path: String,
    /// Consumed front to back; the last reply repeats.
    replies: VecDeque<MockReply>,
}

/// A scripted transport that records every call it receives.
#[derive(Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<Vec<Route>>>,
    calls: Arc<Mutex<Vec<RequestSpec>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reply for `method` + `path`. Calling this again for the same
    /// route queues another reply behind the first.
    pub fn on(self, method: HttpMethod, path: impl Into<String>, reply: MockReply) -> Self {
        let path = path.into();
        {
            let mut routes = self.routes.lock().unwrap();
            match routes.iter_mut().find(|r| r.method == method && r.path == path) {
                Some(route) => route.replies.push_back(reply),
                None => routes.push(Route {
                    method,
                    path,
                    replies: VecDeque::from([reply]),
                }),
            }
        }
        self
    }

    /// All requests seen so far, in call order.
    pub fn calls(&self) -> Vec<RequestSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests sent through this transport.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, ClientError> {
        self.calls.lock().unwrap().push(request.clone());

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            let route = routes
                .iter_mut()
                .find(|r| r.method == request.method && request.url.ends_with(&r.path))
                .ok_or_else(|| {
                    ClientError::Transport(format!(
                        "no mock route for {} {}",
                        request.method, request.url
                    ))
                })?;
            if route.replies.len() > 1 {
                route.replies.pop_front()
            } else {
                route.replies.front().cloned()
            }
        };

        match reply {
            Some(MockReply::Json(response)) => Ok(response),
            Some(MockReply::Fail(msg)) => Err(ClientError::Transport(msg)),
            None => Err(ClientError::Transport("mock route has no replies".into())),
        }
    }
}
