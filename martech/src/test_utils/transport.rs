use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use crate::delivery::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{ErrorKind, MartechResult};
use crate::martech_error;

/// What a [`ScriptedTransport`] answers to one request.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Fails like an unreachable destination.
    ConnectionFailed,
    /// Completes the exchange with a status and a body.
    Status(u16, String),
    /// Fails with an error of the given kind.
    Failed(ErrorKind),
    /// Never answers, like a destination that accepted the connection and went silent.
    Hang,
}

#[derive(Debug, Default)]
struct Inner {
    replies: VecDeque<ScriptedReply>,
    requests: Vec<(Url, HttpRequest)>,
    attempts: usize,
}

/// Transport replaying queued replies in order.
///
/// Once the queue is empty every request fails as unreachable.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.lock().replies.push_back(reply);
    }

    pub fn push_repeated(&self, reply: ScriptedReply, times: usize) {
        let mut inner = self.lock();
        for _ in 0..times {
            inner.replies.push_back(reply.clone());
        }
    }

    /// Returns the number of requests executed so far.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Returns the executed requests with their full url, in order.
    pub fn requests(&self) -> Vec<(Url, HttpRequest)> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, url: Url, request: HttpRequest) -> MartechResult<HttpResponse> {
        let reply = {
            let mut inner = self.lock();
            inner.attempts += 1;
            inner.requests.push((url.clone(), request));
            inner
                .replies
                .pop_front()
                .unwrap_or(ScriptedReply::ConnectionFailed)
        };

        match reply {
            ScriptedReply::ConnectionFailed => Err(martech_error!(
                ErrorKind::DestinationConnectionFailed,
                "Destination is unreachable",
                url
            )),
            ScriptedReply::Status(status, body) => Ok(HttpResponse::new(status, body)),
            ScriptedReply::Failed(kind) => {
                Err(martech_error!(kind, "Scripted transport failure", url))
            }
            ScriptedReply::Hang => std::future::pending().await,
        }
    }
}
