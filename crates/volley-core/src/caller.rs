use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

/// Failure mode of a single call. Recorded in the task's result instead of
/// aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallError {
    /// Connection, DNS or timeout failure before any response arrived.
    Transport { message: String },
    /// A response arrived but its status code signals failure.
    HttpStatus { status: u16 },
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Transport { message } => write!(f, "transport error: {message}"),
            CallError::HttpStatus { status } => write!(f, "HTTP status {status}"),
        }
    }
}

/// What one remote call produced, before task bookkeeping is attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOutcome {
    pub status: Option<u16>,
    pub error: Option<CallError>,
}

impl CallOutcome {
    pub fn ok(status: u16) -> Self {
        Self {
            status: Some(status),
            error: None,
        }
    }

    pub fn http_error(status: u16) -> Self {
        Self {
            status: Some(status),
            error: Some(CallError::HttpStatus { status }),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            error: Some(CallError::Transport {
                message: message.into(),
            }),
        }
    }
}

/// Trait for remote call adapters
pub trait Caller: Send + Sync {
    fn name(&self) -> &'static str;

    fn call<'a>(&'a self) -> Pin<Box<dyn Future<Output = CallOutcome> + Send + 'a>>;
}

/// HTTP GET caller probing a single endpoint
pub struct HttpCaller {
    client: reqwest::Client,
    url: url::Url,
}

impl HttpCaller {
    pub fn new(url: &str, timeout_ms: u64) -> Result<Self> {
        let url = url::Url::parse(url).with_context(|| format!("Invalid target URL: {url}"))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("Target URL must be http:// or https:// (got {url})");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self { client, url })
    }
}

impl Caller for HttpCaller {
    fn name(&self) -> &'static str {
        "http"
    }

    fn call<'a>(&'a self) -> Pin<Box<dyn Future<Output = CallOutcome> + Send + 'a>> {
        Box::pin(async move {
            match self.client.get(self.url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        CallOutcome::ok(status.as_u16())
                    } else {
                        CallOutcome::http_error(status.as_u16())
                    }
                }
                Err(e) => CallOutcome::transport(e.to_string()),
            }
        })
    }
}

/// Scripted reply for the mock caller.
#[derive(Debug, Clone)]
pub enum MockReply {
    Status(u16),
    ConnectionRefused,
}

/// Mock caller for testing (cycles through scripted replies with per-reply
/// delays)
pub struct MockCaller {
    replies: Vec<(Duration, MockReply)>,
    cursor: AtomicUsize,
}

impl MockCaller {
    /// Always replies 200 OK after `delay_ms`.
    pub fn new(delay_ms: u64) -> Self {
        Self::scripted(vec![(
            Duration::from_millis(delay_ms),
            MockReply::Status(200),
        )])
    }

    /// Replies are consumed round-robin, in call order.
    pub fn scripted(replies: Vec<(Duration, MockReply)>) -> Self {
        assert!(!replies.is_empty(), "mock caller needs at least one reply");
        Self {
            replies,
            cursor: AtomicUsize::new(0),
        }
    }

    /// How many calls have been issued against this mock.
    pub fn call_count(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

impl Caller for MockCaller {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn call<'a>(&'a self) -> Pin<Box<dyn Future<Output = CallOutcome> + Send + 'a>> {
        Box::pin(async move {
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
            let (delay, reply) = self.replies[idx % self.replies.len()].clone();

            sleep(delay).await;

            match reply {
                MockReply::Status(status) if (200..300).contains(&status) => {
                    CallOutcome::ok(status)
                }
                MockReply::Status(status) => CallOutcome::http_error(status),
                MockReply::ConnectionRefused => CallOutcome::transport("connection refused"),
            }
        })
    }
}
