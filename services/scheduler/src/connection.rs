//! Connection to the Mesos masters.
//!
//! The [`ConnectionManager`] owns at most one subscription stream, bound to
//! the master that accepted the SUBSCRIBE call (the leader). Every other call
//! is a short request/response POST against that leader.
//!
//! Leader selection walks the configured masters in order. A candidate that
//! cannot be reached, or answers anything but `200 OK`, only disqualifies
//! itself; the next candidate is tried until one streams or the list is
//! exhausted.

use std::collections::VecDeque;
use std::time::Duration;

use mesos_solr_protocol::{Call, Event, RecordDecoder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::error::{SchedulerError, SchedulerResult};

/// Path of the scheduler API on every master.
pub const SCHEDULER_PATH: &str = "/api/v1/scheduler";

/// Header carrying the subscription stream id.
pub const STREAM_ID_HEADER: &str = "Mesos-Stream-Id";

/// Build the scheduler endpoint URL for a `host:port`.
pub fn scheduler_url(host: &str) -> String {
    format!("http://{host}{SCHEDULER_PATH}")
}

/// Extract `host:port` from a master redirect `Location`.
///
/// Masters answer `307` with `//host:port/api/v1/scheduler` when they are
/// not the leader.
pub fn leader_from_location(location: &str) -> Option<String> {
    let rest = location
        .strip_prefix("http://")
        .or_else(|| location.strip_prefix("https://"))
        .or_else(|| location.strip_prefix("//"))?;

    let host = rest.split('/').next()?.trim();
    (!host.is_empty()).then(|| host.to_string())
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No subscription attempted, or the last attempt failed.
    Disconnected,
    /// Walking the master list.
    Connecting,
    /// Streaming from the leader.
    Subscribed,
    /// Stream released.
    Closed,
}

/// Lazy sequence of events over one subscription response.
///
/// Ends when the master closes the response; it cannot be restarted.
pub struct EventStream {
    host: String,
    response: reqwest::Response,
    decoder: RecordDecoder,
    idle_timeout: Option<Duration>,
    ended: bool,
}

impl EventStream {
    fn new(host: String, response: reqwest::Response) -> Self {
        Self {
            host,
            response,
            decoder: RecordDecoder::new(),
            idle_timeout: None,
            ended: false,
        }
    }

    /// The master this stream is bound to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Read the next event, or `None` once the stream has ended.
    ///
    /// Cancel-safe: bytes only enter the decoder after a read completes.
    pub async fn next_event(&mut self) -> SchedulerResult<Option<Event>> {
        loop {
            if let Some(record) = self.decoder.next_record()? {
                let event = Event::decode(&record)?;
                trace!(kind = event.kind(), size = record.len(), "Decoded event");
                return Ok(Some(event));
            }

            if self.ended {
                if self.decoder.buffered() > 0 {
                    warn!(
                        host = %self.host,
                        buffered = self.decoder.buffered(),
                        "Stream ended inside a record"
                    );
                }
                return Ok(None);
            }

            let chunk = match self.idle_timeout {
                Some(limit) => tokio::time::timeout(limit, self.response.chunk())
                    .await
                    .map_err(|_| SchedulerError::HeartbeatTimeout(limit))??,
                None => self.response.chunk().await?,
            };

            match chunk {
                Some(bytes) => self.decoder.extend(&bytes),
                None => self.ended = true,
            }
        }
    }
}

enum SubscribeOutcome {
    Streaming(reqwest::Response),
    Redirected(String),
    Failed(SchedulerError),
}

async fn try_subscribe(client: &reqwest::Client, host: &str, call: &Call) -> SubscribeOutcome {
    debug!(host = %host, "Sending SUBSCRIBE");

    let response = match client.post(scheduler_url(host)).json(call).send().await {
        Ok(response) => response,
        Err(e) => return SubscribeOutcome::Failed(SchedulerError::connection_failure(host, e)),
    };

    let status = response.status();
    if status == StatusCode::OK {
        return SubscribeOutcome::Streaming(response);
    }

    if status == StatusCode::TEMPORARY_REDIRECT {
        let leader = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(leader_from_location);
        if let Some(leader) = leader {
            return SubscribeOutcome::Redirected(leader);
        }
    }

    let body = response.text().await.unwrap_or_default();
    SubscribeOutcome::Failed(SchedulerError::connection_failure(
        host,
        format!("{status} {body}"),
    ))
}

/// Owns the HTTP client, the leader, and the active stream.
pub struct ConnectionManager {
    client: reqwest::Client,
    masters: Vec<String>,
    leader: Option<String>,
    stream_id: Option<String>,
    stream: Option<EventStream>,
    state: ConnectionState,
    request_timeout: Duration,
}

impl ConnectionManager {
    /// Create a manager for the configured masters.
    pub fn new(config: &Config) -> SchedulerResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        // No whole-request timeout: the subscription response stays open.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.request_timeout)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            masters: config.masters.clone(),
            leader: None,
            stream_id: None,
            stream: None,
            state: ConnectionState::Disconnected,
            request_timeout: config.request_timeout,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The master currently holding our subscription.
    pub fn leader(&self) -> Option<&str> {
        self.leader.as_deref()
    }

    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.state == ConnectionState::Subscribed && self.stream.is_some()
    }

    /// Subscribe, trying each candidate master in order.
    pub async fn subscribe(&mut self, call: &Call) -> SchedulerResult<&mut EventStream> {
        self.release();
        self.state = ConnectionState::Connecting;

        let mut queue: VecDeque<String> = self.masters.iter().cloned().collect();
        let mut tried: Vec<String> = Vec::with_capacity(queue.len());

        while let Some(host) = queue.pop_front() {
            if tried.contains(&host) {
                continue;
            }
            tried.push(host.clone());

            match try_subscribe(&self.client, &host, call).await {
                SubscribeOutcome::Streaming(response) => {
                    self.stream_id = response
                        .headers()
                        .get(STREAM_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);

                    info!(
                        leader = %host,
                        stream_id = ?self.stream_id,
                        "Subscribed to master"
                    );

                    self.leader = Some(host.clone());
                    self.state = ConnectionState::Subscribed;
                    return Ok(self.stream.insert(EventStream::new(host, response)));
                }
                SubscribeOutcome::Redirected(leader) => {
                    info!(host = %host, leader = %leader, "Master redirected to leader");
                    if !tried.contains(&leader) {
                        queue.push_front(leader);
                    }
                }
                SubscribeOutcome::Failed(e) => {
                    warn!(host = %host, error = %e, "Master unavailable, trying next candidate");
                }
            }
        }

        self.state = ConnectionState::Disconnected;
        Err(SchedulerError::NoLeaderAvailable {
            attempted: tried.len(),
        })
    }

    /// POST a message to `host`, or to the leader when `host` is `None`.
    ///
    /// Returns the raw status; classifying it is up to the caller.
    pub async fn send<T: Serialize + ?Sized>(
        &mut self,
        message: &T,
        host: Option<&str>,
    ) -> SchedulerResult<StatusCode> {
        let host = match host {
            Some(host) => host,
            None => self.leader.as_deref().ok_or(SchedulerError::NotSubscribed)?,
        };

        let mut request = self
            .client
            .post(scheduler_url(host))
            .json(message)
            .timeout(self.request_timeout);

        if let Some(stream_id) = &self.stream_id {
            request = request.header(STREAM_ID_HEADER, stream_id);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(host = %host, status = %status, body = %body, "Call not accepted");
        }

        Ok(status)
    }

    /// Read the next event from the active stream.
    pub async fn next_event(&mut self) -> SchedulerResult<Option<Event>> {
        match self.stream.as_mut() {
            Some(stream) => stream.next_event().await,
            None => Ok(None),
        }
    }

    /// Bound how long a single read may wait for bytes.
    pub fn set_idle_timeout(&mut self, timeout: Option<Duration>) {
        if let Some(stream) = self.stream.as_mut() {
            stream.idle_timeout = timeout;
        }
    }

    /// Release the active stream. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        if let Some(leader) = &self.leader {
            info!(leader = %leader, "Closing subscription stream");
        }

        self.release();
        self.state = ConnectionState::Closed;
    }

    fn release(&mut self) {
        self.stream = None;
        self.leader = None;
        self.stream_id = None;
    }
}
