//! Routing of decoded events to handlers.
//!
//! Every event kind maps to exactly one [`EventHandler`] method. Kinds without
//! a typed representation fall through to a logged no-op, so new master
//! events never break the stream.

use async_trait::async_trait;
use mesos_solr_protocol::event::{ErrorEvent, Failure, Rescind, Update};
use mesos_solr_protocol::{Event, Offer, Subscribed};
use tracing::{debug, warn};

use crate::error::SchedulerResult;

/// Receiver of decoded events.
///
/// Handlers run one at a time in arrival order; an `Err` stops the event loop.
#[async_trait]
pub trait EventHandler: Send {
    async fn on_subscribed(&mut self, subscribed: Subscribed) -> SchedulerResult<()>;

    async fn on_heartbeat(&mut self) -> SchedulerResult<()>;

    async fn on_offers(&mut self, offers: Vec<Offer>) -> SchedulerResult<()>;

    async fn on_rescind(&mut self, rescind: Rescind) -> SchedulerResult<()> {
        debug!(offer_id = %rescind.offer_id, "Ignoring rescind");
        Ok(())
    }

    async fn on_update(&mut self, update: Update) -> SchedulerResult<()> {
        debug!(task_id = %update.status.task_id, "Ignoring update");
        Ok(())
    }

    async fn on_failure(&mut self, _failure: Failure) -> SchedulerResult<()> {
        Ok(())
    }

    async fn on_error(&mut self, _error: ErrorEvent) -> SchedulerResult<()> {
        Ok(())
    }
}

/// Result of routing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    Handled,
    /// No handler exists for this kind; the event was dropped.
    Unhandled(String),
}

/// Route one event to its handler.
pub async fn dispatch<H>(handler: &mut H, event: Event) -> SchedulerResult<Dispatched>
where
    H: EventHandler + ?Sized,
{
    debug!(kind = event.kind(), "Dispatching event");

    match event {
        Event::Subscribed(subscribed) => handler.on_subscribed(subscribed).await?,
        Event::Heartbeat => handler.on_heartbeat().await?,
        Event::Offers(offers) => handler.on_offers(offers).await?,
        Event::Rescind(rescind) => handler.on_rescind(rescind).await?,
        Event::Update(update) => handler.on_update(update).await?,
        Event::Failure(failure) => handler.on_failure(failure).await?,
        Event::Error(error) => handler.on_error(error).await?,
        Event::Unknown { kind, body } => {
            warn!(kind = %kind, body = %body, "No handler for event kind");
            return Ok(Dispatched::Unhandled(kind));
        }
    }

    Ok(Dispatched::Handled)
}
