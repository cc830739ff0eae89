//! mesos-solr scheduler driver
//!
//! Subscribes a framework to a Mesos master over the v1 scheduler HTTP API
//! and places SolrCloud tasks on offers that carry enough resources.
//!
//! ## Architecture
//!
//! - **Connection**: leader selection across candidate masters, the
//!   subscription stream and short request/response calls
//! - **Dispatcher**: routes decoded events to typed handlers
//! - **Scheduler**: the controller; owns the framework identity and turns
//!   offers into ACCEPT or DECLINE decisions
//!
//! Everything runs on a single task. Other tasks steer a running scheduler
//! through a [`SchedulerHandle`].

pub mod backoff;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod scheduler;

pub use backoff::BackoffPolicy;
pub use config::Config;
pub use connection::{ConnectionManager, ConnectionState, EventStream};
pub use dispatcher::{dispatch, Dispatched, EventHandler};
pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerState, MISSED_HEARTBEAT_LIMIT};
