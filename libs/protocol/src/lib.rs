//! # mesos-solr-protocol
//!
//! Wire-level types for the Mesos scheduler HTTP API (v1, JSON).
//!
//! ## Modules
//!
//! - `types`: typed IDs, offers, resources and task launches
//! - `call`: outbound calls (SUBSCRIBE, ACCEPT, DECLINE, TEARDOWN, RECONCILE)
//! - `event`: inbound events and their decoding
//! - `recordio`: length-prefixed framing of the subscription stream
//!
//! Nothing in this crate performs I/O.

mod macros;

pub mod call;
pub mod error;
pub mod event;
pub mod recordio;
pub mod types;

pub use call::{Call, CallKind};
pub use error::DecodeError;
pub use event::{Event, Subscribed, TaskStatus};
pub use recordio::RecordDecoder;
pub use types::*;
