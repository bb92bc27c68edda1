//! Real-time event channel client.
//!
//! Maintains one persistent WebSocket to the event service and fans
//! inbound envelopes out to topic listeners. The [`RealtimeClient`]
//! handle hides the connection lifecycle: transient closes reconnect
//! with exponential backoff, permanent and session-replaced closes
//! stay down, and sequence gaps are surfaced as their own topic.
//!
//! ```no_run
//! use huddle_realtime::{RealtimeClient, SocketConfig, Topic};
//!
//! # async fn demo() -> huddle_realtime::RealtimeResult<()> {
//! let client = RealtimeClient::new(SocketConfig::new().with_auth_token("token"));
//! client.subscribe(Topic::Event, |event| {
//!     println!("{event:?}");
//! });
//! client.connect("wss://events.example.com/channel").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod machine;
pub mod policy;
pub mod router;
pub mod sequence;
mod transport;

pub use config::{BackoffConfig, SocketConfig};
pub use error::{RealtimeError, RealtimeResult};
pub use machine::{ConnectionState, RealtimeClient};
pub use policy::{ReconnectVerdict, classify};
pub use router::{ChannelEvent, EventRouter, ListenerId, OfflineKind, Topic};
pub use sequence::{SequenceCheck, SequenceTracker};

pub use huddle_protocol::{CloseEvent, EventData, InboundMessage};
