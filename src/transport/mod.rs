//! # Transport Primitives
//!
//! Socket-pattern wrappers over loopback TCP, in two duality pairs:
//!
//! - **Fan-out publish / fan-in subscribe** ([`Publisher`] / [`Subscriber`]):
//!   best-effort, unacknowledged, one-to-many distribution. A publish call
//!   returns after handing the payload to the transport; a subscriber that
//!   has not joined yet never sees it (silent drop).
//! - **Request / reply** ([`Requester`] / [`Replier`]): synchronous,
//!   single-in-flight exchange with an explicit per-request timeout. The
//!   acknowledgment discipline here is what the reliable queue builds on.
//!
//! Ports are allocated from the ephemeral range at bind time unless given
//! explicitly, and are immutable for the endpoint's lifetime. Every
//! endpoint owns its sockets outright and releases them on `close`; any
//! operation after `close` fails with
//! [`ClosedEndpoint`](crate::error::FabricError::ClosedEndpoint).

pub mod frame;
pub mod publisher;
pub mod replier;
pub mod requester;
pub mod subscriber;

pub use frame::{MAX_FRAME_LEN, decode, encode};
pub use publisher::Publisher;
pub use replier::Replier;
pub use requester::Requester;
pub use subscriber::Subscriber;
