#![warn(missing_docs)]

//! gevlink-device: the GigE Vision control session.
//!
//! This crate implements the control plane of a GigE Vision device:
//! - `channel`: serialized command/acknowledge exchange with retries and
//!   pending-ack deadline extension over a single UDP socket
//! - `heartbeat`: control privilege lease kept alive by a background task
//! - `mtu`: automatic stream packet size probing
//! - `schema`: GenICam XML bootstrap (URL dispatch, ZIP payloads, default
//!   feature nodes)
//! - `device`: the session facade tying it all together

/// Serialized request/acknowledge exchange over the control socket.
pub mod channel;
/// The device session facade.
pub mod device;
/// Out-of-band events emitted by the session.
pub mod event_types;
/// Control privilege heartbeat task.
pub mod heartbeat;
/// Automatic stream packet size probing.
pub mod mtu;
/// GenICam schema bootstrap and the register-backed feature registry.
pub mod schema;
/// UDP transport for the control channel.
pub mod socket;

pub use channel::ControlChannel;
pub use device::{GvDevice, IpConfigurationMode, StreamParams};
pub use event_types::DeviceEvent;
pub use schema::{FetchOptions, HttpFetcher};
