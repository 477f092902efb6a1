#![warn(missing_docs)]

//! gevlink-core: foundational types and seams.
//!
//! This crate provides the minimal set of core utilities shared across all
//! layers of the gevlink workspace:
//! - Configuration types
//! - Error handling
//! - Protocol constants
//! - Transport and device-control abstractions
//!
//! Protocol-specific logic lives in specialized crates:
//! - `gevlink-protocol`: GVCP packet codec and bootstrap register map
//! - `gevlink-device`: control channel, heartbeat, MTU probe, schema
//!   bootstrap and the device session facade

/// Protocol constants shared across layers.
pub mod constants {
    /// UDP port a GigE Vision device listens on for control traffic.
    pub const GVCP_PORT: u16 = 3956;
    /// Largest payload carried by a single read/write memory transfer.
    pub const GVCP_DATA_SIZE_MAX: usize = 512;
    /// Default number of attempts for one command/ack exchange.
    pub const GVCP_N_RETRIES_DEFAULT: u32 = 6;
    /// Default per-attempt acknowledge timeout, in milliseconds.
    pub const GVCP_TIMEOUT_MS_DEFAULT: u64 = 500;
    /// Receive scratch buffer size.
    ///
    /// Must hold the largest acknowledge the protocol defines: an 8 byte
    /// header, a 4 byte address and `GVCP_DATA_SIZE_MAX` bytes of data.
    pub const DEVICE_BUFFER_SIZE: usize = 1024;
    /// Default privilege heartbeat period.
    pub const HEARTBEAT_PERIOD_US_DEFAULT: u64 = 1_000_000;
    /// Delay between heartbeat register read retries, in milliseconds.
    pub const HEARTBEAT_RETRY_DELAY_MS: u64 = 10;
    /// Total time the heartbeat keeps retrying a failed register read,
    /// in seconds.
    pub const HEARTBEAT_RETRY_TIMEOUT_S: u64 = 5;
    /// Smallest stream packet size the MTU probe will consider.
    pub const GVSP_MINIMUM_PACKET_SIZE: u32 = 576;
    /// Largest stream packet size the MTU probe will consider.
    pub const GVSP_MAXIMUM_PACKET_SIZE: u32 = 65500;
    /// IP plus UDP header bytes counted in a stream packet size but not
    /// delivered to the receiving socket.
    pub const GVSP_PACKET_UDP_OVERHEAD: u32 = 28;
    /// Fixed length of the NUL-terminated GenICam XML URL registers.
    pub const XML_URL_SIZE: usize = 512;
}

/// Configuration options for the control session.
pub mod config;
/// Device I/O capability seam.
pub mod control;
/// Error types and results.
pub mod error;
/// Transport abstraction for pluggable control I/O.
pub mod transport;
