use std::{default::Default, time::Duration};

use crate::constants::{
    DEVICE_BUFFER_SIZE, GVCP_N_RETRIES_DEFAULT, GVCP_TIMEOUT_MS_DEFAULT,
    HEARTBEAT_PERIOD_US_DEFAULT, HEARTBEAT_RETRY_DELAY_MS, HEARTBEAT_RETRY_TIMEOUT_S,
};

/// When the stream packet size is re-negotiated during stream creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PacketSizeAdjustment {
    /// Never run the automatic packet size probe.
    Never,
    /// Run the probe the first time a stream is created.
    Once,
    /// Run the probe on every stream creation.
    Always,
    /// Run the probe on every stream creation, but keep the configured size
    /// if it still passes the test packet check.
    OnFailure,
    /// Run the probe on the first stream creation, keeping the configured
    /// size if it still passes the test packet check.
    #[default]
    OnFailureOnce,
}

/// Option bits consumed by the external streaming receiver.
pub mod stream_options {
    /// No options.
    pub const NONE: u32 = 0;
    /// Ask the receiver not to use a kernel packet socket.
    pub const PACKET_SOCKET_DISABLED: u32 = 1 << 0;
}

#[derive(Clone, Debug)]
/// Configuration options to tune control session behavior.
pub struct Config {
    /// Number of attempts for one command/ack exchange.
    pub gvcp_n_retries: u32,
    /// Acknowledge timeout for each attempt.
    pub gvcp_timeout: Duration,
    /// Interval between privilege register heartbeat reads.
    pub heartbeat_period: Duration,
    /// Delay between retries of a failed heartbeat register read.
    pub heartbeat_retry_delay: Duration,
    /// Total time a failing heartbeat register read is retried before the
    /// iteration is abandoned.
    pub heartbeat_retry_timeout: Duration,
    /// Receive scratch buffer size in bytes. Must hold the largest ack.
    pub buffer_size: usize,
    /// Stream packet size re-negotiation policy.
    pub packet_size_adjustment: PacketSizeAdjustment,
    /// Option bits handed to the external streaming receiver.
    pub stream_options: u32,
    /// Control socket receive buffer size in bytes (None = system default).
    /// Corresponds to SO_RCVBUF.
    pub socket_recv_buffer_size: Option<usize>,
    /// Timeout applied by the injected HTTP fetcher (None = fetcher default).
    pub http_timeout: Option<Duration>,
    /// Whether the injected HTTP fetcher should follow redirects.
    pub http_follow_redirects: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gvcp_n_retries: GVCP_N_RETRIES_DEFAULT,
            gvcp_timeout: Duration::from_millis(GVCP_TIMEOUT_MS_DEFAULT),
            heartbeat_period: Duration::from_micros(HEARTBEAT_PERIOD_US_DEFAULT),
            heartbeat_retry_delay: Duration::from_millis(HEARTBEAT_RETRY_DELAY_MS),
            heartbeat_retry_timeout: Duration::from_secs(HEARTBEAT_RETRY_TIMEOUT_S),
            buffer_size: DEVICE_BUFFER_SIZE,
            packet_size_adjustment: PacketSizeAdjustment::default(),
            stream_options: stream_options::NONE,
            socket_recv_buffer_size: None,
            http_timeout: None,
            http_follow_redirects: false,
        }
    }
}
