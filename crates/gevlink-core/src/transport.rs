//! Transport abstraction for pluggable control I/O.

use std::{io::Result, net::SocketAddr, time::Duration};

/// Low-level datagram socket abstraction for the control channel.
///
/// This trait allows various transports (UDP, simulator, fault injector) to
/// be plugged into the exchange state machine without coupling it to a
/// concrete implementation. The peer endpoint is fixed at construction, so
/// sends do not carry an address.
pub trait ControlSocket: Send {
    /// Sends a single datagram to the device endpoint.
    fn send(&mut self, payload: &[u8]) -> Result<usize>;

    /// Waits up to `timeout` for a datagram and reads it into `buffer`.
    ///
    /// A timeout surfaces as an `Err` of kind `WouldBlock` or `TimedOut`.
    fn recv_timeout(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Returns the local address this socket is bound to.
    fn local_addr(&self) -> Result<SocketAddr>;
}
