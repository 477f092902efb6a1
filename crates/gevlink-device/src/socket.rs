//! UDP transport for the control channel.

use std::{
    io,
    net::{SocketAddr, SocketAddrV4, UdpSocket},
    time::Duration,
};

use gevlink_core::{config::Config, transport::ControlSocket};
use socket2::Socket as Socket2;

/// Applies socket options from configuration to a UdpSocket.
pub(crate) fn apply_socket_options(socket: &UdpSocket, config: &Config) -> io::Result<()> {
    if let Some(size) = config.socket_recv_buffer_size {
        let socket2 = Socket2::from(socket.try_clone()?);
        socket2.set_recv_buffer_size(size)?;
    }
    Ok(())
}

/// [`ControlSocket`] implementation over a connected UDP socket.
///
/// The socket is bound to an ephemeral port on the host interface and
/// connected to the device control endpoint, so datagrams from other sources
/// are filtered by the kernel.
#[derive(Debug)]
pub struct UdpControlSocket {
    socket: UdpSocket,
}

impl UdpControlSocket {
    /// Binds an ephemeral port on `interface_address` and connects it to the
    /// device control endpoint.
    pub fn connect(
        interface_address: SocketAddrV4,
        device_address: SocketAddrV4,
        config: &Config,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(interface_address)?;
        apply_socket_options(&socket, config)?;
        socket.connect(device_address)?;
        Ok(UdpControlSocket { socket })
    }
}

impl ControlSocket for UdpControlSocket {
    fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
        self.socket.send(payload)
    }

    fn recv_timeout(&mut self, buffer: &mut [u8], timeout: Duration) -> io::Result<usize> {
        // A zero read timeout means "block forever" to the OS; the channel
        // never passes zero, but clamp anyway.
        let timeout = timeout.max(Duration::from_millis(1));
        self.socket.set_read_timeout(Some(timeout))?;
        self.socket.recv(buffer)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
