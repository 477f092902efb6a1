//! Serialized request/acknowledge exchange over the control socket.
//!
//! The control channel owns the UDP socket and the receive scratch buffer.
//! At most one exchange is in flight at a time: the channel lock is held
//! across the whole retry loop, so wire traffic of concurrent callers never
//! interleaves and the packet identifier in an acknowledge always refers to
//! the request currently being waited on.

use std::{
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

use gevlink_core::{
    config::Config,
    constants::GVCP_DATA_SIZE_MAX,
    control::DeviceControl,
    error::{DeviceError, Result},
    transport::ControlSocket,
};
use gevlink_protocol::{
    codec::PENDING_ACK_SIZE,
    packet::{AckStatus, Command, PacketType, INITIAL_PACKET_ID},
    next_packet_id, AckFrame, GvcpRequest, GVCP_HEADER_SIZE,
};
use tracing::{debug, info, warn};

struct Io {
    socket: Box<dyn ControlSocket>,
    scratch: Vec<u8>,
    packet_id: u16,
}

/// Serialized command/acknowledge exchange path of one control session.
pub struct ControlChannel {
    io: Mutex<Io>,
    is_controller: AtomicBool,
    n_retries: u32,
    timeout: Duration,
}

impl ControlChannel {
    /// Creates a channel over `socket` with the retry budget and buffer
    /// size taken from `config`.
    pub fn new(socket: Box<dyn ControlSocket>, config: &Config) -> Self {
        ControlChannel {
            io: Mutex::new(Io {
                socket,
                scratch: vec![0u8; config.buffer_size],
                packet_id: INITIAL_PACKET_ID,
            }),
            is_controller: AtomicBool::new(false),
            n_retries: config.gvcp_n_retries.max(1),
            timeout: config.gvcp_timeout,
        }
    }

    /// Local address of the control socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        let io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        io.socket.local_addr()
    }

    /// Whether this session currently holds control privilege.
    ///
    /// Read without the channel lock; a stale value is acceptable to the
    /// heartbeat, which is the only other reader.
    pub fn is_controller(&self) -> bool {
        self.is_controller.load(Ordering::Relaxed)
    }

    /// Updates the control privilege flag.
    pub fn set_controller(&self, is_controller: bool) {
        self.is_controller.store(is_controller, Ordering::Relaxed);
    }

    /// Runs one complete exchange: send the request, collect the matching
    /// acknowledge, retrying and honoring pending-ack deadline extensions.
    ///
    /// For read operations `out` receives the returned bytes; it is
    /// zero-filled on every failure path. The packet identifier advances
    /// once per exchange, never on retransmits or pending-ack extensions.
    pub fn transact(&self, request: &GvcpRequest<'_>, mut out: Option<&mut [u8]>) -> Result<()> {
        let operation = request.operation();
        let expected_ack = request.command().ack();
        let ack_size = request.expected_ack_size();

        let mut conclusive = false;
        let mut command_error = AckStatus::None;

        {
            let mut io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
            let Io { socket, scratch, packet_id } = &mut *io;

            if ack_size > scratch.len() {
                return Err(DeviceError::InvalidParameter(format!(
                    "{operation} acknowledge ({ack_size} bytes) exceeds the receive buffer"
                )));
            }

            *packet_id = next_packet_id(*packet_id);
            let packet_id = *packet_id;
            let packet = request
                .encode(packet_id)
                .map_err(|err| DeviceError::Unknown(err.to_string()))?;

            'attempts: for _ in 0..self.n_retries {
                if let Err(err) = socket.send(&packet) {
                    warn!("[{operation}] command sending error: {err}");
                    continue;
                }

                let mut deadline = Instant::now() + self.timeout;

                loop {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        warn!("[{operation}] ack reception timeout");
                        break;
                    }

                    let count = match socket.recv_timeout(scratch, remaining) {
                        Ok(count) => count,
                        Err(err)
                            if matches!(
                                err.kind(),
                                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                            ) =>
                        {
                            warn!("[{operation}] ack reception timeout");
                            break;
                        }
                        Err(err) => {
                            warn!("[{operation}] ack reception error: {err}");
                            break;
                        }
                    };

                    if count < GVCP_HEADER_SIZE {
                        debug!("[{operation}] runt frame ({count} bytes)");
                        continue;
                    }
                    let frame = match AckFrame::parse(&scratch[..count]) {
                        Ok(frame) => frame,
                        Err(_) => continue,
                    };

                    // A pending ack moves the deadline; it consumes neither
                    // a retry nor the packet identifier.
                    if frame.command() == Some(Command::PendingAck) && count >= PENDING_ACK_SIZE {
                        if let Some(extension_ms) = frame.pending_ack_timeout() {
                            debug!("[{operation}] pending ack timeout = {extension_ms}");
                            deadline = Instant::now() + Duration::from_millis(extension_ms);
                        }
                        continue;
                    }

                    match frame.packet_type() {
                        Some(PacketType::Error) | Some(PacketType::UnknownError) => {
                            if frame.command() == expected_ack && frame.packet_id() == packet_id {
                                command_error = frame.status();
                                conclusive = true;
                                break 'attempts;
                            }
                            info!("[{operation}] unexpected answer");
                        }
                        Some(PacketType::Ack)
                            if frame.command() == expected_ack
                                && frame.packet_id() == packet_id
                                && count >= ack_size =>
                        {
                            if let Some(out) = out.as_deref_mut() {
                                copy_ack_payload(request, &frame, out);
                            }
                            conclusive = true;
                            break 'attempts;
                        }
                        _ => {
                            // Wrong command, stale identifier or truncated
                            // frame: keep listening within the deadline.
                            info!("[{operation}] unexpected answer");
                        }
                    }
                }
            }
        }

        if conclusive && command_error == AckStatus::None {
            return Ok(());
        }

        if let Some(out) = out.as_deref_mut() {
            out.fill(0);
        }

        if command_error != AckStatus::None {
            Err(DeviceError::Protocol { operation, message: command_error.to_string() })
        } else {
            Err(DeviceError::Timeout { operation })
        }
    }
}

fn copy_ack_payload(request: &GvcpRequest<'_>, frame: &AckFrame<'_>, out: &mut [u8]) {
    match request {
        GvcpRequest::ReadMemory { .. } => {
            if let Some(data) = frame.read_memory_data() {
                let n = out.len().min(data.len());
                out[..n].copy_from_slice(&data[..n]);
            }
        }
        GvcpRequest::ReadRegister { .. } => {
            if let Some(value) = frame.read_register_value() {
                let bytes = value.to_be_bytes();
                let n = out.len().min(bytes.len());
                out[..n].copy_from_slice(&bytes[..n]);
            }
        }
        _ => {}
    }
}

impl DeviceControl for ControlChannel {
    /// Reads an arbitrary-length range by splitting it into codec-sized
    /// transfers. The first failing chunk aborts the whole operation and
    /// zero-fills the complete output buffer.
    fn read_memory(&self, address: u64, buffer: &mut [u8]) -> Result<()> {
        let result = (|| {
            for (i, chunk) in buffer.chunks_mut(GVCP_DATA_SIZE_MAX).enumerate() {
                let chunk_address = address + (i * GVCP_DATA_SIZE_MAX) as u64;
                let request =
                    GvcpRequest::ReadMemory { address: chunk_address, size: chunk.len() as u16 };
                self.transact(&request, Some(chunk))?;
            }
            Ok(())
        })();
        if result.is_err() {
            buffer.fill(0);
        }
        result
    }

    /// Writes an arbitrary-length range chunk by chunk. The protocol has no
    /// rollback: on a chunk failure the device range is indeterminate and
    /// the chunk's error is returned.
    fn write_memory(&self, address: u64, data: &[u8]) -> Result<()> {
        for (i, chunk) in data.chunks(GVCP_DATA_SIZE_MAX).enumerate() {
            let chunk_address = address + (i * GVCP_DATA_SIZE_MAX) as u64;
            let request = GvcpRequest::WriteMemory { address: chunk_address, data: chunk };
            self.transact(&request, None)?;
        }
        Ok(())
    }

    fn read_register(&self, address: u64) -> Result<u32> {
        let mut value = [0u8; 4];
        self.transact(&GvcpRequest::ReadRegister { address }, Some(&mut value))?;
        Ok(u32::from_be_bytes(value))
    }

    fn write_register(&self, address: u64, value: u32) -> Result<()> {
        self.transact(&GvcpRequest::WriteRegister { address, value }, None)
    }
}
