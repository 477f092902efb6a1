//! GVCP packet encoding and decoding.
//!
//! Provides binary serialization of control requests and acknowledges for
//! transmission over UDP. Both directions are covered: the host side builds
//! requests and parses acknowledges, a device (or device simulator) parses
//! requests and builds acknowledges.

use std::io::{self, Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use gevlink_core::constants::GVCP_DATA_SIZE_MAX;

use crate::packet::{AckStatus, Command, EnumConverter, PacketId, PacketType};

/// Size of the fixed GVCP header.
pub const GVCP_HEADER_SIZE: usize = 8;

/// Flag bit asking the device to acknowledge the command.
const FLAG_ACK_REQUIRED: u8 = 0x01;

/// Size of a pending acknowledge: header plus reserved and timeout words.
pub const PENDING_ACK_SIZE: usize = GVCP_HEADER_SIZE + 4;

// ============================================================================
// Host side: request builders
// ============================================================================

/// A control request to be sent to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GvcpRequest<'a> {
    /// Read `size` bytes of device memory at `address`.
    ReadMemory {
        /// Start address of the transfer.
        address: u64,
        /// Number of bytes to read.
        size: u16,
    },
    /// Write `data` to device memory at `address`.
    WriteMemory {
        /// Start address of the transfer.
        address: u64,
        /// Bytes to write.
        data: &'a [u8],
    },
    /// Read the 32-bit register at `address`.
    ReadRegister {
        /// Register address.
        address: u64,
    },
    /// Write `value` to the 32-bit register at `address`.
    WriteRegister {
        /// Register address.
        address: u64,
        /// Value to write.
        value: u32,
    },
}

impl GvcpRequest<'_> {
    /// The command word this request is encoded with.
    pub fn command(&self) -> Command {
        match self {
            GvcpRequest::ReadMemory { .. } => Command::ReadMemoryCmd,
            GvcpRequest::WriteMemory { .. } => Command::WriteMemoryCmd,
            GvcpRequest::ReadRegister { .. } => Command::ReadRegisterCmd,
            GvcpRequest::WriteRegister { .. } => Command::WriteRegisterCmd,
        }
    }

    /// Operation name used in log messages and error reporting.
    pub fn operation(&self) -> &'static str {
        match self {
            GvcpRequest::ReadMemory { .. } => "read_memory",
            GvcpRequest::WriteMemory { .. } => "write_memory",
            GvcpRequest::ReadRegister { .. } => "read_register",
            GvcpRequest::WriteRegister { .. } => "write_register",
        }
    }

    /// The minimum byte count of a complete acknowledge for this request.
    pub fn expected_ack_size(&self) -> usize {
        match self {
            GvcpRequest::ReadMemory { size, .. } => GVCP_HEADER_SIZE + 4 + *size as usize,
            GvcpRequest::WriteMemory { .. } => GVCP_HEADER_SIZE + 4,
            GvcpRequest::ReadRegister { .. } => GVCP_HEADER_SIZE + 4,
            GvcpRequest::WriteRegister { .. } => GVCP_HEADER_SIZE + 4,
        }
    }

    /// Encodes the request into a datagram carrying `packet_id`.
    ///
    /// Transfers larger than [`GVCP_DATA_SIZE_MAX`] are rejected; splitting
    /// a range into conforming transfers is the caller's job.
    pub fn encode(&self, packet_id: PacketId) -> io::Result<Vec<u8>> {
        let transfer_len = match self {
            GvcpRequest::ReadMemory { size, .. } => *size as usize,
            GvcpRequest::WriteMemory { data, .. } => data.len(),
            _ => 0,
        };
        if transfer_len > GVCP_DATA_SIZE_MAX {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("transfer of {transfer_len} bytes exceeds the {GVCP_DATA_SIZE_MAX} byte maximum"),
            ));
        }

        let payload_len = match self {
            GvcpRequest::ReadMemory { .. } => 8,
            GvcpRequest::WriteMemory { data, .. } => 4 + data.len(),
            GvcpRequest::ReadRegister { .. } => 4,
            GvcpRequest::WriteRegister { .. } => 8,
        };

        let mut buffer = Vec::with_capacity(GVCP_HEADER_SIZE + payload_len);
        buffer.write_u8(PacketType::Cmd.to_wire())?;
        buffer.write_u8(FLAG_ACK_REQUIRED)?;
        buffer.write_u16::<BigEndian>(self.command().to_wire())?;
        buffer.write_u16::<BigEndian>(payload_len as u16)?;
        buffer.write_u16::<BigEndian>(packet_id)?;

        match self {
            GvcpRequest::ReadMemory { address, size } => {
                buffer.write_u32::<BigEndian>(*address as u32)?;
                buffer.write_u32::<BigEndian>(*size as u32)?;
            }
            GvcpRequest::WriteMemory { address, data } => {
                buffer.write_u32::<BigEndian>(*address as u32)?;
                buffer.write_all(data)?;
            }
            GvcpRequest::ReadRegister { address } => {
                buffer.write_u32::<BigEndian>(*address as u32)?;
            }
            GvcpRequest::WriteRegister { address, value } => {
                buffer.write_u32::<BigEndian>(*address as u32)?;
                buffer.write_u32::<BigEndian>(*value)?;
            }
        }

        Ok(buffer)
    }
}

// ============================================================================
// Host side: acknowledge parsing
// ============================================================================

/// A received acknowledge frame, classified but not yet interpreted.
#[derive(Debug)]
pub struct AckFrame<'a> {
    packet_type: u8,
    status: u8,
    command: u16,
    length: u16,
    packet_id: PacketId,
    payload: &'a [u8],
}

impl<'a> AckFrame<'a> {
    /// Parses the header of a received datagram.
    ///
    /// Frames shorter than the fixed header are rejected; a payload shorter
    /// than the advertised length is kept truncated, the caller checks frame
    /// completeness against the ack size it expects.
    pub fn parse(buffer: &'a [u8]) -> io::Result<AckFrame<'a>> {
        if buffer.len() < GVCP_HEADER_SIZE {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "ack shorter than header"));
        }
        let mut cursor = Cursor::new(buffer);
        let packet_type = cursor.read_u8()?;
        let status = cursor.read_u8()?;
        let command = cursor.read_u16::<BigEndian>()?;
        let length = cursor.read_u16::<BigEndian>()?;
        let packet_id = cursor.read_u16::<BigEndian>()?;

        Ok(AckFrame {
            packet_type,
            status,
            command,
            length,
            packet_id,
            payload: &buffer[GVCP_HEADER_SIZE..],
        })
    }

    /// Classified packet type, or `None` for values the protocol does not
    /// define.
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::try_from(self.packet_type).ok()
    }

    /// True when the frame is an error or unknown-error acknowledge.
    pub fn is_error(&self) -> bool {
        matches!(self.packet_type(), Some(PacketType::Error) | Some(PacketType::UnknownError))
    }

    /// Decoded status byte.
    pub fn status(&self) -> AckStatus {
        AckStatus::from_wire(self.status)
    }

    /// Command word, or `None` for values the protocol does not define.
    pub fn command(&self) -> Option<Command> {
        Command::try_from(self.command).ok()
    }

    /// Advertised payload length.
    pub fn length(&self) -> u16 {
        self.length
    }

    /// Echoed packet identifier.
    pub fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    /// Raw payload after the header.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Deadline extension of a pending acknowledge, in milliseconds.
    ///
    /// `None` when the frame is not a complete pending acknowledge.
    pub fn pending_ack_timeout(&self) -> Option<u64> {
        if self.command() != Some(Command::PendingAck) || self.payload.len() < 4 {
            return None;
        }
        // Payload is a reserved word followed by the timeout word.
        Some(u16::from_be_bytes([self.payload[2], self.payload[3]]) as u64)
    }

    /// Data bytes of a read-memory acknowledge (payload minus the echoed
    /// address word).
    pub fn read_memory_data(&self) -> Option<&'a [u8]> {
        if self.payload.len() < 4 {
            return None;
        }
        Some(&self.payload[4..])
    }

    /// Register value of a read-register acknowledge.
    pub fn read_register_value(&self) -> Option<u32> {
        if self.payload.len() < 4 {
            return None;
        }
        Some(u32::from_be_bytes([
            self.payload[0],
            self.payload[1],
            self.payload[2],
            self.payload[3],
        ]))
    }
}

// ============================================================================
// Device side: request parsing and acknowledge builders
// ============================================================================

/// A parsed control request, as seen by a device or device simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    /// Command word of the request.
    pub command: Command,
    /// Packet identifier to echo in the acknowledge.
    pub packet_id: PacketId,
    /// Start address of the access.
    pub address: u64,
    /// Requested size for reads, `data.len()` for writes.
    pub size: u32,
    /// Payload bytes of a write request.
    pub data: Vec<u8>,
}

impl RequestFrame {
    /// Parses a received command datagram.
    pub fn parse(buffer: &[u8]) -> io::Result<RequestFrame> {
        if buffer.len() < GVCP_HEADER_SIZE {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "command shorter than header"));
        }
        let mut cursor = Cursor::new(buffer);
        let packet_type = cursor.read_u8()?;
        let _flags = cursor.read_u8()?;
        let command_word = cursor.read_u16::<BigEndian>()?;
        let length = cursor.read_u16::<BigEndian>()? as usize;
        let packet_id = cursor.read_u16::<BigEndian>()?;

        if packet_type != PacketType::Cmd.to_wire() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "not a command packet"));
        }
        if buffer.len() < GVCP_HEADER_SIZE + length {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated command payload"));
        }
        let command = Command::try_from(command_word).map_err(|value| {
            io::Error::new(io::ErrorKind::InvalidData, format!("unknown command {value:#06x}"))
        })?;

        let (address, size, data) = match command {
            Command::ReadMemoryCmd => {
                let address = cursor.read_u32::<BigEndian>()? as u64;
                let size = cursor.read_u32::<BigEndian>()?;
                (address, size, Vec::new())
            }
            Command::WriteMemoryCmd => {
                let address = cursor.read_u32::<BigEndian>()? as u64;
                let mut data = vec![0u8; length - 4];
                cursor.read_exact(&mut data)?;
                (address, data.len() as u32, data)
            }
            Command::ReadRegisterCmd => {
                let address = cursor.read_u32::<BigEndian>()? as u64;
                (address, 4, Vec::new())
            }
            Command::WriteRegisterCmd => {
                let address = cursor.read_u32::<BigEndian>()? as u64;
                let value = cursor.read_u32::<BigEndian>()?;
                (address, 4, value.to_be_bytes().to_vec())
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected command {other:?}"),
                ));
            }
        };

        Ok(RequestFrame { command, packet_id, address, size, data })
    }

    /// Register value of a write-register request.
    pub fn register_value(&self) -> Option<u32> {
        if self.command != Command::WriteRegisterCmd || self.data.len() != 4 {
            return None;
        }
        Some(u32::from_be_bytes([self.data[0], self.data[1], self.data[2], self.data[3]]))
    }
}

/// An acknowledge to be sent by a device in answer to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GvcpAck<'a> {
    /// Answer to a read-memory request.
    ReadMemory {
        /// Echoed start address.
        address: u64,
        /// The requested bytes.
        data: &'a [u8],
    },
    /// Answer to a write-memory request.
    WriteMemory {
        /// Number of bytes written.
        bytes_written: u16,
    },
    /// Answer to a read-register request.
    ReadRegister {
        /// The register value.
        value: u32,
    },
    /// Answer to a write-register request.
    WriteRegister,
    /// Intermediate answer asking for a deadline extension.
    Pending {
        /// Extension in milliseconds.
        timeout_ms: u16,
    },
    /// Error answer; `command` is the acknowledge command being refused.
    Error {
        /// Acknowledge command word to echo.
        command: Command,
        /// Status code describing the refusal.
        status: AckStatus,
    },
}

impl GvcpAck<'_> {
    /// Encodes the acknowledge into a datagram echoing `packet_id`.
    pub fn encode(&self, packet_id: PacketId) -> io::Result<Vec<u8>> {
        let (packet_type, status, command, payload_len) = match self {
            GvcpAck::ReadMemory { data, .. } => {
                (PacketType::Ack, AckStatus::None, Command::ReadMemoryAck, 4 + data.len())
            }
            GvcpAck::WriteMemory { .. } => {
                (PacketType::Ack, AckStatus::None, Command::WriteMemoryAck, 4)
            }
            GvcpAck::ReadRegister { .. } => {
                (PacketType::Ack, AckStatus::None, Command::ReadRegisterAck, 4)
            }
            GvcpAck::WriteRegister => (PacketType::Ack, AckStatus::None, Command::WriteRegisterAck, 4),
            GvcpAck::Pending { .. } => (PacketType::Ack, AckStatus::None, Command::PendingAck, 4),
            GvcpAck::Error { command, status } => (PacketType::Error, *status, *command, 0),
        };

        let mut buffer = Vec::with_capacity(GVCP_HEADER_SIZE + payload_len);
        buffer.write_u8(packet_type.to_wire())?;
        buffer.write_u8(status as u8)?;
        buffer.write_u16::<BigEndian>(command.to_wire())?;
        buffer.write_u16::<BigEndian>(payload_len as u16)?;
        buffer.write_u16::<BigEndian>(packet_id)?;

        match self {
            GvcpAck::ReadMemory { address, data } => {
                buffer.write_u32::<BigEndian>(*address as u32)?;
                buffer.write_all(data)?;
            }
            GvcpAck::WriteMemory { bytes_written } => {
                buffer.write_u16::<BigEndian>(0)?;
                buffer.write_u16::<BigEndian>(*bytes_written)?;
            }
            GvcpAck::ReadRegister { value } => {
                buffer.write_u32::<BigEndian>(*value)?;
            }
            GvcpAck::WriteRegister => {
                buffer.write_u32::<BigEndian>(0)?;
            }
            GvcpAck::Pending { timeout_ms } => {
                buffer.write_u16::<BigEndian>(0)?;
                buffer.write_u16::<BigEndian>(*timeout_ms)?;
            }
            GvcpAck::Error { .. } => {}
        }

        Ok(buffer)
    }
}
