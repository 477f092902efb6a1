//! Packet type, command and status enumerations for the GVCP wire format.
//!
//! Every control datagram starts with an 8 byte header: packet type,
//! status/flags byte, command word, payload length and packet identifier.
//! The enumerations here classify those header fields; the actual byte
//! shuffling lives in [`crate::codec`].

use std::{convert::TryFrom, fmt};

/// 16-bit packet identifier echoed by the device.
pub type PacketId = u16;

/// First identifier used by a fresh session.
///
/// Starting near the end of the circular counter exercises the wraparound
/// path early in every session.
pub const INITIAL_PACKET_ID: PacketId = 65300;

/// Returns the identifier to use after `id`.
///
/// Identifiers advance by one and skip `0`, which is reserved on the wire.
pub fn next_packet_id(id: PacketId) -> PacketId {
    let next = id.wrapping_add(1);
    if next == 0 {
        1
    } else {
        next
    }
}

/// Helper trait to convert enums to their wire representation.
pub trait EnumConverter {
    /// The integral wire type of the enum.
    type Wire;

    /// Converts the enum to its wire value.
    fn to_wire(&self) -> Self::Wire;
}

/// Classification of a received control frame.
#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Eq)]
pub enum PacketType {
    /// A normal acknowledge.
    Ack = 0x00,
    /// A command sent by the controlling application.
    Cmd = 0x42,
    /// An error acknowledge; the status byte carries the error code.
    Error = 0x80,
    /// An error acknowledge for a frame the device could not classify.
    UnknownError = 0x8f,
}

impl EnumConverter for PacketType {
    type Wire = u8;

    fn to_wire(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = u8;
    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(PacketType::Ack),
            0x42 => Ok(PacketType::Cmd),
            0x80 => Ok(PacketType::Error),
            0x8f => Ok(PacketType::UnknownError),
            _ => Err(value),
        }
    }
}

/// GVCP command words used by the control channel.
#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Eq)]
pub enum Command {
    /// Read one or more 32-bit registers.
    ReadRegisterCmd = 0x0080,
    /// Acknowledge for [`Command::ReadRegisterCmd`].
    ReadRegisterAck = 0x0081,
    /// Write one or more 32-bit registers.
    WriteRegisterCmd = 0x0082,
    /// Acknowledge for [`Command::WriteRegisterCmd`].
    WriteRegisterAck = 0x0083,
    /// Read a block of device memory.
    ReadMemoryCmd = 0x0084,
    /// Acknowledge for [`Command::ReadMemoryCmd`].
    ReadMemoryAck = 0x0085,
    /// Write a block of device memory.
    WriteMemoryCmd = 0x0086,
    /// Acknowledge for [`Command::WriteMemoryCmd`].
    WriteMemoryAck = 0x0087,
    /// Intermediate "still working" acknowledge carrying a deadline
    /// extension in milliseconds.
    PendingAck = 0x0089,
}

impl Command {
    /// Returns the acknowledge command answering this command, or `None`
    /// for commands that are themselves acknowledges.
    pub fn ack(&self) -> Option<Command> {
        match self {
            Command::ReadRegisterCmd => Some(Command::ReadRegisterAck),
            Command::WriteRegisterCmd => Some(Command::WriteRegisterAck),
            Command::ReadMemoryCmd => Some(Command::ReadMemoryAck),
            Command::WriteMemoryCmd => Some(Command::WriteMemoryAck),
            _ => None,
        }
    }
}

impl EnumConverter for Command {
    type Wire = u16;

    fn to_wire(&self) -> u16 {
        *self as u16
    }
}

impl TryFrom<u16> for Command {
    type Error = u16;
    fn try_from(value: u16) -> Result<Self, u16> {
        match value {
            0x0080 => Ok(Command::ReadRegisterCmd),
            0x0081 => Ok(Command::ReadRegisterAck),
            0x0082 => Ok(Command::WriteRegisterCmd),
            0x0083 => Ok(Command::WriteRegisterAck),
            0x0084 => Ok(Command::ReadMemoryCmd),
            0x0085 => Ok(Command::ReadMemoryAck),
            0x0086 => Ok(Command::WriteMemoryCmd),
            0x0087 => Ok(Command::WriteMemoryAck),
            0x0089 => Ok(Command::PendingAck),
            _ => Err(value),
        }
    }
}

/// Status code carried in the flags byte of an error acknowledge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AckStatus {
    /// No error.
    None = 0x00,
    /// Generic error.
    Generic = 0x01,
    /// The command is not implemented by the device.
    NotImplemented = 0x02,
    /// A command parameter was rejected.
    InvalidParameter = 0x03,
    /// The address does not exist in the device register space.
    InvalidAddress = 0x04,
    /// The target register or memory range is write protected.
    WriteProtect = 0x05,
    /// The address is not properly aligned.
    BadAlignment = 0x06,
    /// Access to the resource was denied.
    AccessDenied = 0x07,
    /// The device is busy.
    Busy = 0x08,
    /// Message channel mismatch.
    MsgMismatch = 0x0a,
    /// The protocol version is not supported.
    InvalidProtocol = 0x0b,
    /// No message is pending.
    NoMsg = 0x0c,
    /// The requested stream packet is not available.
    PacketUnavailable = 0x0d,
    /// Data overrun.
    DataOverrun = 0x0e,
    /// The command header is invalid.
    InvalidHeader = 0x0f,
    /// The current configuration does not allow the command.
    WrongConfig = 0x10,
    /// The requested stream packet is not yet available.
    PacketNotYetAvailable = 0x11,
    /// The packet and previous packets were removed from memory.
    PacketAndPrevRemovedFromMemory = 0x12,
    /// The packet was removed from memory.
    PacketRemovedFromMemory = 0x13,
    /// No reference time is available.
    NoRefTime = 0x14,
    /// The packet is temporarily unavailable.
    PacketTemporarilyUnavailable = 0x15,
    /// Overflow.
    Overflow = 0x16,
    /// An action command arrived too late.
    ActionLate = 0x17,
    /// Unclassified error.
    Error = 0xff,
}

impl AckStatus {
    /// Maps a wire status byte to a status code.
    ///
    /// Codes the protocol does not define collapse to [`AckStatus::Error`].
    pub fn from_wire(value: u8) -> AckStatus {
        match value {
            0x00 => AckStatus::None,
            0x01 => AckStatus::Generic,
            0x02 => AckStatus::NotImplemented,
            0x03 => AckStatus::InvalidParameter,
            0x04 => AckStatus::InvalidAddress,
            0x05 => AckStatus::WriteProtect,
            0x06 => AckStatus::BadAlignment,
            0x07 => AckStatus::AccessDenied,
            0x08 => AckStatus::Busy,
            0x0a => AckStatus::MsgMismatch,
            0x0b => AckStatus::InvalidProtocol,
            0x0c => AckStatus::NoMsg,
            0x0d => AckStatus::PacketUnavailable,
            0x0e => AckStatus::DataOverrun,
            0x0f => AckStatus::InvalidHeader,
            0x10 => AckStatus::WrongConfig,
            0x11 => AckStatus::PacketNotYetAvailable,
            0x12 => AckStatus::PacketAndPrevRemovedFromMemory,
            0x13 => AckStatus::PacketRemovedFromMemory,
            0x14 => AckStatus::NoRefTime,
            0x15 => AckStatus::PacketTemporarilyUnavailable,
            0x16 => AckStatus::Overflow,
            0x17 => AckStatus::ActionLate,
            _ => AckStatus::Error,
        }
    }

    /// Human readable name of the status code.
    pub fn as_str(&self) -> &'static str {
        match self {
            AckStatus::None => "none",
            AckStatus::Generic => "generic error",
            AckStatus::NotImplemented => "command not implemented",
            AckStatus::InvalidParameter => "invalid parameter",
            AckStatus::InvalidAddress => "invalid address",
            AckStatus::WriteProtect => "write protected address",
            AckStatus::BadAlignment => "bad address alignment",
            AckStatus::AccessDenied => "access denied",
            AckStatus::Busy => "device busy",
            AckStatus::MsgMismatch => "message mismatch",
            AckStatus::InvalidProtocol => "invalid protocol",
            AckStatus::NoMsg => "no message",
            AckStatus::PacketUnavailable => "packet unavailable",
            AckStatus::DataOverrun => "data overrun",
            AckStatus::InvalidHeader => "invalid header",
            AckStatus::WrongConfig => "wrong configuration",
            AckStatus::PacketNotYetAvailable => "packet not yet available",
            AckStatus::PacketAndPrevRemovedFromMemory => {
                "packet and previous packets removed from memory"
            }
            AckStatus::PacketRemovedFromMemory => "packet removed from memory",
            AckStatus::NoRefTime => "no reference time",
            AckStatus::PacketTemporarilyUnavailable => "packet temporarily unavailable",
            AckStatus::Overflow => "overflow",
            AckStatus::ActionLate => "action late",
            AckStatus::Error => "unknown error",
        }
    }
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
