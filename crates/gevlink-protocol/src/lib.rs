#![warn(missing_docs)]

//! gevlink-protocol: GVCP packet types, codec, and register map.

/// Packet encoding and decoding.
pub mod codec;
/// Packet type, command and status enumerations, identifier sequencing.
pub mod packet;
/// Well-known bootstrap register offsets and bit masks.
pub mod registers;

pub use codec::{AckFrame, GvcpAck, GvcpRequest, RequestFrame, GVCP_HEADER_SIZE};
pub use packet::{next_packet_id, AckStatus, Command, PacketType};
