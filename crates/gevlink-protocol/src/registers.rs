//! Well-known bootstrap register offsets and bit masks.
//!
//! Every GigE Vision device exposes this fixed register block below
//! 0x10000; the session facade uses it for capability discovery, privilege
//! management and schema bootstrap before any device-specific schema is
//! available.

/// Device mode register.
pub const DEVICE_MODE: u64 = 0x0004;
/// Device mode flag: the device byte order is big endian.
pub const DEVICE_MODE_BIG_ENDIAN: u32 = 1 << 31;

/// IP configuration register.
pub const IP_CONFIGURATION: u64 = 0x0014;
/// IP configuration bit: link-local addressing enabled.
pub const IP_CONFIGURATION_LLA: u32 = 1 << 2;
/// IP configuration bit: DHCP enabled.
pub const IP_CONFIGURATION_DHCP: u32 = 1 << 1;
/// IP configuration bit: persistent IP enabled.
pub const IP_CONFIGURATION_PERSISTENT_IP: u32 = 1 << 0;

/// Current IP address register.
pub const CURRENT_IP_ADDRESS: u64 = 0x0024;
/// Current subnet mask register.
pub const CURRENT_SUBNET_MASK: u64 = 0x0034;
/// Current default gateway register.
pub const CURRENT_DEFAULT_GATEWAY: u64 = 0x0044;

/// Manufacturer name string register (32 bytes).
pub const MANUFACTURER_NAME: u64 = 0x0048;
/// Model name string register (32 bytes).
pub const MODEL_NAME: u64 = 0x0068;
/// Device version string register (32 bytes).
pub const DEVICE_VERSION: u64 = 0x0088;
/// Manufacturer info string register (48 bytes).
pub const MANUFACTURER_INFO: u64 = 0x00a8;
/// Serial number / device id string register (16 bytes).
pub const SERIAL_NUMBER: u64 = 0x00d8;

/// First GenICam XML URL slot (512 bytes, NUL terminated).
pub const XML_URL_0: u64 = 0x0200;
/// Second GenICam XML URL slot (512 bytes, NUL terminated).
pub const XML_URL_1: u64 = 0x0400;

/// Persistent IP address register.
pub const PERSISTENT_IP_ADDRESS: u64 = 0x064c;
/// Persistent subnet mask register.
pub const PERSISTENT_SUBNET_MASK: u64 = 0x065c;
/// Persistent default gateway register.
pub const PERSISTENT_DEFAULT_GATEWAY: u64 = 0x066c;

/// Number of stream channels register.
pub const N_STREAM_CHANNELS: u64 = 0x0904;

/// GVCP capability register.
pub const GVCP_CAPABILITY: u64 = 0x0934;
/// Capability bit: the device answers stream packet resend requests.
pub const GVCP_CAPABILITY_PACKET_RESEND: u32 = 1 << 6;
/// Capability bit: the device implements write-memory.
pub const GVCP_CAPABILITY_WRITE_MEMORY: u32 = 1 << 5;

/// Heartbeat timeout register, in milliseconds.
pub const HEARTBEAT_TIMEOUT: u64 = 0x0938;

/// Timestamp tick frequency, high word.
pub const TIMESTAMP_TICK_FREQUENCY_HIGH: u64 = 0x093c;
/// Timestamp tick frequency, low word.
pub const TIMESTAMP_TICK_FREQUENCY_LOW: u64 = 0x0940;

/// Control channel privilege register.
pub const CONTROL_CHANNEL_PRIVILEGE: u64 = 0x0a00;
/// Privilege bit: a controller holds the channel.
pub const CONTROL_CHANNEL_PRIVILEGE_CONTROL: u32 = 1 << 1;
/// Privilege bit: the controller demanded exclusive access.
pub const CONTROL_CHANNEL_PRIVILEGE_EXCLUSIVE: u32 = 1 << 0;

/// Base address of the first stream channel register block.
pub const STREAM_CHANNEL_BASE: u64 = 0x0d00;
/// Stride in bytes between stream channel register blocks.
pub const STREAM_CHANNEL_STRIDE: u64 = 0x40;
/// Offset of the host port register inside a stream channel block
/// (port in the low 16 bits).
pub const STREAM_CHANNEL_PORT: u64 = 0x00;
/// Offset of the packet size register inside a stream channel block.
pub const STREAM_CHANNEL_PACKET_SIZE: u64 = 0x04;
/// Packet size register bit: emit one test packet.
pub const STREAM_CHANNEL_FIRE_TEST_PACKET: u32 = 1 << 31;
/// Packet size register bit: do not fragment stream packets.
pub const STREAM_CHANNEL_DO_NOT_FRAGMENT: u32 = 1 << 30;
/// Packet size register bit: stream data is big endian.
pub const STREAM_CHANNEL_BIG_ENDIAN: u32 = 1 << 29;
/// Offset of the destination address register inside a stream channel block.
pub const STREAM_CHANNEL_DESTINATION_ADDRESS: u64 = 0x18;
/// Offset of the source port register inside a stream channel block.
pub const STREAM_CHANNEL_SOURCE_PORT: u64 = 0x1c;

/// Returns the address of `offset` inside stream channel block `channel`.
pub fn stream_channel_register(channel: u32, offset: u64) -> u64 {
    STREAM_CHANNEL_BASE + channel as u64 * STREAM_CHANNEL_STRIDE + offset
}
