//! The device session facade.
//!
//! `GvDevice` owns the control channel, the heartbeat task, the cached
//! schema bytes and the feature registry, and exposes the operations an
//! application needs: memory and register I/O, privilege management, packet
//! size negotiation, IP configuration and stream parameter negotiation.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddrV4},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crossbeam_channel::{unbounded, Receiver};
use gevlink_core::{
    config::{Config, PacketSizeAdjustment},
    constants::GVCP_PORT,
    control::DeviceControl,
    error::{DeviceError, Result},
};
use gevlink_protocol::registers;
use tracing::{info, warn};

use crate::{
    channel::ControlChannel,
    event_types::DeviceEvent,
    heartbeat::HeartbeatMonitor,
    mtu,
    schema::{self, defaults, FeatureRegistry, FetchOptions, HttpFetcher},
    socket::UdpControlSocket,
};

/// How the device's current IP address was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpConfigurationMode {
    /// Unknown or unsupported configuration.
    None,
    /// Persistent (static) IP.
    PersistentIp,
    /// DHCP assigned.
    Dhcp,
    /// Link-local address.
    Lla,
}

/// Negotiated parameters handed to the external streaming receiver.
///
/// The control core performs the stream-creation checks and the packet size
/// negotiation; actually receiving stream data is the job of an external
/// component that consumes this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Number of stream channels the device reports.
    pub n_stream_channels: u32,
    /// Negotiated stream packet size in bytes.
    pub packet_size: u32,
    /// Whether the device answers packet resend requests.
    pub packet_resend_supported: bool,
    /// Option bits from the session configuration.
    pub options: u32,
    /// Host interface the stream socket should bind on.
    pub interface_address: Ipv4Addr,
    /// Device address emitting the stream.
    pub device_address: Ipv4Addr,
}

/// A GigE Vision control session.
pub struct GvDevice {
    channel: Arc<ControlChannel>,
    config: Config,
    interface_address: Ipv4Addr,
    device_address: Ipv4Addr,
    genicam_xml: Vec<u8>,
    features: FeatureRegistry,
    heartbeat: Option<HeartbeatMonitor>,
    events: Receiver<DeviceEvent>,
    is_big_endian_device: bool,
    is_packet_resend_supported: bool,
    is_write_memory_supported: bool,
    first_stream_created: AtomicBool,
}

impl GvDevice {
    /// Opens a session to the device at `device_address` through the
    /// interface bound to `interface_address`, with default configuration.
    pub fn new(interface_address: Ipv4Addr, device_address: Ipv4Addr) -> Result<Self> {
        Self::new_with_config(interface_address, device_address, Config::default())
    }

    /// Opens a session with custom configuration.
    pub fn new_with_config(
        interface_address: Ipv4Addr,
        device_address: Ipv4Addr,
        config: Config,
    ) -> Result<Self> {
        Self::connect(
            interface_address,
            SocketAddrV4::new(device_address, GVCP_PORT),
            config,
            None,
        )
    }

    /// Opens a session to an explicit control endpoint.
    ///
    /// This is the full-form constructor: it accepts a device endpoint with
    /// a non-standard control port (device simulators bind ephemeral ports)
    /// and an optional HTTP fetcher for `http` schema URLs.
    pub fn connect(
        interface_address: Ipv4Addr,
        device_address: SocketAddrV4,
        config: Config,
        fetcher: Option<Box<dyn HttpFetcher>>,
    ) -> Result<Self> {
        if device_address.ip().is_unspecified() {
            return Err(DeviceError::InvalidParameter(
                "invalid interface or device address".into(),
            ));
        }

        info!("[GvDevice::new] interface address = {interface_address}");
        info!("[GvDevice::new] device address = {}", device_address.ip());

        let socket = UdpControlSocket::connect(
            SocketAddrV4::new(interface_address, 0),
            device_address,
            &config,
        )
        .map_err(|err| DeviceError::Unknown(format!("can't bind control socket: {err}")))?;
        let channel = Arc::new(ControlChannel::new(Box::new(socket), &config));

        // Schema bootstrap is fatal: without it the session cannot expose
        // any feature.
        let fetch_options = FetchOptions::from_config(&config);
        let genicam_xml =
            schema::load_genicam(channel.as_ref(), fetcher.as_deref(), &fetch_options)?;
        let mut features = FeatureRegistry::new();
        defaults::install_default_nodes(&mut features, &genicam_xml);

        // Taking control is advisory: a session without the privilege can
        // still observe the device.
        match channel.write_register(
            registers::CONTROL_CHANNEL_PRIVILEGE,
            registers::CONTROL_CHANNEL_PRIVILEGE_CONTROL,
        ) {
            Ok(()) => channel.set_controller(true),
            Err(_) => warn!("[GvDevice::new] can't get control access"),
        }

        let (event_sender, events) = unbounded();
        let heartbeat = HeartbeatMonitor::spawn(channel.clone(), &config, event_sender)
            .map_err(|err| DeviceError::Unknown(format!("can't spawn heartbeat: {err}")))?;

        let device_mode = channel.read_register(registers::DEVICE_MODE).unwrap_or(0);
        let is_big_endian_device = device_mode & registers::DEVICE_MODE_BIG_ENDIAN != 0;

        let capabilities = channel.read_register(registers::GVCP_CAPABILITY).unwrap_or(0);
        let is_packet_resend_supported =
            capabilities & registers::GVCP_CAPABILITY_PACKET_RESEND != 0;
        let is_write_memory_supported =
            capabilities & registers::GVCP_CAPABILITY_WRITE_MEMORY != 0;

        info!(
            "[GvDevice::new] device endianness = {}",
            if is_big_endian_device { "big" } else { "little" }
        );
        info!(
            "[GvDevice::new] packet resend     = {}",
            if is_packet_resend_supported { "yes" } else { "no" }
        );
        info!(
            "[GvDevice::new] write memory      = {}",
            if is_write_memory_supported { "yes" } else { "no" }
        );

        Ok(GvDevice {
            channel,
            config,
            interface_address,
            device_address: *device_address.ip(),
            genicam_xml,
            features,
            heartbeat: Some(heartbeat),
            events,
            is_big_endian_device,
            is_packet_resend_supported,
            is_write_memory_supported,
            first_stream_created: AtomicBool::new(false),
        })
    }

    /// Address of the host interface this session is bound to.
    pub fn interface_address(&self) -> Ipv4Addr {
        self.interface_address
    }

    /// Address of the device.
    pub fn device_address(&self) -> Ipv4Addr {
        self.device_address
    }

    /// The cached schema bytes fetched at construction.
    ///
    /// Populated exactly once per session and never mutated afterwards.
    pub fn genicam_xml(&self) -> &[u8] {
        &self.genicam_xml
    }

    /// The register-backed feature registry.
    pub fn features(&self) -> &FeatureRegistry {
        &self.features
    }

    /// Mutable access to the feature registry, for installing nodes the
    /// device schema defines beyond the default catalog.
    pub fn features_mut(&mut self) -> &mut FeatureRegistry {
        &mut self.features
    }

    /// Receiver for out-of-band session events.
    pub fn event_receiver(&self) -> Receiver<DeviceEvent> {
        self.events.clone()
    }

    /// Whether the device byte order is big endian.
    pub fn is_big_endian_device(&self) -> bool {
        self.is_big_endian_device
    }

    /// Whether the device answers stream packet resend requests.
    pub fn is_packet_resend_supported(&self) -> bool {
        self.is_packet_resend_supported
    }

    /// Whether the device implements write-memory.
    pub fn is_write_memory_supported(&self) -> bool {
        self.is_write_memory_supported
    }

    // ------------------------------------------------------------------
    // Control privilege
    // ------------------------------------------------------------------

    /// Whether this session currently holds control privilege.
    pub fn is_controller(&self) -> bool {
        self.channel.is_controller()
    }

    /// Acquires control privilege by writing the control bit to the
    /// privilege register.
    pub fn take_control(&self) -> Result<()> {
        match self.channel.write_register(
            registers::CONTROL_CHANNEL_PRIVILEGE,
            registers::CONTROL_CHANNEL_PRIVILEGE_CONTROL,
        ) {
            Ok(()) => {
                self.channel.set_controller(true);
                Ok(())
            }
            Err(err) => {
                warn!("[GvDevice::take_control] can't get control access");
                Err(err)
            }
        }
    }

    /// Releases control privilege.
    pub fn leave_control(&self) -> Result<()> {
        match self.channel.write_register(registers::CONTROL_CHANNEL_PRIVILEGE, 0) {
            Ok(()) => {
                self.channel.set_controller(false);
                Ok(())
            }
            Err(err) => {
                warn!("[GvDevice::leave_control] can't relinquish control access");
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Device information
    // ------------------------------------------------------------------

    /// Timestamp tick frequency in Hz, composed from the high and low
    /// bootstrap registers.
    pub fn timestamp_tick_frequency(&self) -> Result<u64> {
        let high = self.channel.read_register(registers::TIMESTAMP_TICK_FREQUENCY_HIGH)?;
        let low = self.channel.read_register(registers::TIMESTAMP_TICK_FREQUENCY_LOW)?;
        Ok((u64::from(high) << 32) | u64::from(low))
    }

    /// Currently configured stream packet size.
    pub fn packet_size(&self) -> Result<i64> {
        self.features.get_integer(self, "GevSCPSPacketSize")
    }

    /// Sets the stream packet size.
    pub fn set_packet_size(&self, packet_size: i64) -> Result<()> {
        if packet_size <= 0 {
            return Err(DeviceError::InvalidParameter(format!(
                "packet size must be positive, got {packet_size}"
            )));
        }
        self.features.set_integer(self, "GevSCPSPacketSize", packet_size)
    }

    /// Runs the automatic packet size negotiation unconditionally and
    /// returns the size left configured on the device.
    pub fn auto_packet_size(&self) -> Result<i64> {
        mtu::auto_packet_size(self, &self.features, self.interface_address, false)
    }

    // ------------------------------------------------------------------
    // IP configuration
    // ------------------------------------------------------------------

    /// Current IP address, subnet mask and default gateway.
    pub fn current_ip(&self) -> Result<(Ipv4Addr, Ipv4Addr, Ipv4Addr)> {
        let ip = self.features.get_integer(self, "GevCurrentIPAddress")?;
        let mask = self.features.get_integer(self, "GevCurrentSubnetMask")?;
        let gateway = self.features.get_integer(self, "GevCurrentDefaultGateway")?;
        Ok((Ipv4Addr::from(ip as u32), Ipv4Addr::from(mask as u32), Ipv4Addr::from(gateway as u32)))
    }

    /// Persistent IP address, subnet mask and default gateway.
    pub fn persistent_ip(&self) -> Result<(Ipv4Addr, Ipv4Addr, Ipv4Addr)> {
        let ip = self.features.get_integer(self, "GevPersistentIPAddress")?;
        let mask = self.features.get_integer(self, "GevPersistentSubnetMask")?;
        let gateway = self.features.get_integer(self, "GevPersistentDefaultGateway")?;
        Ok((Ipv4Addr::from(ip as u32), Ipv4Addr::from(mask as u32), Ipv4Addr::from(gateway as u32)))
    }

    /// Sets the persistent IP configuration from string representations and
    /// switches the device to persistent IP mode.
    ///
    /// Each of `ip`, `mask` and `gateway` may be `None` to leave the
    /// corresponding register untouched. The mask accepts dotted-quad
    /// (`255.255.255.0`) or CIDR (`192.168.1.0/24`) notation.
    pub fn set_persistent_ip_from_string(
        &self,
        ip: Option<&str>,
        mask: Option<&str>,
        gateway: Option<&str>,
    ) -> Result<()> {
        let ip = ip.map(|s| parse_ipv4(s, "IP address")).transpose()?;
        let mask = mask.map(parse_netmask).transpose()?;
        let gateway = gateway.map(|s| parse_ipv4(s, "Gateway address")).transpose()?;
        self.set_persistent_ip(ip, mask, gateway)
    }

    /// Sets the persistent IP configuration and switches the device to
    /// persistent IP mode.
    pub fn set_persistent_ip(
        &self,
        ip: Option<Ipv4Addr>,
        mask: Option<Ipv4Addr>,
        gateway: Option<Ipv4Addr>,
    ) -> Result<()> {
        if let Some(ip) = ip {
            self.features.set_integer(self, "GevPersistentIPAddress", u32::from(ip) as i64)?;
        }
        if let Some(mask) = mask {
            self.features.set_integer(self, "GevPersistentSubnetMask", u32::from(mask) as i64)?;
        }
        if let Some(gateway) = gateway {
            self.features
                .set_integer(self, "GevPersistentDefaultGateway", u32::from(gateway) as i64)?;
        }
        self.set_ip_configuration_mode(IpConfigurationMode::PersistentIp)
    }

    /// Returns the device's IP configuration mode.
    pub fn ip_configuration_mode(&self) -> Result<IpConfigurationMode> {
        if self.features.is_available("GevIPConfigurationStatus") {
            let status = self.features.get_integer(self, "GevIPConfigurationStatus")?;
            return Ok(match status {
                1 => IpConfigurationMode::PersistentIp,
                2 => IpConfigurationMode::Dhcp,
                3 => IpConfigurationMode::Lla,
                _ => IpConfigurationMode::None,
            });
        }

        let dhcp = self.features.get_boolean(self, "GevCurrentIPConfigurationDHCP")?;
        let persistent =
            self.features.get_boolean(self, "GevCurrentIPConfigurationPersistentIP")?;
        Ok(if dhcp && !persistent {
            IpConfigurationMode::Dhcp
        } else if !dhcp && persistent {
            IpConfigurationMode::PersistentIp
        } else {
            IpConfigurationMode::Lla
        })
    }

    /// Sets the device's IP configuration mode.
    pub fn set_ip_configuration_mode(&self, mode: IpConfigurationMode) -> Result<()> {
        let (dhcp, persistent) = match mode {
            IpConfigurationMode::PersistentIp => (false, true),
            IpConfigurationMode::Dhcp => (true, false),
            IpConfigurationMode::Lla => (false, false),
            IpConfigurationMode::None => {
                return Err(DeviceError::InvalidParameter(
                    "cannot select IP configuration mode 'none'".into(),
                ));
            }
        };
        self.features.set_boolean(self, "GevCurrentIPConfigurationDHCP", dhcp)?;
        self.features.set_boolean(self, "GevCurrentIPConfigurationPersistentIP", persistent)
    }

    // ------------------------------------------------------------------
    // Stream creation
    // ------------------------------------------------------------------

    /// Sets the stream packet size re-negotiation policy.
    pub fn set_packet_size_adjustment(&mut self, adjustment: PacketSizeAdjustment) {
        self.config.packet_size_adjustment = adjustment;
    }

    /// Option bits handed to the external streaming receiver.
    pub fn stream_options(&self) -> u32 {
        self.config.stream_options
    }

    /// Sets the option bits handed to the external streaming receiver.
    /// Must be called before [`GvDevice::create_stream`].
    pub fn set_stream_options(&mut self, options: u32) {
        self.config.stream_options = options;
    }

    /// Validates stream preconditions, applies the packet size adjustment
    /// policy and returns the parameters for the external streaming
    /// receiver.
    pub fn create_stream(&self) -> Result<StreamParams> {
        let n_stream_channels =
            self.features.get_integer(self, "GevStreamChannelCount").unwrap_or(0) as u32;
        info!("[GvDevice::create_stream] number of stream channels = {n_stream_channels}");

        if n_stream_channels < 1 {
            return Err(DeviceError::NoStreamChannel);
        }
        if !self.is_controller() {
            warn!("[GvDevice::create_stream] can't create stream without control access");
            return Err(DeviceError::NotController);
        }

        let adjustment = self.config.packet_size_adjustment;
        let first_stream_created = self.first_stream_created.load(Ordering::Relaxed);
        let adjust = adjustment != PacketSizeAdjustment::Never
            && ((adjustment != PacketSizeAdjustment::Once
                && adjustment != PacketSizeAdjustment::OnFailureOnce)
                || !first_stream_created);
        if adjust {
            let exit_early = matches!(
                adjustment,
                PacketSizeAdjustment::OnFailure | PacketSizeAdjustment::OnFailureOnce
            );
            mtu::auto_packet_size(self, &self.features, self.interface_address, exit_early)?;
        }

        let packet_size = self.packet_size()? as u32;
        self.first_stream_created.store(true, Ordering::Relaxed);

        Ok(StreamParams {
            n_stream_channels,
            packet_size,
            packet_resend_supported: self.is_packet_resend_supported,
            options: self.config.stream_options,
            interface_address: self.interface_address,
            device_address: self.device_address,
        })
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Tears the session down: cancels and joins the heartbeat, releases
    /// control privilege. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if let Some(mut heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
        if self.channel.is_controller() {
            if let Err(err) = self.leave_control() {
                warn!("[GvDevice::close] leave control failed: {err}");
            }
        }
    }
}

impl Drop for GvDevice {
    fn drop(&mut self) {
        self.close();
    }
}

impl DeviceControl for GvDevice {
    fn read_memory(&self, address: u64, buffer: &mut [u8]) -> Result<()> {
        self.channel.read_memory(address, buffer)
    }

    fn write_memory(&self, address: u64, data: &[u8]) -> Result<()> {
        self.channel.write_memory(address, data)
    }

    fn read_register(&self, address: u64) -> Result<u32> {
        self.channel.read_register(address)
    }

    fn write_register(&self, address: u64, value: u32) -> Result<()> {
        self.channel.write_register(address, value)
    }
}

fn parse_ipv4(text: &str, what: &str) -> Result<Ipv4Addr> {
    match text.parse::<IpAddr>() {
        Ok(IpAddr::V4(address)) => Ok(address),
        // The GigE Vision specification does not support IPv6.
        Ok(IpAddr::V6(_)) => {
            Err(DeviceError::InvalidParameter(format!("{what} is not an IPv4 address: \"{text}\"")))
        }
        Err(_) => Err(DeviceError::InvalidParameter(format!(
            "{what} could not be parsed: \"{text}\""
        ))),
    }
}

fn parse_netmask(text: &str) -> Result<Ipv4Addr> {
    if let Some((_, prefix)) = text.split_once('/') {
        let length: u32 = prefix.parse().map_err(|_| {
            DeviceError::InvalidParameter(format!("Netmask could not be parsed: \"{text}\""))
        })?;
        if length > 32 {
            return Err(DeviceError::InvalidParameter(format!(
                "Netmask prefix out of range: \"{text}\""
            )));
        }
        let mask = if length == 0 { 0 } else { u32::MAX << (32 - length) };
        return Ok(Ipv4Addr::from(mask));
    }
    parse_ipv4(text, "Netmask")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv6_input_is_rejected() {
        let err = parse_ipv4("fe80::1", "IP address").expect_err("ipv6");
        assert!(matches!(err, DeviceError::InvalidParameter(_)));
    }

    #[test]
    fn garbage_ip_is_rejected() {
        assert!(parse_ipv4("not-an-ip", "IP address").is_err());
    }

    #[test]
    fn netmask_accepts_dotted_quad() {
        assert_eq!(parse_netmask("255.255.255.0").expect("mask"), Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn netmask_accepts_cidr() {
        assert_eq!(parse_netmask("192.168.1.0/24").expect("mask"), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(parse_netmask("10.0.0.0/8").expect("mask"), Ipv4Addr::new(255, 0, 0, 0));
        assert_eq!(parse_netmask("0.0.0.0/0").expect("mask"), Ipv4Addr::new(0, 0, 0, 0));
    }

    #[test]
    fn netmask_rejects_long_prefix() {
        assert!(parse_netmask("10.0.0.0/40").is_err());
    }
}
