//! Automatic stream packet size probing.
//!
//! The probe finds the largest stream packet size that traverses the path
//! between device and host without fragmentation loss. It binds its own
//! ephemeral receive socket, points the device's stream destination at it,
//! forces do-not-fragment, and bisects over the allowed size range, asking
//! the device to emit one test packet per candidate.

use std::{
    io,
    net::{Ipv4Addr, SocketAddrV4, UdpSocket},
    time::Duration,
};

use gevlink_core::{
    constants::{GVSP_MAXIMUM_PACKET_SIZE, GVSP_MINIMUM_PACKET_SIZE, GVSP_PACKET_UDP_OVERHEAD},
    control::DeviceControl,
    error::{DeviceError, Result},
};
use tracing::{info, warn};

use crate::schema::{FeatureKind, FeatureRegistry};

const TEST_PACKET_WAIT: Duration = Duration::from_millis(10);
const TEST_PACKET_TRIES: u32 = 3;

/// Runs the automatic packet size negotiation.
///
/// With `exit_early` set, the currently configured size is tested first and
/// kept when it passes; the bisection only runs when it fails. Returns the
/// size left configured on the device.
pub fn auto_packet_size(
    device: &dyn DeviceControl,
    features: &FeatureRegistry,
    interface_address: Ipv4Addr,
    exit_early: bool,
) -> Result<i64> {
    let fire_kind = features.node("GevSCPSFireTestPacket").map(|node| node.kind);
    let is_command = match fire_kind {
        Some(FeatureKind::Command { .. }) => true,
        Some(FeatureKind::Boolean { .. }) => false,
        _ => {
            info!("[auto_packet_size] no GevSCPSFireTestPacket feature found");
            return features.get_integer(device, "GevSCPSPacketSize");
        }
    };

    let inc = features.integer_increment("GevSCPSPacketSize")?.max(1);
    let packet_size = features.get_integer(device, "GevSCPSPacketSize")?;
    let (minimum, maximum) = features.integer_bounds("GevSCPSPacketSize")?;
    let max_size = (GVSP_MAXIMUM_PACKET_SIZE as i64).min(maximum);
    let min_size = (GVSP_MINIMUM_PACKET_SIZE as i64).max(minimum);

    if max_size < min_size || inc > max_size - min_size {
        warn!("[auto_packet_size] invalid GevSCPSPacketSize properties");
        return Ok(packet_size);
    }

    // Receive socket for the test packets; its port and address are
    // programmed into the device's stream channel registers.
    let socket = UdpSocket::bind(SocketAddrV4::new(interface_address, 0))
        .map_err(|err| DeviceError::Unknown(format!("can't bind test packet socket: {err}")))?;
    socket
        .set_read_timeout(Some(TEST_PACKET_WAIT))
        .map_err(|err| DeviceError::Unknown(err.to_string()))?;
    let port = socket
        .local_addr()
        .map_err(|err| DeviceError::Unknown(err.to_string()))?
        .port();

    features.set_integer(device, "GevSCDA", u32::from(interface_address) as i64)?;
    features.set_integer(device, "GevSCPHostPort", port as i64)?;

    let do_not_fragment = features.get_boolean(device, "GevSCPSDoNotFragment").unwrap_or(false);
    let _ = features.set_boolean(device, "GevSCPSDoNotFragment", true);

    let mut buffer = vec![0u8; max_size as usize];
    let result = run_probe(
        device,
        features,
        &socket,
        &mut buffer,
        is_command,
        exit_early,
        packet_size,
        min_size,
        max_size,
        inc,
    );

    let _ = features.set_boolean(device, "GevSCPSDoNotFragment", do_not_fragment);

    result
}

#[allow(clippy::too_many_arguments)]
fn run_probe(
    device: &dyn DeviceControl,
    features: &FeatureRegistry,
    socket: &UdpSocket,
    buffer: &mut [u8],
    is_command: bool,
    exit_early: bool,
    initial_size: i64,
    mut min_size: i64,
    mut max_size: i64,
    inc: i64,
) -> Result<i64> {
    let mut packet_size = initial_size;

    let success =
        test_packet_check(device, features, socket, buffer, initial_size, is_command);

    if success && exit_early {
        info!("[auto_packet_size] current packet size check successful ({packet_size} bytes)");
        return Ok(packet_size);
    }

    let mut current_size = initial_size;
    let mut last_size = 0;

    loop {
        if current_size == last_size || min_size + inc >= max_size {
            break;
        }

        info!("[auto_packet_size] try packet size = {current_size}");
        let _ = features.set_integer(device, "GevSCPSPacketSize", current_size);
        // Read back: the device clamps to what it actually accepted.
        current_size = features.get_integer(device, "GevSCPSPacketSize")?;
        last_size = current_size;

        if test_packet_check(device, features, socket, buffer, current_size, is_command) {
            packet_size = current_size;
            if current_size == max_size {
                break;
            }
            min_size = current_size;
        } else {
            max_size = current_size;
        }

        current_size = min_size + (((max_size - min_size) / 2 + 1) / inc) * inc;
    }

    features.set_integer(device, "GevSCPSPacketSize", packet_size)?;
    info!("[auto_packet_size] packet size set to {packet_size} bytes");

    Ok(packet_size)
}

/// Fires a test packet and waits for it to arrive with the expected size.
///
/// Datagrams of any other size are late packets from earlier probes and are
/// discarded. The fire is retried up to three times.
fn test_packet_check(
    device: &dyn DeviceControl,
    features: &FeatureRegistry,
    socket: &UdpSocket,
    buffer: &mut [u8],
    packet_size: i64,
    is_command: bool,
) -> bool {
    let expected = (packet_size - GVSP_PACKET_UDP_OVERHEAD as i64).max(0) as usize;

    for _ in 0..TEST_PACKET_TRIES {
        if is_command {
            let _ = features.execute(device, "GevSCPSFireTestPacket");
        } else {
            let _ = features.set_boolean(device, "GevSCPSFireTestPacket", false);
            let _ = features.set_boolean(device, "GevSCPSFireTestPacket", true);
        }

        loop {
            match socket.recv_from(buffer) {
                Ok((count, _)) if count == expected => return true,
                Ok(_) => continue,
                Err(ref err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    break;
                }
                Err(_) => break,
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    // Bisection arithmetic mirrors the probe loop without sockets.
    fn bisect(accept_up_to: i64, mut min_size: i64, mut max_size: i64, inc: i64, start: i64) -> (i64, Vec<i64>) {
        let mut packet_size = start;
        let mut current_size = start;
        let mut last_size = 0;
        let mut visited = Vec::new();

        loop {
            if current_size == last_size || min_size + inc >= max_size {
                break;
            }
            visited.push(current_size);
            last_size = current_size;
            if current_size <= accept_up_to {
                packet_size = current_size;
                if current_size == max_size {
                    break;
                }
                min_size = current_size;
            } else {
                max_size = current_size;
            }
            current_size = min_size + (((max_size - min_size) / 2 + 1) / inc) * inc;
        }
        (packet_size, visited)
    }

    #[test]
    fn bisection_converges_near_the_path_limit() {
        let (size, visited) = bisect(1500, 576, 9000, 4, 576);
        assert!(size >= 1500 - 4 && size <= 1500, "converged to {size}");
        assert_eq!((size - 576) % 4, 0);
        assert!(visited.len() < 20, "visited {visited:?}");
    }

    #[test]
    fn accepted_sizes_are_monotonic() {
        let (final_size, visited) = bisect(1500, 576, 9000, 4, 576);
        let mut best = 0;
        for size in visited {
            if size <= 1500 {
                assert!(size >= best);
                best = size;
            }
        }
        assert_eq!(best, final_size);
    }

    #[test]
    fn everything_accepted_converges_to_the_ceiling() {
        let (size, _) = bisect(i64::MAX, 576, 9000, 4, 576);
        assert!(size > 9000 - 8, "converged to {size}");
    }

    #[test]
    fn nothing_accepted_keeps_the_floor() {
        let (size, _) = bisect(0, 576, 9000, 4, 576);
        assert_eq!(size, 576);
    }
}
