//! Opens a control session to a camera and prints its identity and IP
//! configuration.
//!
//! - cargo run -p gevlink --example inspect -- 192.168.1.10 192.168.1.64
//!   (interface address, then device address)

use std::{env, net::Ipv4Addr};

use gevlink::{DeviceEvent, GvDevice};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Args: <interface_addr> <device_addr>
    let mut args = env::args().skip(1);
    let interface: Ipv4Addr = args
        .next()
        .ok_or("usage: inspect <interface_addr> <device_addr>")?
        .parse()?;
    let camera: Ipv4Addr = args
        .next()
        .ok_or("usage: inspect <interface_addr> <device_addr>")?
        .parse()?;

    let device = GvDevice::new(interface, camera)?;
    println!(
        "connected, controller={} schema={} bytes",
        device.is_controller(),
        device.genicam_xml().len()
    );

    let features = device.features();
    for name in ["DeviceVendorName", "DeviceModelName", "DeviceVersion", "DeviceID"] {
        if let Ok(value) = features.get_string(&device, name) {
            println!("{name:24} {value}");
        }
    }

    let (ip, mask, gateway) = device.current_ip()?;
    println!("current ip  {ip} / {mask} via {gateway}");
    match device.persistent_ip() {
        Ok((ip, mask, gateway)) => println!("persistent  {ip} / {mask} via {gateway}"),
        Err(err) => println!("persistent  unavailable ({err})"),
    }
    println!("tick freq   {} Hz", device.timestamp_tick_frequency()?);
    println!("packet size {} bytes", device.packet_size()?);

    let events = device.event_receiver();
    let params = device.create_stream()?;
    println!(
        "stream: {} channel(s), packet size {} bytes, resend={}",
        params.n_stream_channels, params.packet_size, params.packet_resend_supported
    );

    // Report a lost control lease, if any arrives while we linger.
    if let Ok(DeviceEvent::ControlLost) = events.recv_timeout(std::time::Duration::from_secs(2)) {
        println!("control lost!");
    }

    Ok(())
}
