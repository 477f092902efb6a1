//! MTU probe tests against the loopback device simulator.
//!
//! The simulator emits one test datagram per fire-test-packet command, but
//! only when the requested size fits through the simulated path.

mod common;

use std::net::Ipv4Addr;

use common::{fast_config, Simulator};
use gevlink_device::{schema::FeatureNode, GvDevice};
use gevlink_protocol::registers;

const PACKET_SIZE_REGISTER: u64 = 0x0d04;

fn open_with_probe_features(simulator: &Simulator) -> GvDevice {
    let mut device =
        GvDevice::connect(Ipv4Addr::LOCALHOST, simulator.address(), fast_config(), None)
            .expect("open session");
    // A real schema would define these; the simulator's XML does not, so
    // install them the way an external evaluator would.
    device.features_mut().insert(
        "GevSCPSFireTestPacket",
        FeatureNode::command(PACKET_SIZE_REGISTER, 0),
    );
    device.features_mut().insert(
        "GevSCPSPacketSize",
        FeatureNode::masked_integer(PACKET_SIZE_REGISTER, 16, 31).with_bounds(576, 9000, 4),
    );
    device
}

#[test]
fn probe_converges_to_the_path_limit() {
    let simulator = Simulator::start();
    simulator.set_path_mtu(1500);
    simulator.set_register(PACKET_SIZE_REGISTER, 576);
    let device = open_with_probe_features(&simulator);

    let size = device.auto_packet_size().expect("probe");

    // Largest deliverable size on a 1500 byte path, aligned to the
    // feature increment and inside the clamped bounds.
    assert!(size >= 1496 && size <= 1500, "converged to {size}");
    assert_eq!((size - 576) % 4, 0);
    // The negotiated size was written back to the device.
    assert_eq!(simulator.register(PACKET_SIZE_REGISTER) & 0xffff, size as u32);
}

#[test]
fn probe_keeps_a_working_size_when_asked_to_exit_early() {
    let simulator = Simulator::start();
    simulator.set_path_mtu(1500);
    simulator.set_register(PACKET_SIZE_REGISTER, 1400);
    let device = open_with_probe_features(&simulator);

    // The default policy adjusts on failure only: 1400 still works, so
    // stream creation must keep it.
    let params = device.create_stream().expect("stream params");
    assert_eq!(params.packet_size, 1400);
}

#[test]
fn probe_restores_do_not_fragment() {
    let simulator = Simulator::start();
    simulator.set_path_mtu(1500);
    simulator.set_register(PACKET_SIZE_REGISTER, 576);
    let device = open_with_probe_features(&simulator);

    device.auto_packet_size().expect("probe");
    let register = simulator.register(PACKET_SIZE_REGISTER);
    assert_eq!(register & registers::STREAM_CHANNEL_DO_NOT_FRAGMENT, 0);
}

#[test]
fn probe_without_fire_feature_keeps_the_configured_size() {
    let simulator = Simulator::start();
    simulator.set_register(PACKET_SIZE_REGISTER, 1500);
    let device = GvDevice::connect(Ipv4Addr::LOCALHOST, simulator.address(), fast_config(), None)
        .expect("open session");

    assert_eq!(device.auto_packet_size().expect("probe"), 1500);
}

#[test]
fn invalid_bounds_keep_the_configured_size() {
    let simulator = Simulator::start();
    simulator.set_register(PACKET_SIZE_REGISTER, 1500);
    let mut device =
        GvDevice::connect(Ipv4Addr::LOCALHOST, simulator.address(), fast_config(), None)
            .expect("open session");
    device.features_mut().insert(
        "GevSCPSFireTestPacket",
        FeatureNode::command(PACKET_SIZE_REGISTER, 0),
    );
    device.features_mut().insert(
        "GevSCPSPacketSize",
        FeatureNode::masked_integer(PACKET_SIZE_REGISTER, 16, 31).with_bounds(9000, 576, 4),
    );

    assert_eq!(device.auto_packet_size().expect("probe"), 1500);
}
