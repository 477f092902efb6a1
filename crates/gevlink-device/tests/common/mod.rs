//! In-process GVCP device simulator.
//!
//! Binds a loopback UDP socket and answers control requests from a
//! background thread, backed by a sparse register and memory image. Tests
//! seed the image and script fault behaviors (dropped requests, pending
//! acknowledges, write-protected registers, a path MTU for test packets).

// Not every test binary exercises every scripting knob.
#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use gevlink_protocol::{
    codec::{GvcpAck, RequestFrame},
    packet::AckStatus,
    registers, Command,
};

/// A scripted pending-ack: answer reads of `address` with a PENDING_ACK
/// carrying `extension_ms`, then the real acknowledge after `delay`.
pub struct PendingScript {
    pub address: u64,
    pub extension_ms: u16,
    pub delay: Duration,
}

#[derive(Default)]
struct Image {
    registers: HashMap<u64, u32>,
    memory: BTreeMap<u64, u8>,
}

struct State {
    shutdown: AtomicBool,
    drop_requests: AtomicU32,
    spoof_wrong_id: AtomicU32,
    accept_packet_size_up_to: AtomicU32,
    image: Mutex<Image>,
    pending: Mutex<Option<PendingScript>>,
    write_protected: Mutex<HashSet<u64>>,
}

/// Handle to the simulator thread.
pub struct Simulator {
    address: SocketAddrV4,
    state: Arc<State>,
    handle: Option<JoinHandle<()>>,
}

pub const SIMULATED_XML: &[u8] = b"<RegisterDescription ModelName=\"Simulated\"/>";
const XML_ADDRESS: u64 = 0x10000;

impl Simulator {
    /// Starts a simulator with a usable default image: schema URL and XML,
    /// one stream channel, packet resend and write memory capabilities,
    /// big-endian device mode, 1500 byte stream packet size.
    pub fn start() -> Simulator {
        let state = Arc::new(State {
            shutdown: AtomicBool::new(false),
            drop_requests: AtomicU32::new(0),
            spoof_wrong_id: AtomicU32::new(0),
            accept_packet_size_up_to: AtomicU32::new(u32::MAX),
            image: Mutex::new(Image::default()),
            pending: Mutex::new(None),
            write_protected: Mutex::new(HashSet::new()),
        });

        {
            let mut image = state.image.lock().unwrap();
            image.registers.insert(registers::DEVICE_MODE, registers::DEVICE_MODE_BIG_ENDIAN);
            image.registers.insert(
                registers::GVCP_CAPABILITY,
                registers::GVCP_CAPABILITY_PACKET_RESEND | registers::GVCP_CAPABILITY_WRITE_MEMORY,
            );
            image.registers.insert(registers::N_STREAM_CHANNELS, 1);
            image.registers.insert(registers::TIMESTAMP_TICK_FREQUENCY_HIGH, 0);
            image.registers.insert(registers::TIMESTAMP_TICK_FREQUENCY_LOW, 125_000_000);
            image
                .registers
                .insert(registers::stream_channel_register(0, registers::STREAM_CHANNEL_PACKET_SIZE), 1500);
            image.registers.insert(registers::CURRENT_IP_ADDRESS, 0xc0a8_0164);
            image.registers.insert(registers::CURRENT_SUBNET_MASK, 0xffff_ff00);
            image.registers.insert(registers::CURRENT_DEFAULT_GATEWAY, 0xc0a8_0101);

            store(&mut image.memory, XML_ADDRESS, SIMULATED_XML);
            let url = format!("Local:simulated.xml;{XML_ADDRESS:x};{:x}\0", SIMULATED_XML.len());
            store(&mut image.memory, registers::XML_URL_0, url.as_bytes());
        }

        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind simulator socket");
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .expect("simulator read timeout");
        let address = match socket.local_addr().expect("simulator local addr") {
            SocketAddr::V4(address) => address,
            SocketAddr::V6(_) => unreachable!("bound v4"),
        };

        let thread_state = state.clone();
        let handle = thread::Builder::new()
            .name("gvcp-simulator".into())
            .spawn(move || run(socket, thread_state))
            .expect("spawn simulator");

        Simulator { address, state, handle: Some(handle) }
    }

    /// Control endpoint the simulator listens on.
    pub fn address(&self) -> SocketAddrV4 {
        self.address
    }

    /// Overwrites a register value.
    pub fn set_register(&self, address: u64, value: u32) {
        self.state.image.lock().unwrap().registers.insert(address, value);
    }

    /// Reads a register value back out of the image.
    pub fn register(&self, address: u64) -> u32 {
        *self.state.image.lock().unwrap().registers.get(&address).unwrap_or(&0)
    }

    /// Stores bytes into device memory.
    pub fn set_memory(&self, address: u64, data: &[u8]) {
        store(&mut self.state.image.lock().unwrap().memory, address, data);
    }

    /// Silently drops the next `count` requests.
    pub fn drop_next_requests(&self, count: u32) {
        self.state.drop_requests.store(count, Ordering::SeqCst);
    }

    /// Answers the next `count` requests with an acknowledge carrying a
    /// wrong (stale) packet identifier before the real one.
    pub fn spoof_wrong_id(&self, count: u32) {
        self.state.spoof_wrong_id.store(count, Ordering::SeqCst);
    }

    /// Scripts a pending-ack exchange for reads of one register.
    pub fn script_pending(&self, script: PendingScript) {
        *self.state.pending.lock().unwrap() = Some(script);
    }

    /// Marks a register write-protected: writes get an error acknowledge.
    pub fn write_protect(&self, address: u64) {
        self.state.write_protected.lock().unwrap().insert(address);
    }

    /// Largest stream packet size the simulated network path delivers.
    pub fn set_path_mtu(&self, size: u32) {
        self.state.accept_packet_size_up_to.store(size, Ordering::SeqCst);
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.state.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn store(memory: &mut BTreeMap<u64, u8>, address: u64, data: &[u8]) {
    for (i, &byte) in data.iter().enumerate() {
        memory.insert(address + i as u64, byte);
    }
}

fn run(socket: UdpSocket, state: Arc<State>) {
    let mut buffer = [0u8; 2048];

    while !state.shutdown.load(Ordering::SeqCst) {
        let (count, peer) = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(_) => continue,
        };
        let request = match RequestFrame::parse(&buffer[..count]) {
            Ok(request) => request,
            Err(_) => continue,
        };

        let drops = state.drop_requests.load(Ordering::SeqCst);
        if drops > 0 {
            state.drop_requests.store(drops - 1, Ordering::SeqCst);
            continue;
        }

        // Scripted pending-ack exchange.
        if request.command == Command::ReadRegisterCmd {
            let script = {
                let mut pending = state.pending.lock().unwrap();
                match pending.as_ref() {
                    Some(script) if script.address == request.address => pending.take(),
                    _ => None,
                }
            };
            if let Some(script) = script {
                send(
                    &socket,
                    peer,
                    &GvcpAck::Pending { timeout_ms: script.extension_ms },
                    request.packet_id,
                );
                thread::sleep(script.delay);
                let value = read_register(&state, request.address);
                send(&socket, peer, &GvcpAck::ReadRegister { value }, request.packet_id);
                continue;
            }
        }

        let spoofs = state.spoof_wrong_id.load(Ordering::SeqCst);
        if spoofs > 0 {
            state.spoof_wrong_id.store(spoofs - 1, Ordering::SeqCst);
            // A late answer to an earlier exchange.
            send(
                &socket,
                peer,
                &GvcpAck::ReadRegister { value: 0xdead_beef },
                request.packet_id.wrapping_sub(1),
            );
        }

        match request.command {
            Command::ReadRegisterCmd => {
                let value = read_register(&state, request.address);
                send(&socket, peer, &GvcpAck::ReadRegister { value }, request.packet_id);
            }
            Command::WriteRegisterCmd => {
                if state.write_protected.lock().unwrap().contains(&request.address) {
                    send(
                        &socket,
                        peer,
                        &GvcpAck::Error {
                            command: Command::WriteRegisterAck,
                            status: AckStatus::WriteProtect,
                        },
                        request.packet_id,
                    );
                    continue;
                }
                let value = request.register_value().unwrap_or(0);
                write_register(&socket, &state, request.address, value);
                send(&socket, peer, &GvcpAck::WriteRegister, request.packet_id);
            }
            Command::ReadMemoryCmd => {
                let data: Vec<u8> = {
                    let image = state.image.lock().unwrap();
                    (0..request.size as u64)
                        .map(|i| *image.memory.get(&(request.address + i)).unwrap_or(&0))
                        .collect()
                };
                send(
                    &socket,
                    peer,
                    &GvcpAck::ReadMemory { address: request.address, data: &data },
                    request.packet_id,
                );
            }
            Command::WriteMemoryCmd => {
                {
                    let mut image = state.image.lock().unwrap();
                    let data = request.data.clone();
                    for (i, byte) in data.into_iter().enumerate() {
                        image.memory.insert(request.address + i as u64, byte);
                    }
                }
                send(
                    &socket,
                    peer,
                    &GvcpAck::WriteMemory { bytes_written: request.size as u16 },
                    request.packet_id,
                );
            }
            _ => {}
        }
    }
}

fn read_register(state: &State, address: u64) -> u32 {
    *state.image.lock().unwrap().registers.get(&address).unwrap_or(&0)
}

/// Register writes with side effects: raising the fire-test-packet bit
/// emits one UDP test datagram toward the configured stream destination,
/// provided the requested size fits through the simulated path.
fn write_register(socket: &UdpSocket, state: &State, address: u64, value: u32) {
    let packet_size_register =
        registers::stream_channel_register(0, registers::STREAM_CHANNEL_PACKET_SIZE);

    if address == packet_size_register && value & registers::STREAM_CHANNEL_FIRE_TEST_PACKET != 0 {
        let packet_size = value & 0xffff;
        let stored = value & !registers::STREAM_CHANNEL_FIRE_TEST_PACKET;
        let (destination, port) = {
            let image = state.image.lock().unwrap();
            let destination = *image
                .registers
                .get(&registers::stream_channel_register(
                    0,
                    registers::STREAM_CHANNEL_DESTINATION_ADDRESS,
                ))
                .unwrap_or(&0);
            let port = *image
                .registers
                .get(&registers::stream_channel_register(0, registers::STREAM_CHANNEL_PORT))
                .unwrap_or(&0);
            (destination, port)
        };
        state.image.lock().unwrap().registers.insert(address, stored);

        let deliverable = packet_size <= state.accept_packet_size_up_to.load(Ordering::SeqCst)
            && packet_size > gevlink_core::constants::GVSP_PACKET_UDP_OVERHEAD;
        if deliverable && destination != 0 && port & 0xffff != 0 {
            let payload =
                vec![0u8; (packet_size - gevlink_core::constants::GVSP_PACKET_UDP_OVERHEAD) as usize];
            let target =
                SocketAddrV4::new(Ipv4Addr::from(destination), (port & 0xffff) as u16);
            let _ = socket.send_to(&payload, target);
        }
        return;
    }

    state.image.lock().unwrap().registers.insert(address, value);
}

fn send(socket: &UdpSocket, peer: SocketAddr, ack: &GvcpAck<'_>, packet_id: u16) {
    if let Ok(bytes) = ack.encode(packet_id) {
        let _ = socket.send_to(&bytes, peer);
    }
}

/// Session configuration with short timeouts suited to loopback tests.
pub fn fast_config() -> gevlink_core::config::Config {
    gevlink_core::config::Config {
        gvcp_timeout: Duration::from_millis(100),
        gvcp_n_retries: 3,
        ..gevlink_core::config::Config::default()
    }
}
