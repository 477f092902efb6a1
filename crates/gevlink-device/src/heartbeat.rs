//! Control privilege heartbeat task.
//!
//! While the session holds control privilege, the device expects periodic
//! control traffic; a silent controller loses its lease. The heartbeat task
//! reads the privilege register every period through the same serialized
//! exchange path as application requests, so the two interleave safely.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use gevlink_core::{config::Config, control::DeviceControl};
use gevlink_protocol::registers;
use tracing::{debug, warn};

use crate::{channel::ControlChannel, event_types::DeviceEvent};

/// Handle to the background heartbeat task.
///
/// Dropping the handle cancels the task and joins it; the cancel signal
/// wakes the task's sleep immediately.
pub struct HeartbeatMonitor {
    cancel: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl HeartbeatMonitor {
    /// Spawns the heartbeat task for `channel`.
    ///
    /// Control-lost transitions are delivered through `events`.
    pub fn spawn(
        channel: Arc<ControlChannel>,
        config: &Config,
        events: Sender<DeviceEvent>,
    ) -> std::io::Result<HeartbeatMonitor> {
        let (cancel, cancelled) = bounded::<()>(1);
        let period = config.heartbeat_period;
        let retry_delay = config.heartbeat_retry_delay;
        let retry_timeout = config.heartbeat_retry_timeout;

        let handle = thread::Builder::new()
            .name("gevlink-heartbeat".into())
            .spawn(move || {
                'heartbeat: loop {
                    match cancelled.recv_timeout(period) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }

                    if !channel.is_controller() {
                        continue;
                    }

                    // Read the privilege register, retrying transient
                    // failures for a bounded time. A read that keeps
                    // failing leaves `value` at zero, which counts as a
                    // lost lease.
                    let started = Instant::now();
                    let mut attempts = 0u32;
                    let mut value = 0u32;
                    loop {
                        attempts += 1;
                        match channel.read_register(registers::CONTROL_CHANNEL_PRIVILEGE) {
                            Ok(current) => {
                                value = current;
                                break;
                            }
                            Err(_) if started.elapsed() < retry_timeout => {
                                match cancelled.recv_timeout(retry_delay) {
                                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                                        channel.set_controller(false);
                                        break 'heartbeat;
                                    }
                                    Err(RecvTimeoutError::Timeout) => {}
                                }
                            }
                            Err(_) => break,
                        }
                    }

                    debug!("[heartbeat] ack value = {value}");
                    if attempts > 1 {
                        debug!("[heartbeat] tried {attempts} times");
                    }

                    let privilege_bits = registers::CONTROL_CHANNEL_PRIVILEGE_CONTROL
                        | registers::CONTROL_CHANNEL_PRIVILEGE_EXCLUSIVE;
                    if value & privilege_bits == 0 {
                        warn!("[heartbeat] control access lost");
                        channel.set_controller(false);
                        let _ = events.send(DeviceEvent::ControlLost);
                    }
                }
            })?;

        Ok(HeartbeatMonitor { cancel, handle: Some(handle) })
    }

    /// Cancels the task and waits for it to exit. Idempotent.
    pub fn stop(&mut self) {
        let _ = self.cancel.try_send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
