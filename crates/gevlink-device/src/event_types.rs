//! Out-of-band events emitted by the control session.
//!
//! Events are pushed through the receiver returned by
//! [`crate::device::GvDevice::event_receiver`]; they never surface as return
//! values of the operation that detected them.

/// Events emitted by the session's background tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The privilege heartbeat observed that another controller took over
    /// (or the device dropped the lease). Emitted once per loss; re-taking
    /// control re-arms the notification.
    ControlLost,
}
