#![warn(missing_docs)]

//! Gevlink: a small public API facade for the workspace.
//!
//! This crate provides a clean, stable surface that re-exports the most
//! commonly used types to control a GigE Vision device:
//!
//! - The session facade (`GvDevice`, `StreamParams`, `DeviceEvent`)
//! - Primitive device I/O (`DeviceControl`)
//! - Core configuration (`Config`, `PacketSizeAdjustment`)
//! - Errors (`DeviceError`, `Result`)
//!
//! Example
//! ```ignore
//! use gevlink::{DeviceControl, GvDevice};
//!
//! let interface = "192.168.1.10".parse().unwrap();
//! let camera = "192.168.1.64".parse().unwrap();
//!
//! let device = GvDevice::new(interface, camera).unwrap();
//! let (ip, mask, gateway) = device.current_ip().unwrap();
//! println!("camera at {ip}/{mask}, gateway {gateway}");
//!
//! // Negotiate stream parameters for an external receiver.
//! let params = device.create_stream().unwrap();
//! println!("stream packet size: {}", params.packet_size);
//! ```

// Core config and errors
pub use gevlink_core::{
    config::{stream_options, Config, PacketSizeAdjustment},
    constants,
    control::DeviceControl,
    error::{DeviceError, Result},
};
// Device session facade
pub use gevlink_device::{
    schema::{FeatureNode, FeatureRegistry},
    DeviceEvent, FetchOptions, GvDevice, HttpFetcher, IpConfigurationMode, StreamParams,
};
// Protocol: packet enumerations and the register map
pub use gevlink_protocol::{registers, AckStatus, Command, PacketType};

/// Convenience prelude with the most commonly used items.
pub mod prelude {
    pub use crate::{
        Config, DeviceControl, DeviceError, DeviceEvent, GvDevice, IpConfigurationMode,
        PacketSizeAdjustment, Result, StreamParams,
    };
}
