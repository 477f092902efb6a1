//! Register-backed feature registry.
//!
//! Full GenICam evaluation is out of scope for this crate; what the session
//! facade needs is a much smaller thing: a mapping from well-known feature
//! names to bootstrap register descriptions, resolved against the device
//! through the [`DeviceControl`] seam. The registry holds that mapping.
//!
//! After schema bootstrap the facade installs a catalog of default nodes
//! (see [`super::defaults`]) for every name the fetched XML does not define
//! itself, so devices with incomplete schemas remain operable. Consumers
//! with a real GenICam evaluator can keep using it side by side; the
//! registry only answers for the names it knows.

use std::collections::HashMap;

use gevlink_core::{
    control::DeviceControl,
    error::{DeviceError, Result},
};

/// Access mode of a feature node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read only.
    ReadOnly,
    /// Read and write.
    ReadWrite,
}

/// How a feature maps onto device registers.
///
/// Bit positions use the protocol's MSB-0 numbering: bit 0 is the most
/// significant bit of the big-endian 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// A bit field of a 32-bit register, `msb..=lsb` in MSB-0 numbering.
    /// `msb == 0 && lsb == 31` describes the full register.
    Integer {
        /// Register address.
        address: u64,
        /// Most significant bit of the field.
        msb: u8,
        /// Least significant bit of the field.
        lsb: u8,
    },
    /// A 64-bit value split over two registers.
    IntegerU64 {
        /// Register holding the high word.
        high: u64,
        /// Register holding the low word.
        low: u64,
    },
    /// A single flag bit of a 32-bit register.
    Boolean {
        /// Register address.
        address: u64,
        /// Flag bit in MSB-0 numbering.
        bit: u8,
    },
    /// A command executed by raising a flag bit.
    Command {
        /// Register address.
        address: u64,
        /// Trigger bit in MSB-0 numbering.
        bit: u8,
    },
    /// A fixed-length NUL-padded string.
    String {
        /// Register address.
        address: u64,
        /// Field length in bytes.
        length: u16,
    },
}

/// One named feature and its constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureNode {
    /// Register mapping.
    pub kind: FeatureKind,
    /// Access mode.
    pub access: Access,
    /// Optional lower bound for integer features.
    pub min: Option<i64>,
    /// Optional upper bound for integer features.
    pub max: Option<i64>,
    /// Optional increment for integer features.
    pub inc: Option<i64>,
}

impl FeatureNode {
    /// A full 32-bit register feature.
    pub fn integer(address: u64) -> FeatureNode {
        Self::masked_integer(address, 0, 31)
    }

    /// A bit-field register feature.
    pub fn masked_integer(address: u64, msb: u8, lsb: u8) -> FeatureNode {
        FeatureNode {
            kind: FeatureKind::Integer { address, msb, lsb },
            access: Access::ReadWrite,
            min: None,
            max: None,
            inc: None,
        }
    }

    /// A 64-bit feature split over high and low registers.
    pub fn integer_u64(high: u64, low: u64) -> FeatureNode {
        FeatureNode {
            kind: FeatureKind::IntegerU64 { high, low },
            access: Access::ReadOnly,
            min: None,
            max: None,
            inc: None,
        }
    }

    /// A flag-bit feature.
    pub fn boolean(address: u64, bit: u8) -> FeatureNode {
        FeatureNode {
            kind: FeatureKind::Boolean { address, bit },
            access: Access::ReadWrite,
            min: None,
            max: None,
            inc: None,
        }
    }

    /// A command feature.
    pub fn command(address: u64, bit: u8) -> FeatureNode {
        FeatureNode {
            kind: FeatureKind::Command { address, bit },
            access: Access::ReadWrite,
            min: None,
            max: None,
            inc: None,
        }
    }

    /// A fixed-length string feature.
    pub fn string(address: u64, length: u16) -> FeatureNode {
        FeatureNode {
            kind: FeatureKind::String { address, length },
            access: Access::ReadOnly,
            min: None,
            max: None,
            inc: None,
        }
    }

    /// Marks the node read-only.
    pub fn read_only(mut self) -> FeatureNode {
        self.access = Access::ReadOnly;
        self
    }

    /// Attaches integer bounds and increment.
    pub fn with_bounds(mut self, min: i64, max: i64, inc: i64) -> FeatureNode {
        self.min = Some(min);
        self.max = Some(max);
        self.inc = Some(inc);
        self
    }
}

/// Mapping from feature names to register descriptions.
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    nodes: HashMap<String, FeatureNode>,
}

/// True when the schema XML defines a node with the given name itself.
///
/// A byte scan for `Name="<name>"` is all that is needed here: it decides
/// whether a *default* node may be injected, it never interprets the schema.
pub(crate) fn xml_defines(xml: &[u8], name: &str) -> bool {
    let needle = format!("Name=\"{name}\"");
    xml.windows(needle.len()).any(|window| window == needle.as_bytes())
}

impl FeatureRegistry {
    /// Creates an empty registry.
    pub fn new() -> FeatureRegistry {
        FeatureRegistry::default()
    }

    /// Inserts or replaces a node.
    pub fn insert(&mut self, name: &str, node: FeatureNode) {
        self.nodes.insert(name.to_string(), node);
    }

    /// Inserts a default node unless the schema XML defines the name.
    pub fn insert_default(&mut self, name: &str, node: FeatureNode, xml: &[u8]) {
        if !xml_defines(xml, name) {
            self.nodes.entry(name.to_string()).or_insert(node);
        }
    }

    /// Looks up a node by name.
    pub fn node(&self, name: &str) -> Option<&FeatureNode> {
        self.nodes.get(name)
    }

    /// Whether a feature of the given name is known.
    pub fn is_available(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    fn require(&self, name: &str) -> Result<&FeatureNode> {
        self.nodes
            .get(name)
            .ok_or_else(|| DeviceError::InvalidParameter(format!("unknown feature '{name}'")))
    }

    /// Reads an integer feature.
    pub fn get_integer(&self, device: &dyn DeviceControl, name: &str) -> Result<i64> {
        match self.require(name)?.kind {
            FeatureKind::Integer { address, msb, lsb } => {
                let register = device.read_register(address)?;
                Ok(extract_field(register, msb, lsb) as i64)
            }
            FeatureKind::IntegerU64 { high, low } => {
                let high = device.read_register(high)? as u64;
                let low = device.read_register(low)? as u64;
                Ok(((high << 32) | low) as i64)
            }
            _ => Err(DeviceError::InvalidParameter(format!("'{name}' is not an integer feature"))),
        }
    }

    /// Writes an integer feature. Bit fields are read-modified-written so
    /// sibling flags in the same register are preserved.
    pub fn set_integer(&self, device: &dyn DeviceControl, name: &str, value: i64) -> Result<()> {
        let node = self.require(name)?;
        if node.access == Access::ReadOnly {
            return Err(DeviceError::InvalidParameter(format!("feature '{name}' is read only")));
        }
        match node.kind {
            FeatureKind::Integer { address, msb, lsb } => {
                if msb == 0 && lsb == 31 {
                    device.write_register(address, value as u32)
                } else {
                    let register = device.read_register(address)?;
                    device.write_register(address, insert_field(register, msb, lsb, value as u32))
                }
            }
            _ => Err(DeviceError::InvalidParameter(format!("'{name}' is not an integer feature"))),
        }
    }

    /// Bounds of an integer feature; falls back to the representable range
    /// of the register field when the node carries no explicit bounds.
    pub fn integer_bounds(&self, name: &str) -> Result<(i64, i64)> {
        let node = self.require(name)?;
        match node.kind {
            FeatureKind::Integer { msb, lsb, .. } => {
                let width = u32::from(lsb - msb) + 1;
                let field_max = if width >= 32 { u32::MAX as i64 } else { (1i64 << width) - 1 };
                Ok((node.min.unwrap_or(0), node.max.unwrap_or(field_max)))
            }
            FeatureKind::IntegerU64 { .. } => Ok((node.min.unwrap_or(0), node.max.unwrap_or(i64::MAX))),
            _ => Err(DeviceError::InvalidParameter(format!("'{name}' is not an integer feature"))),
        }
    }

    /// Increment of an integer feature (1 when unspecified).
    pub fn integer_increment(&self, name: &str) -> Result<i64> {
        Ok(self.require(name)?.inc.unwrap_or(1))
    }

    /// Reads a boolean feature.
    pub fn get_boolean(&self, device: &dyn DeviceControl, name: &str) -> Result<bool> {
        match self.require(name)?.kind {
            FeatureKind::Boolean { address, bit } => {
                let register = device.read_register(address)?;
                Ok(register & bit_mask(bit) != 0)
            }
            _ => Err(DeviceError::InvalidParameter(format!("'{name}' is not a boolean feature"))),
        }
    }

    /// Writes a boolean feature, preserving sibling bits.
    pub fn set_boolean(&self, device: &dyn DeviceControl, name: &str, value: bool) -> Result<()> {
        let node = self.require(name)?;
        if node.access == Access::ReadOnly {
            return Err(DeviceError::InvalidParameter(format!("feature '{name}' is read only")));
        }
        match node.kind {
            FeatureKind::Boolean { address, bit } | FeatureKind::Command { address, bit } => {
                let register = device.read_register(address)?;
                let mask = bit_mask(bit);
                let updated = if value { register | mask } else { register & !mask };
                device.write_register(address, updated)
            }
            _ => Err(DeviceError::InvalidParameter(format!("'{name}' is not a boolean feature"))),
        }
    }

    /// Executes a command feature by raising its trigger bit.
    pub fn execute(&self, device: &dyn DeviceControl, name: &str) -> Result<()> {
        match self.require(name)?.kind {
            FeatureKind::Command { address, bit } => {
                let register = device.read_register(address)?;
                device.write_register(address, register | bit_mask(bit))
            }
            _ => Err(DeviceError::InvalidParameter(format!("'{name}' is not a command feature"))),
        }
    }

    /// Reads a NUL-padded string feature.
    pub fn get_string(&self, device: &dyn DeviceControl, name: &str) -> Result<String> {
        match self.require(name)?.kind {
            FeatureKind::String { address, length } => {
                let mut raw = vec![0u8; length as usize];
                device.read_memory(address, &mut raw)?;
                let end = raw.iter().position(|&byte| byte == 0).unwrap_or(raw.len());
                Ok(String::from_utf8_lossy(&raw[..end]).trim().to_string())
            }
            _ => Err(DeviceError::InvalidParameter(format!("'{name}' is not a string feature"))),
        }
    }
}

fn bit_mask(bit: u8) -> u32 {
    1u32 << (31 - bit)
}

fn extract_field(register: u32, msb: u8, lsb: u8) -> u32 {
    let width = u32::from(lsb - msb) + 1;
    let shift = 31 - u32::from(lsb);
    if width >= 32 {
        register
    } else {
        (register >> shift) & ((1u32 << width) - 1)
    }
}

fn insert_field(register: u32, msb: u8, lsb: u8, value: u32) -> u32 {
    let width = u32::from(lsb - msb) + 1;
    let shift = 31 - u32::from(lsb);
    if width >= 32 {
        return value;
    }
    let mask = ((1u32 << width) - 1) << shift;
    (register & !mask) | ((value << shift) & mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, collections::HashMap};

    /// Registers-only device stub.
    #[derive(Default)]
    struct RegisterBank {
        registers: RefCell<HashMap<u64, u32>>,
        memory: RefCell<HashMap<u64, Vec<u8>>>,
    }

    impl DeviceControl for RegisterBank {
        fn read_memory(&self, address: u64, buffer: &mut [u8]) -> Result<()> {
            let memory = self.memory.borrow();
            let bytes = memory.get(&address).cloned().unwrap_or_default();
            for (dst, src) in buffer.iter_mut().zip(bytes.iter().chain(std::iter::repeat(&0))) {
                *dst = *src;
            }
            Ok(())
        }
        fn write_memory(&self, address: u64, data: &[u8]) -> Result<()> {
            self.memory.borrow_mut().insert(address, data.to_vec());
            Ok(())
        }
        fn read_register(&self, address: u64) -> Result<u32> {
            Ok(*self.registers.borrow().get(&address).unwrap_or(&0))
        }
        fn write_register(&self, address: u64, value: u32) -> Result<()> {
            self.registers.borrow_mut().insert(address, value);
            Ok(())
        }
    }

    #[test]
    fn masked_integer_uses_msb0_numbering() {
        assert_eq!(extract_field(0x1234_0000, 0, 15), 0x1234);
        assert_eq!(extract_field(0x0000_5678, 16, 31), 0x5678);
        assert_eq!(insert_field(0xffff_0000, 16, 31, 0x1500), 0xffff_1500);
    }

    #[test]
    fn bit_mask_is_msb0() {
        assert_eq!(bit_mask(0), 0x8000_0000);
        assert_eq!(bit_mask(31), 0x0000_0001);
    }

    #[test]
    fn packet_size_field_round_trips_through_registers() {
        let bank = RegisterBank::default();
        bank.write_register(0x0d04, 0x4000_0000).expect("seed");

        let mut registry = FeatureRegistry::new();
        registry.insert("GevSCPSPacketSize", FeatureNode::masked_integer(0x0d04, 16, 31));
        registry.set_integer(&bank, "GevSCPSPacketSize", 1500).expect("set");

        // The do-not-fragment flag in the same register survived the write.
        assert_eq!(bank.read_register(0x0d04).expect("read"), 0x4000_05dc);
        assert_eq!(registry.get_integer(&bank, "GevSCPSPacketSize").expect("get"), 1500);
    }

    #[test]
    fn booleans_preserve_sibling_bits() {
        let bank = RegisterBank::default();
        bank.write_register(0x14, 0x0000_0005).expect("seed");

        let mut registry = FeatureRegistry::new();
        registry.insert("GevCurrentIPConfigurationDHCP", FeatureNode::boolean(0x14, 30));
        registry.set_boolean(&bank, "GevCurrentIPConfigurationDHCP", true).expect("set");
        assert_eq!(bank.read_register(0x14).expect("read"), 0x0000_0007);

        registry.set_boolean(&bank, "GevCurrentIPConfigurationDHCP", false).expect("clear");
        assert_eq!(bank.read_register(0x14).expect("read"), 0x0000_0005);
    }

    #[test]
    fn default_nodes_yield_to_schema_definitions() {
        let xml = br#"<Integer Name="GevSCPSPacketSize"><Value>9000</Value></Integer>"#;
        let mut registry = FeatureRegistry::new();
        registry.insert_default("GevSCPSPacketSize", FeatureNode::masked_integer(0xd04, 16, 31), xml);
        registry.insert_default("GevSCDA", FeatureNode::integer(0xd18), xml);

        assert!(!registry.is_available("GevSCPSPacketSize"));
        assert!(registry.is_available("GevSCDA"));
    }

    #[test]
    fn bounds_default_to_field_width() {
        let mut registry = FeatureRegistry::new();
        registry.insert("GevSCPSPacketSize", FeatureNode::masked_integer(0xd04, 16, 31));
        assert_eq!(registry.integer_bounds("GevSCPSPacketSize").expect("bounds"), (0, 0xffff));
        assert_eq!(registry.integer_increment("GevSCPSPacketSize").expect("inc"), 1);

        registry.insert(
            "GevSCPSPacketSize",
            FeatureNode::masked_integer(0xd04, 16, 31).with_bounds(576, 9000, 4),
        );
        assert_eq!(registry.integer_bounds("GevSCPSPacketSize").expect("bounds"), (576, 9000));
        assert_eq!(registry.integer_increment("GevSCPSPacketSize").expect("inc"), 4);
    }

    #[test]
    fn strings_stop_at_nul() {
        let bank = RegisterBank::default();
        bank.write_memory(0x48, b"Acme Vision\0\0\0\0\0").expect("seed");

        let mut registry = FeatureRegistry::new();
        registry.insert("DeviceVendorName", FeatureNode::string(0x48, 32));
        assert_eq!(registry.get_string(&bank, "DeviceVendorName").expect("get"), "Acme Vision");
    }

    #[test]
    fn unknown_feature_is_an_invalid_parameter() {
        let registry = FeatureRegistry::new();
        let bank = RegisterBank::default();
        assert!(matches!(
            registry.get_integer(&bank, "NoSuchFeature"),
            Err(DeviceError::InvalidParameter(_))
        ));
    }
}
