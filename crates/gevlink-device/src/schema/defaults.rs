//! Default feature-node catalog.
//!
//! Many devices ship schemas that omit the transport-layer features the
//! session facade depends on. After the schema bytes are fetched, the nodes
//! below are injected for every name the XML does not define itself; they
//! all resolve against the well-known bootstrap register block.

use gevlink_protocol::registers;

use super::features::{FeatureNode, FeatureRegistry};

/// Installs the default catalog into `registry`, skipping names `xml`
/// defines.
pub fn install_default_nodes(registry: &mut FeatureRegistry, xml: &[u8]) {
    use registers::*;

    registry.insert_default(
        "GevCurrentIPConfigurationLLA",
        FeatureNode::boolean(IP_CONFIGURATION, 29),
        xml,
    );
    registry.insert_default(
        "GevCurrentIPConfigurationDHCP",
        FeatureNode::boolean(IP_CONFIGURATION, 30),
        xml,
    );
    registry.insert_default(
        "GevCurrentIPConfigurationPersistentIP",
        FeatureNode::boolean(IP_CONFIGURATION, 31),
        xml,
    );

    registry.insert_default("DeviceVendorName", FeatureNode::string(MANUFACTURER_NAME, 32), xml);
    registry.insert_default("DeviceModelName", FeatureNode::string(MODEL_NAME, 32), xml);
    registry.insert_default("DeviceVersion", FeatureNode::string(DEVICE_VERSION, 32), xml);
    registry.insert_default(
        "DeviceManufacturerInfo",
        FeatureNode::string(MANUFACTURER_INFO, 48),
        xml,
    );
    registry.insert_default("DeviceID", FeatureNode::string(SERIAL_NUMBER, 16), xml);

    registry.insert_default("GevCurrentIPAddress", FeatureNode::integer(CURRENT_IP_ADDRESS), xml);
    registry.insert_default("GevCurrentSubnetMask", FeatureNode::integer(CURRENT_SUBNET_MASK), xml);
    registry.insert_default(
        "GevCurrentDefaultGateway",
        FeatureNode::integer(CURRENT_DEFAULT_GATEWAY),
        xml,
    );
    registry.insert_default(
        "GevPersistentIPAddress",
        FeatureNode::integer(PERSISTENT_IP_ADDRESS),
        xml,
    );
    registry.insert_default(
        "GevPersistentSubnetMask",
        FeatureNode::integer(PERSISTENT_SUBNET_MASK),
        xml,
    );
    registry.insert_default(
        "GevPersistentDefaultGateway",
        FeatureNode::integer(PERSISTENT_DEFAULT_GATEWAY),
        xml,
    );

    registry.insert_default(
        "GevStreamChannelCount",
        FeatureNode::integer(N_STREAM_CHANNELS).read_only(),
        xml,
    );
    registry.insert_default(
        "GevTimestampTickFrequency",
        FeatureNode::integer_u64(TIMESTAMP_TICK_FREQUENCY_HIGH, TIMESTAMP_TICK_FREQUENCY_LOW),
        xml,
    );

    let channel0 = |offset| stream_channel_register(0, offset);
    registry.insert_default(
        "GevSCPHostPort",
        FeatureNode::masked_integer(channel0(STREAM_CHANNEL_PORT), 16, 31),
        xml,
    );
    registry.insert_default(
        "GevSCPSPacketSize",
        FeatureNode::masked_integer(channel0(STREAM_CHANNEL_PACKET_SIZE), 16, 31),
        xml,
    );
    registry.insert_default(
        "GevSCPSDoNotFragment",
        FeatureNode::boolean(channel0(STREAM_CHANNEL_PACKET_SIZE), 1),
        xml,
    );
    registry.insert_default(
        "GevSCPSBigEndian",
        FeatureNode::boolean(channel0(STREAM_CHANNEL_PACKET_SIZE), 2),
        xml,
    );
    registry.insert_default(
        "GevSCDA",
        FeatureNode::integer(channel0(STREAM_CHANNEL_DESTINATION_ADDRESS)),
        xml,
    );
    registry.insert_default(
        "GevSCSP",
        FeatureNode::masked_integer(channel0(STREAM_CHANNEL_SOURCE_PORT), 16, 31).read_only(),
        xml,
    );
}
