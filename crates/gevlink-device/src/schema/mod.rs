//! GenICam schema bootstrap.
//!
//! A device publishes up to two URL strings pointing at its schema. The
//! loader reads them through block I/O, dispatches on the URL scheme,
//! unwraps zipped payloads, and hands the XML bytes back to the facade,
//! which caches them for the session lifetime and installs the default
//! feature-node catalog.

/// Default feature-node catalog.
pub mod defaults;
/// Register-backed feature registry.
pub mod features;
/// XML URL parsing.
pub mod url;
/// Minimal ZIP reader for zipped schemas.
pub mod zip;

use std::time::Duration;

use gevlink_core::{
    config::Config,
    constants::XML_URL_SIZE,
    control::DeviceControl,
    error::{DeviceError, Result},
};
use gevlink_protocol::registers;
use tracing::{debug, error, info};

pub use features::{Access, FeatureKind, FeatureNode, FeatureRegistry};
pub use url::{GenicamUrl, UrlScheme};

/// Options forwarded to the injected HTTP fetcher.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Overall request timeout, `None` for the fetcher's default.
    pub timeout: Option<Duration>,
    /// Whether redirects should be followed.
    pub follow_redirects: bool,
}

impl FetchOptions {
    /// Builds fetch options from the session configuration.
    pub fn from_config(config: &Config) -> FetchOptions {
        FetchOptions {
            timeout: config.http_timeout,
            follow_redirects: config.http_follow_redirects,
        }
    }
}

/// External HTTP fetcher used for `http` schema URLs.
///
/// The control core does not ship an HTTP client; consumers inject one
/// through this trait when their devices publish HTTP schema URLs.
pub trait HttpFetcher: Send + Sync {
    /// Fetches `url` and returns the response body read to EOF.
    fn fetch(&self, url: &str, options: &FetchOptions) -> std::io::Result<Vec<u8>>;
}

/// Fetches the schema XML, trying URL slot 0 then slot 1.
pub fn load_genicam(
    device: &dyn DeviceControl,
    fetcher: Option<&dyn HttpFetcher>,
    options: &FetchOptions,
) -> Result<Vec<u8>> {
    match load_from_slot(device, registers::XML_URL_0, fetcher, options) {
        Ok(xml) => Ok(xml),
        Err(slot0_error) => {
            debug!("[load_genicam] url slot 0 failed: {slot0_error}");
            load_from_slot(device, registers::XML_URL_1, fetcher, options)
                .map_err(|_| slot0_error)
        }
    }
}

fn load_from_slot(
    device: &dyn DeviceControl,
    slot_address: u64,
    fetcher: Option<&dyn HttpFetcher>,
    options: &FetchOptions,
) -> Result<Vec<u8>> {
    let mut raw = vec![0u8; XML_URL_SIZE];
    device.read_memory(slot_address, &mut raw)?;

    let end = raw.iter().position(|&byte| byte == 0).unwrap_or(raw.len());
    let url_string = String::from_utf8_lossy(&raw[..end]).trim().to_string();
    if url_string.is_empty() {
        return Err(DeviceError::GenicamNotFound(format!(
            "empty xml url at {slot_address:#x}"
        )));
    }
    info!("[load_genicam] xml url = '{url_string}' at {slot_address:#x}");

    let url = match GenicamUrl::parse(&url_string) {
        Ok(url) => url,
        Err(err) => {
            error!("[load_genicam] {err}");
            return Err(err);
        }
    };

    let mut data = match url.scheme {
        UrlScheme::File => std::fs::read(&url.path).map_err(|err| {
            DeviceError::GenicamNotFound(format!("can't read '{}': {err}", url.path))
        })?,
        UrlScheme::Local => {
            info!(
                "[load_genicam] xml address = {:#x} - size = {:#x} - {}",
                url.address, url.size, url.path
            );
            if url.size == 0 {
                return Err(DeviceError::GenicamNotFound("zero-sized local xml".into()));
            }
            let mut data = vec![0u8; url.size as usize];
            device.read_memory(url.address, &mut data)?;
            data
        }
        UrlScheme::Http => {
            let fetcher = fetcher.ok_or_else(|| {
                DeviceError::GenicamNotFound(format!(
                    "no http fetcher installed for '{url_string}'"
                ))
            })?;
            fetcher.fetch(&url.path, options).map_err(|err| {
                DeviceError::GenicamNotFound(format!("http fetch failed: {err}"))
            })?
        }
    };

    if url.is_zip() {
        info!("[load_genicam] zipped xml data");
        data = zip::first_file(&data)
            .map_err(|err| DeviceError::GenicamNotFound(format!("invalid zip data: {err}")))?;
    }

    if data.is_empty() {
        return Err(DeviceError::GenicamNotFound("empty genicam payload".into()));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, collections::BTreeMap};

    /// Flat memory device stub: slot registers and schema bytes live in one
    /// sparse address space.
    #[derive(Default)]
    struct FlatMemory {
        bytes: RefCell<BTreeMap<u64, u8>>,
    }

    impl FlatMemory {
        fn store(&self, address: u64, data: &[u8]) {
            let mut bytes = self.bytes.borrow_mut();
            for (i, &byte) in data.iter().enumerate() {
                bytes.insert(address + i as u64, byte);
            }
        }
    }

    impl DeviceControl for FlatMemory {
        fn read_memory(&self, address: u64, buffer: &mut [u8]) -> Result<()> {
            let bytes = self.bytes.borrow();
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = *bytes.get(&(address + i as u64)).unwrap_or(&0);
            }
            Ok(())
        }
        fn write_memory(&self, address: u64, data: &[u8]) -> Result<()> {
            self.store(address, data);
            Ok(())
        }
        fn read_register(&self, _address: u64) -> Result<u32> {
            Ok(0)
        }
        fn write_register(&self, _address: u64, _value: u32) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn loads_local_xml_from_device_memory() {
        let device = FlatMemory::default();
        let xml = b"<RegisterDescription ModelName=\"Test\"/>";
        device.store(0x10000, xml);
        device.store(
            registers::XML_URL_0,
            format!("Local:test.xml;10000;{:x}\0", xml.len()).as_bytes(),
        );

        let loaded = load_genicam(&device, None, &FetchOptions::default()).expect("load");
        assert_eq!(loaded, xml);
    }

    #[test]
    fn falls_back_to_second_url_slot() {
        let device = FlatMemory::default();
        let xml = b"<RegisterDescription/>";
        device.store(0x20000, xml);
        // Slot 0 carries an unusable scheme, slot 1 is fine.
        device.store(registers::XML_URL_0, b"ftp://nowhere/schema.xml\0");
        device.store(
            registers::XML_URL_1,
            format!("local:backup.xml;20000;{:x}\0", xml.len()).as_bytes(),
        );

        let loaded = load_genicam(&device, None, &FetchOptions::default()).expect("load");
        assert_eq!(loaded, xml);
    }

    #[test]
    fn both_slots_failing_is_genicam_not_found() {
        let device = FlatMemory::default();
        let err = load_genicam(&device, None, &FetchOptions::default()).expect_err("no urls");
        assert!(matches!(err, DeviceError::GenicamNotFound(_)));
    }

    #[test]
    fn http_scheme_without_fetcher_fails() {
        let device = FlatMemory::default();
        device.store(registers::XML_URL_0, b"http://vendor.example/schema.xml\0");
        let err = load_genicam(&device, None, &FetchOptions::default()).expect_err("no fetcher");
        assert!(matches!(err, DeviceError::GenicamNotFound(_)));
    }

    #[test]
    fn http_fetcher_is_consulted() {
        struct CannedFetcher;
        impl HttpFetcher for CannedFetcher {
            fn fetch(&self, url: &str, _options: &FetchOptions) -> std::io::Result<Vec<u8>> {
                assert_eq!(url, "http://vendor.example/schema.xml");
                Ok(b"<RegisterDescription/>".to_vec())
            }
        }

        let device = FlatMemory::default();
        device.store(registers::XML_URL_0, b"http://vendor.example/schema.xml\0");
        let loaded = load_genicam(&device, Some(&CannedFetcher), &FetchOptions::default())
            .expect("load");
        assert_eq!(loaded, b"<RegisterDescription/>");
    }

    #[test]
    fn zipped_local_payload_is_decompressed() {
        let device = FlatMemory::default();
        let xml = b"<RegisterDescription Compressed=\"yes\"/>";
        let archive = crate::schema::zip::tests_support::build_stored_zip("schema.xml", xml);
        device.store(0x30000, &archive);
        device.store(
            registers::XML_URL_0,
            format!("Local:schema.zip;30000;{:x}\0", archive.len()).as_bytes(),
        );

        let loaded = load_genicam(&device, None, &FetchOptions::default()).expect("load");
        assert_eq!(loaded, xml);
    }

    #[test]
    fn file_scheme_reads_from_disk() {
        let path = std::env::temp_dir().join("gevlink-schema-test.xml");
        std::fs::write(&path, b"<RegisterDescription/>").expect("write temp schema");

        let device = FlatMemory::default();
        device.store(
            registers::XML_URL_0,
            format!("file://{}\0", path.display()).as_bytes(),
        );

        let loaded = load_genicam(&device, None, &FetchOptions::default()).expect("load");
        assert_eq!(loaded, b"<RegisterDescription/>");
        let _ = std::fs::remove_file(&path);
    }
}
