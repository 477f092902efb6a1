//! GenICam XML URL parsing.
//!
//! Devices publish the location of their schema as a short URL string in a
//! bootstrap register. Three schemes occur in the wild:
//!
//! - `local:filename.xml;ADDRESS;SIZE` — the schema lives in device memory,
//!   `ADDRESS` and `SIZE` are unprefixed hexadecimal
//! - `file:///path/to/schema.xml` — the schema lives on the host filesystem
//! - `http://host/schema.xml` — the schema is served over HTTP
//!
//! Scheme matching is case-insensitive; devices commonly write `Local:`.

use gevlink_core::error::{DeviceError, Result};

/// Where the schema bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlScheme {
    /// Host filesystem path.
    File,
    /// Device memory range.
    Local,
    /// HTTP resource.
    Http,
}

/// A parsed GenICam XML URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenicamUrl {
    /// Dispatch scheme.
    pub scheme: UrlScheme,
    /// Filesystem path, device-local file name, or the full HTTP URL.
    pub path: String,
    /// Start of the schema in device memory (`local` scheme only).
    pub address: u64,
    /// Size of the schema in device memory (`local` scheme only).
    pub size: u64,
}

impl GenicamUrl {
    /// Parses a URL string read from a device register.
    pub fn parse(raw: &str) -> Result<GenicamUrl> {
        let (scheme, rest) = raw
            .split_once(':')
            .ok_or_else(|| DeviceError::GenicamNotFound(format!("malformed xml url '{raw}'")))?;

        if scheme.eq_ignore_ascii_case("local") {
            let mut fields = rest.split(';');
            let path = fields
                .next()
                .unwrap_or_default()
                .to_string();
            let address = parse_hex_field(raw, fields.next())?;
            let size = parse_hex_field(raw, fields.next())?;
            Ok(GenicamUrl { scheme: UrlScheme::Local, path, address, size })
        } else if scheme.eq_ignore_ascii_case("file") {
            // `file:///path` keeps an absolute path after the authority.
            let path = rest.strip_prefix("//").unwrap_or(rest).to_string();
            Ok(GenicamUrl { scheme: UrlScheme::File, path, address: 0, size: 0 })
        } else if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") {
            Ok(GenicamUrl { scheme: UrlScheme::Http, path: raw.to_string(), address: 0, size: 0 })
        } else {
            Err(DeviceError::GenicamNotFound(format!("unknown xml url scheme '{raw}'")))
        }
    }

    /// True when the payload behind the URL is a ZIP archive.
    pub fn is_zip(&self) -> bool {
        self.path.to_ascii_lowercase().ends_with(".zip")
    }
}

fn parse_hex_field(raw: &str, field: Option<&str>) -> Result<u64> {
    let field = field
        .ok_or_else(|| DeviceError::GenicamNotFound(format!("malformed xml url '{raw}'")))?;
    u64::from_str_radix(field.trim(), 16)
        .map_err(|_| DeviceError::GenicamNotFound(format!("malformed xml url '{raw}'")))
}
