//! Format validators.
//!
//! Pure functions over a single value. Each returns the [`FieldError`] to
//! report against `path`, or `None` when the value is well formed.

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use super::field::{FieldError, FieldPath};

/// Substrings that may not appear anywhere in a resource name.
pub const RESERVED_SUBSTRINGS: &[&str] = &["microsoft", "windows"];

/// Prefixes reserved by the cloud provider.
pub const RESERVED_PREFIXES: &[&str] = &["login", "xbox"];

/// Whole words reserved by the cloud provider.
pub const RESERVED_WORDS: &[&str] = &[
    "access", "azure", "bing", "bizspark", "biztalk", "cortana", "directx", "dotnet", "dynamics",
    "excel", "exchange", "foreflight", "github", "gethelp", "hololens", "hotmail", "hyper-v",
    "kinect", "lync", "msft", "o365", "office", "office365", "onedrive", "onenote", "outlook",
    "powerpoint", "sharepoint", "skype", "visio", "visualstudio",
];

/// Compile a pattern that is a constant of this crate. A bad pattern is a
/// programming error, so it panics on first use rather than rejecting input.
#[allow(clippy::expect_used)]
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern is a valid regex")
}

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^v(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(-[A-Za-z0-9.-]+)?$"));

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"^\d+[smhd]$"));

static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"^-?\d+$"));

static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"^(\d+(\.\d*)?|\.\d+)$"));

/// Validate an OpenSSH authorized-keys entry (`<type> <base64> [comment]`).
///
/// The base64 blob must decode to a key the OpenSSH wire-format parser accepts.
pub fn ssh_public_key(key: &str, path: &FieldPath) -> Option<FieldError> {
    if key.trim().is_empty() {
        return Some(FieldError::required(path, "an SSH public key is required"));
    }

    let Some(blob) = key.split_whitespace().nth(1) else {
        return Some(FieldError::invalid(
            path,
            key,
            "the SSH public key must have the form '<type> <base64-key> [comment]'",
        ));
    };

    let decoded = match STANDARD.decode(blob) {
        Ok(bytes) => bytes,
        Err(e) => {
            return Some(FieldError::invalid(
                path,
                key,
                format!("the SSH public key is not valid base64: {}", e),
            ));
        }
    };

    match ssh_key::PublicKey::from_bytes(&decoded) {
        Ok(_) => None,
        Err(e) => Some(FieldError::invalid(
            path,
            key,
            format!("the SSH public key is not a valid OpenSSH key: {}", e),
        )),
    }
}

/// Validate a Kubernetes version of the form `v<MAJOR>.<MINOR>.<PATCH>`.
pub fn kubernetes_version(version: &str, path: &FieldPath) -> Option<FieldError> {
    if version.is_empty() {
        return Some(FieldError::required(path, "a Kubernetes version is required"));
    }
    if VERSION_RE.is_match(version) {
        None
    } else {
        Some(FieldError::invalid(
            path,
            version,
            "must be a valid semantic version of the form vMAJOR.MINOR.PATCH",
        ))
    }
}

/// Parse a `vMAJOR.MINOR.PATCH` version into a comparable [`semver::Version`].
pub fn parse_kubernetes_version(version: &str) -> Option<semver::Version> {
    if !VERSION_RE.is_match(version) {
        return None;
    }
    semver::Version::parse(version.trim_start_matches('v')).ok()
}

/// An address block in CIDR notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cidr {
    pub addr: IpAddr,
    pub prefix: u8,
}

impl Cidr {
    fn max_prefix(addr: &IpAddr) -> u8 {
        match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    fn network_bits(&self) -> u128 {
        let (raw, width) = match self.addr {
            IpAddr::V4(a) => (u128::from(u32::from(a)), 32u32),
            IpAddr::V6(a) => (u128::from(a), 128u32),
        };
        let host_bits = width - u32::from(self.prefix);
        if host_bits >= 128 {
            0
        } else {
            (raw >> host_bits) << host_bits
        }
    }

    /// Whether `other` lies entirely within this block.
    pub fn contains(&self, other: &Cidr) -> bool {
        if self.addr.is_ipv4() != other.addr.is_ipv4() || other.prefix < self.prefix {
            return false;
        }
        let narrowed = Cidr {
            addr: other.addr,
            prefix: self.prefix,
        };
        narrowed.network_bits() == self.network_bits()
    }
}

impl FromStr for Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| format!("{:?} is missing a prefix length", s))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| format!("{:?} is not a valid IP address", addr))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| format!("{:?} is not a valid prefix length", prefix))?;
        if prefix > Cidr::max_prefix(&addr) {
            return Err(format!("prefix length {} is out of range", prefix));
        }
        Ok(Cidr { addr, prefix })
    }
}

/// Validate an address block in CIDR notation.
pub fn cidr(value: &str, path: &FieldPath) -> Option<FieldError> {
    match value.parse::<Cidr>() {
        Ok(_) => None,
        Err(reason) => Some(FieldError::invalid(
            path,
            value,
            format!("must be a valid CIDR block: {}", reason),
        )),
    }
}

/// Validate a dotted-quad IPv4 address.
pub fn ipv4_address(value: &str, path: &FieldPath) -> Option<FieldError> {
    match value.parse::<Ipv4Addr>() {
        Ok(_) => None,
        Err(_) => Some(FieldError::invalid(
            path,
            value,
            "must be a valid IPv4 address",
        )),
    }
}

/// Reject names reserved by the cloud provider.
pub fn resource_name(name: &str, path: &FieldPath) -> Option<FieldError> {
    let lowered = name.to_lowercase();

    if let Some(word) = RESERVED_SUBSTRINGS.iter().find(|w| lowered.contains(*w)) {
        return Some(FieldError::invalid(
            path,
            name,
            format!("cannot contain the reserved word {:?}", word),
        ));
    }
    if let Some(prefix) = RESERVED_PREFIXES.iter().find(|p| lowered.starts_with(*p)) {
        return Some(FieldError::invalid(
            path,
            name,
            format!("cannot start with the reserved word {:?}", prefix),
        ));
    }
    if RESERVED_WORDS.contains(&lowered.as_str()) {
        return Some(FieldError::invalid(path, name, "is a reserved word"));
    }
    None
}

/// Validate an integer string bounded by `[lo, hi]`.
pub fn integer_in_range(value: &str, lo: i64, hi: i64, path: &FieldPath) -> Option<FieldError> {
    let parsed = INTEGER_RE.is_match(value)
        .then(|| value.parse::<i64>().ok())
        .flatten();
    match parsed {
        Some(n) if (lo..=hi).contains(&n) => None,
        Some(_) => Some(FieldError::invalid(
            path,
            value,
            format!("must be between {} and {}", lo, hi),
        )),
        None => Some(FieldError::invalid(path, value, "must be an integer")),
    }
}

/// Validate a non-negative integer string.
pub fn non_negative_integer(value: &str, path: &FieldPath) -> Option<FieldError> {
    integer_in_range(value, 0, i64::MAX, path)
}

/// Validate a typed integer bounded by `[lo, hi]`.
pub fn bounded(value: i64, lo: i64, hi: i64, path: &FieldPath) -> Option<FieldError> {
    if (lo..=hi).contains(&value) {
        None
    } else {
        Some(FieldError::invalid(
            path,
            value,
            format!("must be between {} and {}", lo, hi),
        ))
    }
}

/// Validate a decimal string in `[0.0, 1.0]`.
pub fn decimal_fraction(value: &str, path: &FieldPath) -> Option<FieldError> {
    let parsed = DECIMAL_RE.is_match(value)
        .then(|| value.parse::<f64>().ok())
        .flatten();
    match parsed {
        Some(n) if (0.0..=1.0).contains(&n) => None,
        Some(_) => Some(FieldError::invalid(path, value, "must be between 0.0 and 1.0")),
        None => Some(FieldError::invalid(path, value, "must be a decimal number")),
    }
}

/// Validate a duration of the form `<int>[smhd]`.
pub fn duration(value: &str, path: &FieldPath) -> Option<FieldError> {
    if DURATION_RE.is_match(value) {
        None
    } else {
        Some(FieldError::invalid(
            path,
            value,
            "must be a duration of the form <integer>[s|m|h|d]",
        ))
    }
}

/// Validate a boolean carried as a string.
pub fn bool_string(value: &str, path: &FieldPath) -> Option<FieldError> {
    one_of(value, &["true", "false"], path)
}

/// Validate membership in a fixed set of values.
pub fn one_of(value: &str, allowed: &[&str], path: &FieldPath) -> Option<FieldError> {
    if allowed.contains(&value) {
        None
    } else {
        Some(FieldError::not_supported(path, value, allowed))
    }
}
