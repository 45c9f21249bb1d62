//! Indicator type inference.
//!
//! [`detect`] classifies a raw string by trying patterns in a fixed priority
//! order and returning the first match. Hashes are tried first because a
//! 32/40/64 character hex run would otherwise be accepted by looser patterns.
//! The whole (trimmed) value must match; substrings are not extracted.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::net::Ipv6Addr;

static SHA256: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-fA-F0-9]{64}$").unwrap());
static SHA1: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-fA-F0-9]{40}$").unwrap());
static MD5: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-fA-F0-9]{32}$").unwrap());

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:https?|s?ftp|tcp|file)://(?:[a-z0-9_-]{1,63}\.)*[a-z0-9-]{1,63}(?::(\d{1,5}))?(?:[/?#]\S*)?$",
    )
    .unwrap()
});

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$",
    )
    .unwrap()
});

static IPV6_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F:]*:[0-9a-fA-F:.]*$").unwrap());

static IPV4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])(?:\.(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])){3}$",
    )
    .unwrap()
});

static HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+(xn--[a-z0-9]{2,22}|[a-z]{2,13})$",
    )
    .unwrap()
});

/// Final labels that look like file extensions rather than TLDs.
const NON_TLD_SUFFIXES: &[&str] = &[
    "apk", "apt", "arpa", "asp", "bat", "bdoda", "bin", "bsspx", "cer", "cfg", "cgi", "class",
    "close", "cpl", "cpp", "crl", "css", "dat", "dll", "doc", "docx", "dyn", "exe", "fl", "gif",
    "gz", "hlp", "htm", "html", "ico", "ini", "ioc", "jar", "jpg", "js", "jxr", "lco", "lnk",
    "loader", "log", "lxdns", "mdb", "mp4", "odt", "pcap", "pdb", "pdf", "php", "plg", "plist",
    "png", "ppt", "pptx", "quit", "rar", "rtf", "scr", "sleep", "ssl", "tmp", "torproject", "txt",
    "vbp", "vbs", "w32", "wav", "xls", "xlsx", "xml", "xpi",
];

/// Recognized value categories, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Sha256,
    Sha1,
    Md5,
    Url,
    Email,
    Ipv6,
    Ipv4,
    Host,
}

impl Category {
    /// Backend indicator type name for this category.
    pub fn type_name(&self) -> &'static str {
        match self {
            Category::Sha256 | Category::Sha1 | Category::Md5 => "File",
            Category::Url => "URL",
            Category::Email => "EmailAddress",
            Category::Ipv6 | Category::Ipv4 => "Address",
            Category::Host => "Host",
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Category::Sha256 => SHA256.is_match(value),
            Category::Sha1 => SHA1.is_match(value),
            Category::Md5 => MD5.is_match(value),
            Category::Url => is_url(value),
            Category::Email => EMAIL.is_match(value),
            Category::Ipv6 => IPV6_SHAPE.is_match(value) && value.parse::<Ipv6Addr>().is_ok(),
            Category::Ipv4 => IPV4.is_match(value),
            Category::Host => is_host(value),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Sha256 => "sha256",
            Category::Sha1 => "sha1",
            Category::Md5 => "md5",
            Category::Url => "url",
            Category::Email => "email",
            Category::Ipv6 => "ipv6",
            Category::Ipv4 => "ipv4",
            Category::Host => "host",
        };
        f.write_str(s)
    }
}

const PRIORITY: [Category; 8] = [
    Category::Sha256,
    Category::Sha1,
    Category::Md5,
    Category::Url,
    Category::Email,
    Category::Ipv6,
    Category::Ipv4,
    Category::Host,
];

/// Classify `raw`, returning the first matching category.
///
/// Unrecognized input is an expected outcome and yields `None`.
pub fn detect(raw: &str) -> Option<Category> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    PRIORITY.iter().copied().find(|c| c.matches(value))
}

/// Shorthand for `detect(raw).map(|c| c.type_name())`.
pub fn detect_type_name(raw: &str) -> Option<&'static str> {
    detect(raw).map(|c| c.type_name())
}

fn is_url(value: &str) -> bool {
    let Some(caps) = URL.captures(value) else {
        return false;
    };
    match caps.get(1) {
        Some(port) => port
            .as_str()
            .parse::<u32>()
            .map(|p| (1..=65535).contains(&p))
            .unwrap_or(false),
        None => true,
    }
}

fn is_host(value: &str) -> bool {
    if value.len() > 253 {
        return false;
    }
    let Some(caps) = HOST.captures(value) else {
        return false;
    };
    let tld = caps
        .get(1)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    !NON_TLD_SUFFIXES.contains(&tld.as_str())
}
