use std::fmt;
use std::str::FromStr;

/// Data link type of a capture, as defined by the tcpdump.org `LINKTYPE_` values
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LinkType {
    /// BSD loopback encapsulation, address family in host byte order
    Null,
    Ethernet,
    /// Raw IP, version found in the first nibble
    Raw,
    /// OpenBSD loopback, address family in network byte order
    Loop,
    LinuxSll,
    Ipv4,
    Ipv6,
    Other(i32),
}

impl LinkType {
    /// Convert a DLT/LINKTYPE value (as returned by libpcap or found in a pcap header)
    pub fn from_dlt(dlt: i32) -> LinkType {
        match dlt {
            0 => LinkType::Null,
            1 => LinkType::Ethernet,
            // DLT_RAW is 12 on most platforms, LINKTYPE_RAW is 101
            12 | 14 | 101 => LinkType::Raw,
            108 => LinkType::Loop,
            113 => LinkType::LinuxSll,
            228 => LinkType::Ipv4,
            229 => LinkType::Ipv6,
            n => LinkType::Other(n),
        }
    }

    pub fn dlt(self) -> i32 {
        match self {
            LinkType::Null => 0,
            LinkType::Ethernet => 1,
            LinkType::Raw => 101,
            LinkType::Loop => 108,
            LinkType::LinuxSll => 113,
            LinkType::Ipv4 => 228,
            LinkType::Ipv6 => 229,
            LinkType::Other(n) => n,
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinkType::Null => f.write_str("null"),
            LinkType::Ethernet => f.write_str("ethernet"),
            LinkType::Raw => f.write_str("raw"),
            LinkType::Loop => f.write_str("loop"),
            LinkType::LinuxSll => f.write_str("linux_sll"),
            LinkType::Ipv4 => f.write_str("ipv4"),
            LinkType::Ipv6 => f.write_str("ipv6"),
            LinkType::Other(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for LinkType {
    type Err = String;

    /// Parse a link type name (case-insensitive) or a numeric DLT value
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let link_type = match s.to_ascii_lowercase().as_str() {
            "null" => LinkType::Null,
            "ethernet" | "en10mb" => LinkType::Ethernet,
            "raw" => LinkType::Raw,
            "loop" => LinkType::Loop,
            "linux_sll" | "sll" => LinkType::LinuxSll,
            "ipv4" => LinkType::Ipv4,
            "ipv6" => LinkType::Ipv6,
            other => match other.parse::<i32>() {
                Ok(n) => LinkType::from_dlt(n),
                Err(_) => return Err(format!("unknown link type '{s}'")),
            },
        };
        Ok(link_type)
    }
}
