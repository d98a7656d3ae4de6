use std::fmt;

/// Link-layer header type of a capture interface.
///
/// Only the types from which an IP datagram can be extracted are named; every
/// other code is kept as [`DataLink::Unknown`] and its packets are skipped.
///
/// See [the tcpdump.org link-layer header types registry](https://www.tcpdump.org/linktypes.html).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataLink {
    /// BSD loopback encapsulation: 4-byte protocol family, host byte order.
    Null,
    /// IEEE 802.3 Ethernet.
    Ethernet,
    /// Raw IP: the packet begins directly with an IPv4 or IPv6 header.
    Raw,
    /// OpenBSD loopback encapsulation: 4-byte protocol family, network byte order.
    Loop,
    /// Any other link-layer type.
    Unknown(u16),
}

impl DataLink {
    /// Numeric link-layer type code.
    pub fn code(self) -> u16 {
        match self {
            DataLink::Null => 0,
            DataLink::Ethernet => 1,
            DataLink::Raw => 101,
            DataLink::Loop => 108,
            DataLink::Unknown(code) => code,
        }
    }
}

impl From<u16> for DataLink {
    fn from(code: u16) -> Self {
        match code {
            0 => DataLink::Null,
            1 => DataLink::Ethernet,
            101 => DataLink::Raw,
            108 => DataLink::Loop,
            code => DataLink::Unknown(code),
        }
    }
}

impl Default for DataLink {
    fn default() -> Self {
        DataLink::Unknown(u16::MAX)
    }
}

impl fmt::Display for DataLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLink::Null => write!(f, "NULL"),
            DataLink::Ethernet => write!(f, "ETHERNET"),
            DataLink::Raw => write!(f, "RAW"),
            DataLink::Loop => write!(f, "LOOP"),
            DataLink::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trip() {
        for code in [0_u16, 1, 101, 108, 42] {
            assert_eq!(DataLink::from(code).code(), code);
        }
    }
}
