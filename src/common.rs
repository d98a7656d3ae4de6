use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Integer byte order of a capture file or pcap-ng section.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endianness {
    /// Most significant byte first.
    Big,
    /// Least significant byte first.
    Little,
}

impl Endianness {
    /// True if the endianness is big.
    pub fn is_big(self) -> bool {
        self == Endianness::Big
    }

    /// True if the endianness is little.
    pub fn is_little(self) -> bool {
        self == Endianness::Little
    }

    pub(crate) fn decode_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endianness::Big => BigEndian::read_u16(buf),
            Endianness::Little => LittleEndian::read_u16(buf),
        }
    }

    pub(crate) fn decode_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endianness::Big => BigEndian::read_u32(buf),
            Endianness::Little => LittleEndian::read_u32(buf),
        }
    }

    pub(crate) fn decode_u64(self, buf: &[u8]) -> u64 {
        match self {
            Endianness::Big => BigEndian::read_u64(buf),
            Endianness::Little => LittleEndian::read_u64(buf),
        }
    }
}

/// A capture timestamp in signed microseconds since the Unix epoch.
///
/// [`TIMESTAMP_UNKNOWN`] marks a packet without a usable timestamp.
pub type TimestampMicros = i64;

/// Reserved sentinel for a missing or unknown timestamp.
///
/// Never produced by timestamp arithmetic on a known tick resolution.
pub const TIMESTAMP_UNKNOWN: TimestampMicros = -1;

pub(crate) const MICROS_PER_SEC: i64 = 1_000_000;
pub(crate) const NANOS_PER_SEC: i64 = 1_000_000_000;
