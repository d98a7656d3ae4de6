//! Capture-interface descriptors and timestamp normalization.

use log::debug;

use crate::common::{Endianness, TimestampMicros, MICROS_PER_SEC, TIMESTAMP_UNKNOWN};
use crate::errors::{PcapError, PcapResult};
use crate::linktype::DataLink;

// Interface Description block option tags.
const IF_TSRESOL: u16 = 9;
const IF_FCSLEN: u16 = 13;
const IF_TSOFFSET: u16 = 14;

/// Description of one capture interface.
///
/// Pcap files always have exactly one interface. Pcap-ng sections declare any
/// number of them, indexed in declaration order; the table restarts empty on
/// every new section.
#[derive(Clone, Debug)]
pub struct InterfaceDescriptor {
    /// Link-layer encapsulation of the frames captured on this interface.
    pub link_type: DataLink,
    /// Number of Frame Check Sequence bytes trailing each captured frame.
    pub fcs_len: usize,
    /// Raw timestamp units per second; 0 when unknown.
    pub ticks_per_second: i64,
    /// Fixed offset added to every timestamp of this interface, in microseconds.
    pub time_offset: TimestampMicros,
}

impl Default for InterfaceDescriptor {
    fn default() -> Self {
        InterfaceDescriptor {
            link_type: DataLink::default(),
            fcs_len: 0,
            ticks_per_second: 0,
            time_offset: 0,
        }
    }
}

impl InterfaceDescriptor {
    /// Parse a pcap-ng Interface Description block body.
    ///
    /// The body holds a 16-bit link type, 16 reserved bits, a 32-bit snap
    /// length, then options (16-bit tag, 16-bit length, value padded to a
    /// 4-byte boundary). Unknown tags and unexpected value lengths are
    /// ignored; an option running past the block end is fatal.
    pub(crate) fn from_block_body(
        endianness: Endianness,
        body: &[u8],
    ) -> PcapResult<InterfaceDescriptor> {
        if body.len() < 8 {
            return Err(PcapError::TruncatedInterfaceDescription(body.len()));
        }

        let mut ifd = InterfaceDescriptor {
            link_type: DataLink::from(endianness.decode_u16(&body[0..2])),
            ticks_per_second: MICROS_PER_SEC,
            ..Default::default()
        };

        let mut offset = 8;
        while offset + 4 <= body.len() {
            let tag = endianness.decode_u16(&body[offset..offset + 2]);
            let len = endianness.decode_u16(&body[offset + 2..offset + 4]) as usize;
            offset += 4;
            if offset + len > body.len() {
                return Err(PcapError::CorruptOptionList(tag, len as u16));
            }
            let value = &body[offset..offset + len];

            match (tag, len) {
                (IF_FCSLEN, 1) => {
                    ifd.fcs_len = usize::from(value[0]);
                }
                (IF_TSOFFSET, 8) => {
                    // Seconds to add to every timestamp, stored here in microseconds.
                    let seconds = endianness.decode_u64(value) as i64;
                    ifd.time_offset = seconds.saturating_mul(MICROS_PER_SEC);
                }
                (IF_TSRESOL, 1) => {
                    // High bit set: power-of-two exponent; clear: power-of-ten.
                    ifd.ticks_per_second = if value[0] & 0x80 != 0 {
                        let exp = u32::from(value[0] & 0x7F);
                        if exp < 63 {
                            1_i64 << exp
                        } else {
                            0
                        }
                    } else {
                        10_i64.checked_pow(u32::from(value[0])).unwrap_or(0)
                    };
                }
                _ => {}
            }

            offset += len + (4 - len % 4) % 4;
        }

        debug!(
            "pcap-ng interface: link type {}, {} ticks/s, time offset {}us, FCS {} bytes",
            ifd.link_type, ifd.ticks_per_second, ifd.time_offset, ifd.fcs_len
        );

        Ok(ifd)
    }
}

/// Convert a raw pcap-ng tick count into microseconds since the Unix epoch,
/// interface time offset included.
pub(crate) fn normalize_timestamp(ifd: &InterfaceDescriptor, ticks: i64) -> TimestampMicros {
    let units = ifd.ticks_per_second;
    if units == 0 {
        return TIMESTAMP_UNKNOWN;
    }

    let micros = if units == MICROS_PER_SEC {
        ticks
    } else if units > MICROS_PER_SEC && units % MICROS_PER_SEC == 0 {
        ticks / (units / MICROS_PER_SEC)
    } else if units < MICROS_PER_SEC && MICROS_PER_SEC % units == 0 {
        ticks * (MICROS_PER_SEC / units)
    } else {
        // Some captures store a full time since 1970 with nanosecond units,
        // so ticks * 1_000_000 can exceed 64 bits. Fall back to float scaling
        // then, accepting the reduced precision.
        match ticks.checked_mul(MICROS_PER_SEC) {
            Some(product) => product / units,
            None => ((ticks as f64 * MICROS_PER_SEC as f64) / units as f64) as i64,
        }
    };

    micros + ifd.time_offset
}

/// Timestamp of a classic-pcap packet record: seconds plus sub-second ticks.
pub(crate) fn classic_timestamp(
    ifd: &InterfaceDescriptor,
    seconds: u32,
    sub_ticks: u32,
) -> TimestampMicros {
    let units = ifd.ticks_per_second;
    if units <= 0 {
        return TIMESTAMP_UNKNOWN;
    }
    i64::from(seconds) * MICROS_PER_SEC + i64::from(sub_ticks) * MICROS_PER_SEC / units
        + ifd.time_offset
}
