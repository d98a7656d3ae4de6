//! Pcap-ng block framing.
//!
//! Every pcap-ng block shares the same envelope:
//!
//! ```text
//!  0                   1                   2                   3
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          Block Type                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Block Total Length                       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! /                          Block Body                           /
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Block Total Length                       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The two length fields must agree on every block; a mismatch leaves the
//! stream at an unknown position and is fatal for the whole capture.

use std::io::Read;

use byteorder::{BigEndian, ByteOrder};

use crate::byte_reader::ByteOrderReader;
use crate::common::Endianness;
use crate::errors::{PcapError, PcapResult};

pub(crate) const SECTION_HEADER_BLOCK: u32 = 0x0A0D0D0A;
pub(crate) const INTERFACE_DESCRIPTION_BLOCK: u32 = 0x00000001;
/// Obsolete Packet Block, superseded by the Enhanced Packet Block.
pub(crate) const PACKET_BLOCK: u32 = 0x00000002;
pub(crate) const SIMPLE_PACKET_BLOCK: u32 = 0x00000003;
pub(crate) const ENHANCED_PACKET_BLOCK: u32 = 0x00000006;

const BYTE_ORDER_MAGIC: u32 = 0x1A2B3C4D;
const BYTE_ORDER_MAGIC_SWAPPED: u32 = 0x4D3C2B1A;

/// Read one pcap-ng block whose 4-byte type has already been consumed.
///
/// Returns the block body, without the type and the two length fields. For a
/// Section Header block the body starts with the 4 byte-order-magic bytes,
/// which also re-fix the stream endianness before the leading length field is
/// interpreted.
pub(crate) fn read_block_body<R: Read>(
    stream: &mut ByteOrderReader<R>,
    block_type: u32,
) -> PcapResult<Vec<u8>> {
    let mut len_field = [0_u8; 4];
    stream.read_exact(&mut len_field)?;

    let mut body = Vec::new();
    if block_type == SECTION_HEADER_BLOCK {
        // The section header block type is an endian-neutral palindrome; the
        // byte order of the whole section comes from the next 4 bytes.
        let mut order = [0_u8; 4];
        stream.read_exact(&mut order)?;
        match BigEndian::read_u32(&order) {
            BYTE_ORDER_MAGIC => stream.set_endianness(Endianness::Big),
            BYTE_ORDER_MAGIC_SWAPPED => stream.set_endianness(Endianness::Little),
            magic => return Err(PcapError::BadByteOrderMagic(magic)),
        }
        body.extend_from_slice(&order);
    }

    // The total length counts the block type and both length fields.
    let total_len = stream.endianness().decode_u32(&len_field);
    if total_len % 4 != 0 || (total_len as usize) < 12 + body.len() {
        return Err(PcapError::BadBlockLength(total_len));
    }

    let start = body.len();
    body.resize(total_len as usize - 12, 0);
    stream.read_exact(&mut body[start..])?;

    let trailer_len = stream.read_u32()?;
    if trailer_len != total_len {
        return Err(PcapError::BlockLengthMismatch(total_len, trailer_len));
    }

    Ok(body)
}

/// Captured-packet fields shared by the pcap-ng packet block flavors.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PacketRecord {
    /// Index into the interface table of the current section.
    pub if_index: usize,
    /// Raw 64-bit timestamp tick count, absent for Simple Packet blocks.
    pub ts_ticks: Option<i64>,
    /// Offset of the captured bytes inside the block body.
    pub cap_start: usize,
    /// Number of captured bytes.
    pub cap_len: usize,
    /// Original size of the packet on the network.
    pub orig_len: usize,
}

impl PacketRecord {
    /// Extract an Enhanced Packet block body, or an obsolete Packet block
    /// body when `obsolete` (its interface index is 16-bit, the rest of the
    /// layout is identical). Returns `None` for a body too short to hold the
    /// fixed fields; such a block carries no packet and is skipped.
    pub fn from_enhanced(
        endianness: Endianness,
        body: &[u8],
        obsolete: bool,
    ) -> Option<PacketRecord> {
        if body.len() < 20 {
            return None;
        }
        let if_index = if obsolete {
            endianness.decode_u16(&body[0..2]) as usize
        } else {
            endianness.decode_u32(&body[0..4]) as usize
        };
        let ts_high = u64::from(endianness.decode_u32(&body[4..8]));
        let ts_low = u64::from(endianness.decode_u32(&body[8..12]));
        let cap_len = (endianness.decode_u32(&body[12..16]) as usize).min(body.len() - 20);
        let orig_len = endianness.decode_u32(&body[16..20]) as usize;

        Some(PacketRecord {
            if_index,
            ts_ticks: Some((ts_high << 32 | ts_low) as i64),
            cap_start: 20,
            cap_len,
            orig_len,
        })
    }

    /// Extract a Simple Packet block body. The block stores no timestamp and
    /// no interface index (index 0 is implied).
    pub fn from_simple(endianness: Endianness, body: &[u8]) -> Option<PacketRecord> {
        if body.len() < 4 {
            return None;
        }
        let orig_len = endianness.decode_u32(&body[0..4]) as usize;

        Some(PacketRecord {
            if_index: 0,
            ts_ticks: None,
            cap_start: 4,
            cap_len: orig_len.min(body.len() - 4),
            orig_len,
        })
    }
}
