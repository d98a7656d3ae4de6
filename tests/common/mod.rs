//! Helpers building synthetic captures and frames in memory.
#![allow(dead_code)]

use byteorder::{ByteOrder, WriteBytesExt};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_IPV6: u16 = 0x86DD;
pub const ETHERTYPE_8021Q: u16 = 0x8100;

pub const LINKTYPE_NULL: u32 = 0;
pub const LINKTYPE_ETHERNET: u32 = 1;
pub const LINKTYPE_RAW: u32 = 101;

pub const SECTION_HEADER_BLOCK: u32 = 0x0A0D0D0A;
pub const INTERFACE_DESCRIPTION_BLOCK: u32 = 1;
pub const SIMPLE_PACKET_BLOCK: u32 = 3;
pub const ENHANCED_PACKET_BLOCK: u32 = 6;

pub const IF_TSRESOL: u16 = 9;
pub const IF_TSOFFSET: u16 = 14;

/* ----- classic pcap ----- */

/// Global header of a classic pcap file in the byte order `B`.
///
/// `nanoseconds` selects the nanosecond-resolution magic. `link_word` is the
/// full packed link-type field (link type in the low 16 bits).
pub fn classic_header<B: ByteOrder>(nanoseconds: bool, link_word: u32) -> Vec<u8> {
    let magic: u32 = if nanoseconds { 0xA1B23C4D } else { 0xA1B2C3D4 };
    let mut out = Vec::new();
    out.write_u32::<B>(magic).unwrap();
    out.write_u16::<B>(2).unwrap(); // major
    out.write_u16::<B>(4).unwrap(); // minor
    out.write_i32::<B>(0).unwrap(); // timezone correction
    out.write_u32::<B>(0).unwrap(); // sigfigs
    out.write_u32::<B>(65535).unwrap(); // snap length
    out.write_u32::<B>(link_word).unwrap();
    out
}

/// Append one classic packet record.
pub fn classic_record<B: ByteOrder>(
    out: &mut Vec<u8>,
    seconds: u32,
    sub_ticks: u32,
    orig_len: u32,
    data: &[u8],
) {
    out.write_u32::<B>(seconds).unwrap();
    out.write_u32::<B>(sub_ticks).unwrap();
    out.write_u32::<B>(data.len() as u32).unwrap();
    out.write_u32::<B>(orig_len).unwrap();
    out.extend_from_slice(data);
}

/* ----- pcap-ng ----- */

/// Append one pcap-ng block with a well-formed envelope.
pub fn ng_block<B: ByteOrder>(out: &mut Vec<u8>, block_type: u32, body: &[u8]) {
    let pad = (4 - body.len() % 4) % 4;
    let total = (body.len() + pad + 12) as u32;
    out.write_u32::<B>(block_type).unwrap();
    out.write_u32::<B>(total).unwrap();
    out.extend_from_slice(body);
    out.extend_from_slice(&[0_u8; 3][..pad]);
    out.write_u32::<B>(total).unwrap();
}

/// Append a Section Header block (format version 1.0).
pub fn ng_section<B: ByteOrder>(out: &mut Vec<u8>) {
    let mut body = Vec::new();
    body.write_u32::<B>(0x1A2B3C4D).unwrap(); // byte-order magic
    body.write_u16::<B>(1).unwrap();
    body.write_u16::<B>(0).unwrap();
    body.write_i64::<B>(-1).unwrap(); // section length, unspecified
    ng_block::<B>(out, SECTION_HEADER_BLOCK, &body);
}

/// Append an Interface Description block with raw option bytes.
pub fn ng_interface<B: ByteOrder>(out: &mut Vec<u8>, link_type: u16, options: &[u8]) {
    let mut body = Vec::new();
    body.write_u16::<B>(link_type).unwrap();
    body.write_u16::<B>(0).unwrap(); // reserved
    body.write_u32::<B>(65535).unwrap(); // snap length
    body.extend_from_slice(options);
    ng_block::<B>(out, INTERFACE_DESCRIPTION_BLOCK, &body);
}

/// One option (tag, length, value padded to 4 bytes), for [`ng_interface`].
pub fn ng_option<B: ByteOrder>(options: &mut Vec<u8>, tag: u16, value: &[u8]) {
    options.write_u16::<B>(tag).unwrap();
    options.write_u16::<B>(value.len() as u16).unwrap();
    options.extend_from_slice(value);
    options.extend_from_slice(&[0_u8; 3][..(4 - value.len() % 4) % 4]);
}

/// Append an Enhanced Packet block.
pub fn ng_enhanced_packet<B: ByteOrder>(
    out: &mut Vec<u8>,
    if_index: u32,
    ticks: u64,
    orig_len: u32,
    data: &[u8],
) {
    let mut body = Vec::new();
    body.write_u32::<B>(if_index).unwrap();
    body.write_u32::<B>((ticks >> 32) as u32).unwrap();
    body.write_u32::<B>(ticks as u32).unwrap();
    body.write_u32::<B>(data.len() as u32).unwrap();
    body.write_u32::<B>(orig_len).unwrap();
    body.extend_from_slice(data);
    ng_block::<B>(out, ENHANCED_PACKET_BLOCK, &body);
}

/// Append a Simple Packet block.
pub fn ng_simple_packet<B: ByteOrder>(out: &mut Vec<u8>, orig_len: u32, data: &[u8]) {
    let mut body = Vec::new();
    body.write_u32::<B>(orig_len).unwrap();
    body.extend_from_slice(data);
    ng_block::<B>(out, SIMPLE_PACKET_BLOCK, &body);
}

/* ----- frames ----- */

/// An Ethernet II frame with zeroed MAC addresses.
pub fn ethernet(ether_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0_u8; 12];
    frame.extend_from_slice(&ether_type.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// A 4-byte 802.1Q tag followed by the given payload.
pub fn vlan(id: u16, next_ether_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&next_ether_type.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// An IPv4 datagram with an 8-byte transport header (UDP layout).
pub fn ipv4(protocol: u8, src: [u8; 4], src_port: u16, dst: [u8; 4], dst_port: u16) -> Vec<u8> {
    let payload = b"payload!";
    let mut data = vec![0_u8; 20];
    data[0] = 0x45;
    byteorder::BigEndian::write_u16(&mut data[2..4], (28 + payload.len()) as u16);
    data[8] = 64; // TTL
    data[9] = protocol;
    data[12..16].copy_from_slice(&src);
    data[16..20].copy_from_slice(&dst);
    data.extend_from_slice(&src_port.to_be_bytes());
    data.extend_from_slice(&dst_port.to_be_bytes());
    data.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    data.extend_from_slice(&[0, 0]); // checksum
    data.extend_from_slice(payload);
    data
}
