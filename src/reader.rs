//! Capture reader: drives the pcap / pcap-ng state machine and extracts IP
//! datagrams.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, error, trace, warn};

use crate::block::{self, PacketRecord};
use crate::byte_reader::ByteOrderReader;
use crate::common::{
    Endianness, TimestampMicros, MICROS_PER_SEC, NANOS_PER_SEC, TIMESTAMP_UNKNOWN,
};
use crate::decap::{find_ip_datagram, VlanIdStack};
use crate::errors::{PcapError, PcapResult};
use crate::interface::{classic_timestamp, normalize_timestamp, InterfaceDescriptor};
use crate::ip::IpDatagram;
use crate::linktype::DataLink;

// Classic pcap magic numbers, as read in big-endian byte order. The pair of
// values per endianness selects microsecond or nanosecond sub-second ticks.
const PCAP_MAGIC_BE: u32 = 0xA1B2C3D4;
const PCAP_MAGIC_LE: u32 = 0xD4C3B2A1;
const PCAPNS_MAGIC_BE: u32 = 0xA1B23C4D;
const PCAPNS_MAGIC_LE: u32 = 0x4D3CB2A1;

/// Lifecycle state of a [`CaptureReader`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// No stream attached; [`CaptureReader::open`] may be called.
    Closed,
    /// A stream is attached and readable.
    Open,
    /// A structural or I/O error occurred. Every operation fails until the
    /// reader is closed and reopened; there is no partial recovery.
    Errored,
}

/// One extracted IP datagram with its capture metadata.
#[derive(Clone, Debug)]
pub struct CapturedDatagram {
    /// The validated IP datagram.
    pub datagram: IpDatagram,
    /// VLAN tags the datagram was encapsulated in, outermost first.
    pub vlans: VlanIdStack,
    /// Capture timestamp in microseconds since the Unix epoch, or
    /// [`TIMESTAMP_UNKNOWN`].
    pub timestamp: TimestampMicros,
}

/// Reads a pcap or pcap-ng capture stream and extracts IP datagrams.
///
/// This is the kind of file created by Wireshark. The reader strips the
/// link-layer and VLAN encapsulation of each captured frame and returns the
/// IPv4/IPv6 datagrams found inside; metadata blocks and frames of other
/// protocols are skipped.
///
/// Counters keep running across [`close`](CaptureReader::close) for
/// inspection and reset on [`open`](CaptureReader::open).
///
/// # Examples
///
/// ```rust,no_run
/// use pcap_extract::CaptureReader;
///
/// let mut reader = CaptureReader::new();
/// reader.open_path("test.pcap").unwrap();
///
/// while let Some(captured) = reader.read_next().unwrap() {
///     println!("{} -> {}", captured.datagram.source(), captured.datagram.destination());
/// }
/// ```
#[derive(Debug)]
pub struct CaptureReader<R> {
    stream: Option<ByteOrderReader<R>>,
    status: Status,
    at_end: bool,
    ng: bool,
    version: (u16, u16),
    interfaces: Vec<InterfaceDescriptor>,
    // Endianness and consumed-byte count of the last stream, kept readable
    // after close.
    endianness: Endianness,
    stream_bytes: u64,
    packet_count: u64,
    ip_packet_count: u64,
    captured_bytes: u64,
    ip_bytes: u64,
    first_timestamp: TimestampMicros,
    last_timestamp: TimestampMicros,
}

// Fields of one candidate captured frame, common to both formats.
struct Frame {
    body: Vec<u8>,
    if_index: usize,
    timestamp: TimestampMicros,
    cap_start: usize,
    cap_len: usize,
    orig_len: usize,
}

enum NgStep {
    Frame(Frame),
    Again,
    Eof,
}

impl<R: Read> CaptureReader<R> {
    /// Create a closed reader.
    pub fn new() -> Self {
        CaptureReader {
            stream: None,
            status: Status::Closed,
            at_end: false,
            ng: false,
            version: (0, 0),
            interfaces: Vec::new(),
            endianness: Endianness::Big,
            stream_bytes: 0,
            packet_count: 0,
            ip_packet_count: 0,
            captured_bytes: 0,
            ip_bytes: 0,
            first_timestamp: TIMESTAMP_UNKNOWN,
            last_timestamp: TIMESTAMP_UNKNOWN,
        }
    }

    /// Attach a stream and read the capture file header.
    ///
    /// Resets all counters. Fails if the reader is already open or if the
    /// stream does not start with a valid pcap or pcap-ng header; on failure
    /// the stream is released and the reader stays closed.
    pub fn open(&mut self, source: R) -> PcapResult<()> {
        if self.stream.is_some() {
            error!("capture already open");
            return Err(PcapError::AlreadyOpen);
        }

        self.status = Status::Closed;
        self.at_end = false;
        self.ng = false;
        self.version = (0, 0);
        self.interfaces.clear();
        self.endianness = Endianness::Big;
        self.stream_bytes = 0;
        self.packet_count = 0;
        self.ip_packet_count = 0;
        self.captured_bytes = 0;
        self.ip_bytes = 0;
        self.first_timestamp = TIMESTAMP_UNKNOWN;
        self.last_timestamp = TIMESTAMP_UNKNOWN;

        self.stream = Some(ByteOrderReader::new(source));
        match self.parse_file_header() {
            Ok(()) => {
                self.status = Status::Open;
                debug!(
                    "opened {} capture, format version {}.{}, {:?} endian",
                    if self.ng { "pcap-ng" } else { "pcap" },
                    self.version.0,
                    self.version.1,
                    self.endianness()
                );
                Ok(())
            }
            Err(e) => {
                error!("cannot open capture: {e}");
                self.close();
                Err(e)
            }
        }
    }

    /// Read the next IP datagram, skipping metadata blocks and frames of
    /// other protocols.
    ///
    /// Returns `Ok(None)` on a clean end of stream. Any structural or I/O
    /// failure is sticky: the reader enters [`Status::Errored`] and must be
    /// closed and reopened before further reads.
    pub fn read_next(&mut self) -> PcapResult<Option<CapturedDatagram>> {
        match self.status {
            Status::Closed => return Err(PcapError::NotOpen),
            Status::Errored => {
                debug!("capture reader already in error state");
                return Err(PcapError::Errored);
            }
            Status::Open => {}
        }

        match self.read_next_inner() {
            Ok(value) => Ok(value),
            Err(e) => {
                error!("capture stream error: {e}");
                self.status = Status::Errored;
                Err(e)
            }
        }
    }

    /// Release the stream. Idempotent; counters stay readable.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.stream_bytes = stream.bytes_read();
            self.endianness = stream.endianness();
        }
        self.status = Status::Closed;
    }

    /// Lifecycle state of the reader.
    pub fn status(&self) -> Status {
        self.status
    }

    /// True if the capture is in the pcap-ng format (not classic pcap).
    pub fn is_ng(&self) -> bool {
        self.ng
    }

    /// Integer byte order of the current section.
    pub fn endianness(&self) -> Endianness {
        self.stream
            .as_ref()
            .map_or(self.endianness, ByteOrderReader::endianness)
    }

    /// Format version (major, minor) of the current section.
    pub fn version(&self) -> (u16, u16) {
        self.version
    }

    /// Interface descriptors of the current section, in declaration order.
    pub fn interfaces(&self) -> &[InterfaceDescriptor] {
        &self.interfaces
    }

    /// Number of captured packets seen so far, IP or not.
    ///
    /// This is the number of the last returned packet, as shown in the
    /// leftmost column of the Wireshark interface.
    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    /// Number of valid IP datagrams extracted so far.
    pub fn ip_packet_count(&self) -> u64 {
        self.ip_packet_count
    }

    /// Total size of captured packets so far, link-layer headers included.
    pub fn captured_bytes(&self) -> u64 {
        self.captured_bytes
    }

    /// Total size of extracted IP datagrams so far, IP headers included.
    pub fn ip_bytes(&self) -> u64 {
        self.ip_bytes
    }

    /// Total number of bytes consumed from the stream so far.
    pub fn stream_bytes(&self) -> u64 {
        self.stream
            .as_ref()
            .map_or(self.stream_bytes, ByteOrderReader::bytes_read)
    }

    /// Timestamp of the first packet of the capture, or [`TIMESTAMP_UNKNOWN`].
    pub fn first_timestamp(&self) -> TimestampMicros {
        self.first_timestamp
    }

    /// Timestamp of the last packet read so far, or [`TIMESTAMP_UNKNOWN`].
    pub fn last_timestamp(&self) -> TimestampMicros {
        self.last_timestamp
    }

    /// Offset of a packet timestamp from the beginning of the capture, in
    /// microseconds. Zero when either timestamp is unknown.
    pub fn time_offset(&self, timestamp: TimestampMicros) -> TimestampMicros {
        if timestamp < 0 || self.first_timestamp < 0 {
            0
        } else {
            timestamp - self.first_timestamp
        }
    }

    // Read the magic number and dispatch on the format.
    fn parse_file_header(&mut self) -> PcapResult<()> {
        let stream = self.stream.as_mut().ok_or(PcapError::NotOpen)?;
        let mut magic = [0_u8; 4];
        stream.read_exact(&mut magic)?;
        self.read_header(BigEndian::read_u32(&magic))
    }

    // Parse a file or section header, starting from a magic number which was
    // read as big endian. Re-fixes endianness, version and interface table.
    fn read_header(&mut self, magic: u32) -> PcapResult<()> {
        match magic {
            PCAP_MAGIC_BE | PCAP_MAGIC_LE | PCAPNS_MAGIC_BE | PCAPNS_MAGIC_LE => {
                let stream = self.stream.as_mut().ok_or(PcapError::NotOpen)?;
                stream.set_endianness(if magic == PCAP_MAGIC_BE || magic == PCAPNS_MAGIC_BE {
                    Endianness::Big
                } else {
                    Endianness::Little
                });

                // 20 remaining header bytes: u16 major, u16 minor, 12 bytes
                // of unused fields, then the packed link-type word.
                let mut header = [0_u8; 20];
                stream.read_exact(&mut header)?;
                let endianness = stream.endianness();

                self.ng = false;
                self.version = (
                    endianness.decode_u16(&header[0..2]),
                    endianness.decode_u16(&header[2..4]),
                );

                // Link type in the low 16 bits of the packed word; the FCS
                // flag and length live in the raw byte at offset 16.
                let packed = endianness.decode_u32(&header[16..20]);
                let fcs_len = if header[16] & 0x10 != 0 {
                    2 * usize::from((header[16] >> 5) & 0x07)
                } else {
                    0
                };
                let ticks_per_second = if magic == PCAP_MAGIC_BE || magic == PCAP_MAGIC_LE {
                    MICROS_PER_SEC
                } else {
                    NANOS_PER_SEC
                };

                // Classic pcap files have exactly one interface.
                self.interfaces.clear();
                self.interfaces.push(InterfaceDescriptor {
                    link_type: DataLink::from((packed & 0xFFFF) as u16),
                    fcs_len,
                    ticks_per_second,
                    time_offset: 0,
                });
            }
            block::SECTION_HEADER_BLOCK => {
                self.ng = true;
                let stream = self.stream.as_mut().ok_or(PcapError::NotOpen)?;
                let body = block::read_block_body(stream, block::SECTION_HEADER_BLOCK)?;
                if body.len() < 16 {
                    return Err(PcapError::TruncatedSectionHeader(body.len()));
                }
                let endianness = stream.endianness();
                self.version = (
                    endianness.decode_u16(&body[4..6]),
                    endianness.decode_u16(&body[6..8]),
                );
                // Interfaces are declared by dedicated blocks in the section.
                self.interfaces.clear();
            }
            magic => return Err(PcapError::BadMagicNumber(magic)),
        }
        Ok(())
    }

    fn read_next_inner(&mut self) -> PcapResult<Option<CapturedDatagram>> {
        loop {
            if self.at_end {
                return Ok(None);
            }

            let frame = if self.ng {
                match self.read_ng_frame()? {
                    NgStep::Frame(frame) => Some(frame),
                    NgStep::Again => continue,
                    NgStep::Eof => None,
                }
            } else {
                self.read_classic_frame()?
            };

            let Some(frame) = frame else {
                self.at_end = true;
                return Ok(None);
            };

            self.packet_count += 1;
            self.captured_bytes += frame.cap_len as u64;

            if frame.orig_len > frame.cap_len {
                debug!(
                    "truncated captured packet ignored ({} bytes, captured {})",
                    frame.orig_len, frame.cap_len
                );
                continue;
            }

            // Out-of-range interface indices fall back to a default
            // descriptor; its packets simply decapsulate to nothing.
            let ifd = self
                .interfaces
                .get(frame.if_index)
                .cloned()
                .unwrap_or_default();

            if frame.timestamp >= 0 {
                if self.first_timestamp < 0 {
                    self.first_timestamp = frame.timestamp;
                }
                self.last_timestamp = frame.timestamp;
            }

            trace!(
                "data block: {} bytes, captured packet at offset {}, {} bytes (original: {}), link type {}",
                frame.body.len(),
                frame.cap_start,
                frame.cap_len,
                frame.orig_len,
                ifd.link_type
            );

            let data = &frame.body[frame.cap_start..frame.cap_start + frame.cap_len];
            let mut vlans = VlanIdStack::new();
            let Some(range) = find_ip_datagram(data, &ifd, self.endianness(), &mut vlans) else {
                continue;
            };

            match IpDatagram::new(&data[range]) {
                Some(datagram) => {
                    self.ip_packet_count += 1;
                    self.ip_bytes += datagram.len() as u64;
                    return Ok(Some(CapturedDatagram {
                        datagram,
                        vlans,
                        timestamp: frame.timestamp,
                    }));
                }
                None => {
                    warn!(
                        "invalid IP datagram in capture ({} bytes, original: {}, link type {})",
                        frame.cap_len, frame.orig_len, ifd.link_type
                    );
                    continue;
                }
            }
        }
    }

    // Read one pcap-ng block. Section headers and interface descriptions
    // update the reader state; metadata blocks are skipped opaquely.
    fn read_ng_frame(&mut self) -> PcapResult<NgStep> {
        let stream = self.stream.as_mut().ok_or(PcapError::NotOpen)?;

        let mut type_field = [0_u8; 4];
        if !stream.read_or_eof(&mut type_field)? {
            return Ok(NgStep::Eof);
        }
        let block_type = stream.endianness().decode_u32(&type_field);

        if block_type == block::SECTION_HEADER_BLOCK {
            // A new section restarts endianness, version and interfaces.
            self.read_header(block_type)?;
            return Ok(NgStep::Again);
        }

        let body = block::read_block_body(stream, block_type)?;
        let endianness = stream.endianness();

        match block_type {
            block::INTERFACE_DESCRIPTION_BLOCK => {
                let ifd = InterfaceDescriptor::from_block_body(endianness, &body)?;
                self.interfaces.push(ifd);
                Ok(NgStep::Again)
            }
            block::ENHANCED_PACKET_BLOCK | block::PACKET_BLOCK => {
                let obsolete = block_type == block::PACKET_BLOCK;
                match PacketRecord::from_enhanced(endianness, &body, obsolete) {
                    Some(record) => Ok(NgStep::Frame(self.ng_frame(body, record))),
                    None => Ok(NgStep::Again),
                }
            }
            block::SIMPLE_PACKET_BLOCK => match PacketRecord::from_simple(endianness, &body) {
                Some(record) => Ok(NgStep::Frame(self.ng_frame(body, record))),
                None => Ok(NgStep::Again),
            },
            other => {
                trace!("ignoring pcap-ng block type {other:#010X}");
                Ok(NgStep::Again)
            }
        }
    }

    fn ng_frame(&self, body: Vec<u8>, record: PacketRecord) -> Frame {
        let timestamp = match record.ts_ticks {
            Some(ticks) => self
                .interfaces
                .get(record.if_index)
                .map_or(TIMESTAMP_UNKNOWN, |ifd| normalize_timestamp(ifd, ticks)),
            None => TIMESTAMP_UNKNOWN,
        };

        Frame {
            body,
            if_index: record.if_index,
            timestamp,
            cap_start: record.cap_start,
            cap_len: record.cap_len,
            orig_len: record.orig_len,
        }
    }

    // Read one classic-pcap packet record: a fixed 16-byte header then the
    // captured bytes.
    fn read_classic_frame(&mut self) -> PcapResult<Option<Frame>> {
        let stream = self.stream.as_mut().ok_or(PcapError::NotOpen)?;

        let mut header = [0_u8; 16];
        if !stream.read_or_eof(&mut header)? {
            return Ok(None);
        }
        let endianness = stream.endianness();
        let seconds = endianness.decode_u32(&header[0..4]);
        let sub_ticks = endianness.decode_u32(&header[4..8]);
        let cap_len = endianness.decode_u32(&header[8..12]) as usize;
        let orig_len = endianness.decode_u32(&header[12..16]) as usize;

        let mut body = vec![0_u8; cap_len];
        stream.read_exact(&mut body)?;

        let timestamp = self.interfaces.first().map_or(TIMESTAMP_UNKNOWN, |ifd| {
            classic_timestamp(ifd, seconds, sub_ticks)
        });

        Ok(Some(Frame {
            body,
            if_index: 0,
            timestamp,
            cap_start: 0,
            cap_len,
            orig_len,
        }))
    }
}

impl<R: Read> Default for CaptureReader<R> {
    fn default() -> Self {
        CaptureReader::new()
    }
}

impl CaptureReader<BufReader<File>> {
    /// Open a capture file by path.
    pub fn open_path<P: AsRef<Path>>(&mut self, path: P) -> PcapResult<()> {
        let file = File::open(path.as_ref()).map_err(PcapError::OpenFailed)?;
        self.open(BufReader::new(file))
    }
}
