//! Read a capture with packet filtering.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use log::info;

use crate::common::TimestampMicros;
use crate::decap::VlanIdStack;
use crate::errors::PcapResult;
use crate::ip::{IPPROTO_TCP, IPPROTO_UDP};
use crate::reader::{CaptureReader, CapturedDatagram, Status};

/// Socket-address pattern whose unspecified components match anything.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EndpointPattern {
    /// Address to match; `None` matches every address.
    pub addr: Option<IpAddr>,
    /// Port to match; `None` matches every port.
    pub port: Option<u16>,
}

impl EndpointPattern {
    /// The pattern matching every endpoint.
    pub const ANY: EndpointPattern = EndpointPattern { addr: None, port: None };

    /// Check a concrete socket address against the pattern.
    pub fn matches(&self, addr: &SocketAddr) -> bool {
        self.addr.is_none_or(|a| a == addr.ip()) && self.port.is_none_or(|p| p == addr.port())
    }

    fn is_set(&self, with_port: bool) -> bool {
        self.addr.is_some() && (!with_port || self.port.is_some())
    }
}

impl From<SocketAddr> for EndpointPattern {
    fn from(addr: SocketAddr) -> Self {
        EndpointPattern {
            addr: Some(addr.ip()),
            port: Some(addr.port()),
        }
    }
}

impl From<IpAddr> for EndpointPattern {
    fn from(addr: IpAddr) -> Self {
        EndpointPattern {
            addr: Some(addr),
            port: None,
        }
    }
}

impl fmt::Display for EndpointPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr {
            Some(addr) => write!(f, "{addr}")?,
            None => write!(f, "*")?,
        }
        match self.port {
            Some(port) => write!(f, ":{port}"),
            None => write!(f, ":*"),
        }
    }
}

/// Reads a capture like [`CaptureReader`] and keeps only the datagrams that
/// match the configured filters.
///
/// Filters select by packet number, timestamp, time offset from the first
/// packet, protocol, nested VLAN ids and network session. The session can be
/// given explicitly (fully or partially) or, with
/// [`set_session_learning`](SessionFilter::set_session_learning), learned
/// from the first datagram that matches everything else.
///
/// The capture being chronological, a packet past an upper bound ends the
/// stream: [`read_next`](SessionFilter::read_next) returns `Ok(None)` exactly
/// as on a real end of stream.
#[derive(Debug)]
pub struct SessionFilter<R> {
    reader: CaptureReader<R>,

    // Configured filters; they survive close and reopen.
    first_packet: u64,
    last_packet: u64,
    first_timestamp: TimestampMicros,
    last_timestamp: TimestampMicros,
    first_time_offset: TimestampMicros,
    last_time_offset: TimestampMicros,
    protocols: HashSet<u8>,
    vlan_ids: Vec<u16>,
    source: EndpointPattern,
    destination: EndpointPattern,
    bidirectional: bool,
    learn_session: bool,

    // Live session patterns, possibly fixed by learning; reset from the
    // configured patterns on open.
    live_source: EndpointPattern,
    live_destination: EndpointPattern,
}

impl<R: Read> SessionFilter<R> {
    /// Create a closed filter accepting everything.
    pub fn new() -> Self {
        SessionFilter {
            reader: CaptureReader::new(),
            first_packet: 0,
            last_packet: u64::MAX,
            first_timestamp: 0,
            last_timestamp: TimestampMicros::MAX,
            first_time_offset: 0,
            last_time_offset: TimestampMicros::MAX,
            protocols: HashSet::new(),
            vlan_ids: Vec::new(),
            source: EndpointPattern::ANY,
            destination: EndpointPattern::ANY,
            bidirectional: false,
            learn_session: false,
            live_source: EndpointPattern::ANY,
            live_destination: EndpointPattern::ANY,
        }
    }

    /// Attach a stream; see [`CaptureReader::open`].
    ///
    /// Any previously learned session is discarded; explicitly configured
    /// filters are kept.
    pub fn open(&mut self, source: R) -> PcapResult<()> {
        self.reader.open(source)?;
        self.live_source = self.source;
        self.live_destination = self.destination;
        Ok(())
    }

    /// Read the next datagram matching every configured filter.
    ///
    /// Returns `Ok(None)` at the end of the stream, or as soon as a packet
    /// exceeds an upper packet-number, timestamp or time-offset bound.
    pub fn read_next(&mut self) -> PcapResult<Option<CapturedDatagram>> {
        loop {
            let Some(captured) = self.reader.read_next()? else {
                return Ok(None);
            };

            // Upper bounds: the capture is sequential and chronological, no
            // later packet can match, so this is an ordinary end of stream.
            if self.reader.packet_count() > self.last_packet
                || captured.timestamp > self.last_timestamp
                || self.reader.time_offset(captured.timestamp) > self.last_time_offset
            {
                return Ok(None);
            }

            let datagram = &captured.datagram;
            if (!self.protocols.is_empty() && !self.protocols.contains(&datagram.protocol()))
                || self.reader.packet_count() < self.first_packet
                || captured.timestamp < self.first_timestamp
                || self.reader.time_offset(captured.timestamp) < self.first_time_offset
                || !vlans_match(&captured.vlans, &self.vlan_ids)
            {
                continue;
            }

            // Check that the datagram belongs to the filtered session. With
            // learning enabled, the first datagram matching a not fully
            // specified session fixes it for the rest of the capture.
            let src = datagram.source();
            let dst = datagram.destination();
            let learn = self.learn_session && !self.address_filter_is_set();

            if self.live_source.matches(&src) && self.live_destination.matches(&dst) {
                if learn {
                    self.live_source = src.into();
                    self.live_destination = dst.into();
                    self.log_selected_session();
                }
            } else if self.bidirectional
                && self.live_source.matches(&dst)
                && self.live_destination.matches(&src)
            {
                if learn {
                    self.live_source = dst.into();
                    self.live_destination = src.into();
                    self.log_selected_session();
                }
            } else {
                continue;
            }

            return Ok(Some(captured));
        }
    }

    /// Close the underlying reader. Idempotent.
    pub fn close(&mut self) {
        self.reader.close();
    }

    /// Lifecycle state of the underlying reader.
    pub fn status(&self) -> Status {
        self.reader.status()
    }

    /// The underlying reader, for counters and capture properties.
    pub fn reader(&self) -> &CaptureReader<R> {
        &self.reader
    }

    /// Keep packets starting at the given number.
    ///
    /// Packets are counted from the beginning of the capture, starting at 1,
    /// exactly as in the leftmost Wireshark column.
    pub fn set_first_packet(&mut self, count: u64) {
        self.first_packet = count;
    }

    /// Keep packets up to the given number; see
    /// [`set_first_packet`](SessionFilter::set_first_packet).
    pub fn set_last_packet(&mut self, count: u64) {
        self.last_packet = count;
    }

    /// Keep packets captured at or after the given timestamp, in
    /// microseconds since the Unix epoch.
    pub fn set_first_timestamp(&mut self, timestamp: TimestampMicros) {
        self.first_timestamp = timestamp;
    }

    /// Keep packets captured at or before the given timestamp, in
    /// microseconds since the Unix epoch.
    pub fn set_last_timestamp(&mut self, timestamp: TimestampMicros) {
        self.last_timestamp = timestamp;
    }

    /// Keep packets starting at the given offset from the first packet of
    /// the capture, in microseconds.
    pub fn set_first_time_offset(&mut self, offset: TimestampMicros) {
        self.first_time_offset = offset;
    }

    /// Keep packets up to the given offset from the first packet of the
    /// capture, in microseconds.
    pub fn set_last_time_offset(&mut self, offset: TimestampMicros) {
        self.last_time_offset = offset;
    }

    /// Keep TCP datagrams only.
    pub fn filter_tcp(&mut self) {
        self.protocols.clear();
        self.protocols.insert(IPPROTO_TCP);
    }

    /// Keep UDP datagrams only.
    pub fn filter_udp(&mut self) {
        self.protocols.clear();
        self.protocols.insert(IPPROTO_UDP);
    }

    /// Keep datagrams carrying one of the given protocols. An empty set
    /// keeps everything.
    pub fn set_protocol_filter(&mut self, protocols: impl IntoIterator<Item = u8>) {
        self.protocols = protocols.into_iter().collect();
    }

    /// Accept every protocol again.
    pub fn clear_protocol_filter(&mut self) {
        self.protocols.clear();
    }

    /// Keep packets encapsulated in the given nested VLAN ids, outermost
    /// first. Deeper nesting than the configured sequence is accepted; an
    /// empty sequence accepts everything.
    pub fn set_vlan_filter(&mut self, ids: Vec<u16>) {
        self.vlan_ids = ids;
    }

    /// Set the session source to match. The port is meaningful only for TCP
    /// and UDP. Disables bidirectional matching.
    pub fn set_source(&mut self, source: impl Into<EndpointPattern>) {
        self.source = source.into();
        self.live_source = self.source;
        self.bidirectional = false;
    }

    /// Set the session destination to match. The port is meaningful only for
    /// TCP and UDP. Disables bidirectional matching.
    pub fn set_destination(&mut self, destination: impl Into<EndpointPattern>) {
        self.destination = destination.into();
        self.live_destination = self.destination;
        self.bidirectional = false;
    }

    /// Match the session in both directions: a datagram is kept when its
    /// addresses match the pair either way around.
    pub fn set_bidirectional(
        &mut self,
        addr1: impl Into<EndpointPattern>,
        addr2: impl Into<EndpointPattern>,
    ) {
        self.source = addr1.into();
        self.destination = addr2.into();
        self.live_source = self.source;
        self.live_destination = self.destination;
        self.bidirectional = true;
    }

    /// Learn the session from the first matching datagram.
    ///
    /// When enabled and the configured session is not fully specified, the
    /// first datagram matching all other filters fixes its own source and
    /// destination as the session; every later datagram is filtered against
    /// them. A fully specified session is never overwritten.
    pub fn set_session_learning(&mut self, learn: bool) {
        self.learn_session = learn;
    }

    /// The current source pattern: the configured one, or the learned one
    /// once a session has been fixed.
    pub fn source_filter(&self) -> EndpointPattern {
        self.live_source
    }

    /// The current destination pattern: the configured one, or the learned
    /// one once a session has been fixed.
    pub fn destination_filter(&self) -> EndpointPattern {
        self.live_destination
    }

    // True when both live patterns are complete: address, plus port when the
    // protocol filter admits a port-carrying protocol.
    fn address_filter_is_set(&self) -> bool {
        let with_port = self.protocols.is_empty()
            || self.protocols.contains(&IPPROTO_TCP)
            || self.protocols.contains(&IPPROTO_UDP);
        self.live_source.is_set(with_port) && self.live_destination.is_set(with_port)
    }

    fn log_selected_session(&self) {
        info!(
            "selected session {} {} {}",
            self.live_source,
            if self.bidirectional { "<->" } else { "->" },
            self.live_destination
        );
    }
}

impl<R: Read> Default for SessionFilter<R> {
    fn default() -> Self {
        SessionFilter::new()
    }
}

impl SessionFilter<BufReader<File>> {
    /// Open a capture file by path; see [`CaptureReader::open_path`].
    pub fn open_path<P: AsRef<Path>>(&mut self, path: P) -> PcapResult<()> {
        let file = File::open(path.as_ref()).map_err(crate::errors::PcapError::OpenFailed)?;
        self.open(BufReader::new(file))
    }
}

// The configured ids must match the packet's VLAN stack from the outermost
// tag inward; deeper nesting is unconstrained.
fn vlans_match(stack: &VlanIdStack, ids: &[u16]) -> bool {
    ids.len() <= stack.len() && ids.iter().zip(stack.iter()).all(|(id, tag)| *id == tag.id)
}
