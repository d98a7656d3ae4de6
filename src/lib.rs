//! Read pcap and pcapng captures and extract the IP datagrams they carry.
//!
//! Both capture formats created by Wireshark and tcpdump are supported, with
//! their endianness taken from the file content. The [`CaptureReader`] strips
//! BSD-loopback, Ethernet/VLAN and raw-IP encapsulation from each captured
//! frame and returns the IPv4/IPv6 datagrams found inside, with their capture
//! timestamps normalized to microseconds and the VLAN tags crossed on the way
//! in. The [`SessionFilter`] selects a subset of that stream by packet
//! number, timestamp, protocol, VLAN tag or network session.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pcap_extract::SessionFilter;
//!
//! let mut filter = SessionFilter::new();
//! filter.filter_udp();
//! filter.set_session_learning(true);
//! filter.open_path("test.pcapng").unwrap();
//!
//! // Every datagram of the UDP session started by the first UDP packet.
//! while let Some(captured) = filter.read_next().unwrap() {
//!     let datagram = &captured.datagram;
//!     println!(
//!         "{} -> {} ({} bytes)",
//!         datagram.source(),
//!         datagram.destination(),
//!         datagram.len()
//!     );
//! }
//! ```

mod block;
mod byte_reader;
mod common;
mod decap;
mod errors;
mod filter;
mod interface;
mod ip;
mod linktype;
mod reader;

pub use common::{Endianness, TimestampMicros, TIMESTAMP_UNKNOWN};
pub use decap::{VlanIdStack, VlanTag};
pub use errors::{PcapError, PcapResult};
pub use filter::{EndpointPattern, SessionFilter};
pub use interface::InterfaceDescriptor;
pub use ip::{IpDatagram, IPPROTO_TCP, IPPROTO_UDP};
pub use linktype::DataLink;
pub use reader::{CaptureReader, CapturedDatagram, Status};
