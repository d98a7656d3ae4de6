use std::io::{ErrorKind, Read};

use crate::common::Endianness;
use crate::errors::{PcapError, PcapResult};

/// Exact-count blocking reads over a capture stream, plus integer decoding in
/// the endianness of the current file or section.
///
/// The endianness starts as big (the byte order in which magic numbers are
/// compared) and is re-fixed whenever a file header or pcap-ng section header
/// is parsed. It then applies to every integer until the next section.
#[derive(Debug)]
pub(crate) struct ByteOrderReader<R> {
    reader: R,
    endianness: Endianness,
    bytes_read: u64,
}

impl<R: Read> ByteOrderReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            endianness: Endianness::Big,
            bytes_read: 0,
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// Total number of bytes consumed from the stream so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Read exactly `buf.len()` bytes, blocking as needed.
    ///
    /// A stream ending before the buffer is full is an error.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> PcapResult<()> {
        if self.read_or_eof(buf)? {
            Ok(())
        } else {
            Err(PcapError::UnexpectedEof(buf.len()))
        }
    }

    /// Read exactly `buf.len()` bytes, reporting a clean end of stream.
    ///
    /// Returns `Ok(false)` if the stream was already exhausted before the
    /// first byte. A stream ending in the middle of the buffer is an error.
    pub fn read_or_eof(&mut self, buf: &mut [u8]) -> PcapResult<bool> {
        let mut pos = 0;
        while pos < buf.len() {
            let nb_read = match self.reader.read(&mut buf[pos..]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(PcapError::ReadFailed(e)),
            };
            if nb_read == 0 {
                if pos == 0 {
                    return Ok(false);
                }
                return Err(PcapError::UnexpectedEof(buf.len() - pos));
            }
            pos += nb_read;
            self.bytes_read += nb_read as u64;
        }
        Ok(true)
    }

    /// Read and decode a 32-bit integer in the current endianness.
    pub fn read_u32(&mut self) -> PcapResult<u32> {
        let mut buf = [0_u8; 4];
        self.read_exact(&mut buf)?;
        Ok(self.endianness.decode_u32(&buf))
    }
}
