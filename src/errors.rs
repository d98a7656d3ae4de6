use thiserror::Error;

/* ----- enum PcapError ----- */

/// Errors that can occur while opening or reading a capture stream.
#[derive(Debug, Error)]
pub enum PcapError {
    /// `open` was called while a stream is already attached.
    #[error("capture already open")]
    AlreadyOpen,
    /// The operation needs an open capture.
    #[error("no capture open")]
    NotOpen,
    /// A previous structural or I/O error left the reader unusable.
    /// The reader must be closed and reopened before it can be used again.
    #[error("capture in error state, close and reopen to retry")]
    Errored,
    /// The backing stream could not be opened.
    #[error("cannot open capture")]
    OpenFailed(#[source] std::io::Error),
    /// An I/O error occurred while reading the stream.
    #[error("I/O error while reading the capture")]
    ReadFailed(#[source] std::io::Error),
    /// The stream ended in the middle of a structure.
    /// # Fields
    /// - 0: number of missing bytes
    #[error("unexpected end of capture: {0}B missing")]
    UnexpectedEof(usize),
    /// The file magic number is not a known pcap or pcap-ng value.
    #[error("unknown magic number: {0:#010X}")]
    BadMagicNumber(u32),
    /// The section header byte-order magic is not a known value.
    #[error("unknown byte-order magic: {0:#010X}")]
    BadByteOrderMagic(u32),
    /// A pcap-ng block declares an impossible total length.
    #[error("invalid pcap-ng block length: {0}")]
    BadBlockLength(u32),
    /// The leading and trailing length fields of a pcap-ng block disagree.
    /// # Fields
    /// - 0: leading length
    /// - 1: trailing length
    #[error("inconsistent pcap-ng block length: leading {0}, trailing {1}")]
    BlockLengthMismatch(u32, u32),
    /// A section header body is shorter than its fixed fields.
    #[error("truncated section header: {0}B")]
    TruncatedSectionHeader(usize),
    /// An interface description body is shorter than its fixed fields.
    #[error("truncated interface description: {0}B")]
    TruncatedInterfaceDescription(usize),
    /// An option value runs past the end of its block.
    /// # Fields
    /// - 0: option tag
    /// - 1: declared value length
    #[error("corrupted option list: tag {0}, length {1}")]
    CorruptOptionList(u16, u16),
}

/// Result of a capture operation.
pub type PcapResult<T> = Result<T, PcapError>;
