//! Accessors and representations for the co-processor command frames.
//!
//! Every exchange with the network co-processor is a small packed frame in
//! the co-processor's native byte order (little endian). Each frame kind
//! gets the same two-level treatment: an unsized byte wrapper with field
//! accessors that never reinterprets more than it checked, and a `Repr`
//! struct holding the parsed high-level view with `parse`/`emit` to convert
//! between the two. The wrappers do no validation beyond length, the
//! `Repr`s reject frames that are self-contradictory.
use core::fmt;

mod close;
mod create;
pub mod ip;
mod data;
mod select;

pub use self::close::{close_request, close_response, CloseRepr, CloseResponseRepr};
pub use self::create::{
    accept_request, create_request, create_response, established,
    AcceptRepr, CreateRepr, CreateResponseRepr, EstablishedRepr,
    Features, SocketKind, TlsBitmap, MAX_EXTENSION_DATA,
};
pub use self::data::{
    ack_event, read_request, recv_response, send_request,
    AckRepr, ReadRepr, RecvRepr, SendRepr,
    STREAM_DATA_OFFSET, DATAGRAM_DATA_OFFSET,
};
pub use self::ip::{Address, Endpoint, Version};
pub use self::select::{select_request, select_response, SelectRepr, SelectResponseRepr};

pub(crate) mod field {
    pub type Field = ::core::ops::Range<usize>;
    pub type Rest = ::core::ops::RangeFrom<usize>;
}

enum_with_unknown! {
    /// Command and event identifiers understood by the co-processor.
    ///
    /// Requests and their responses share an identifier; the purely
    /// asynchronous events have their own.
    pub doc enum Opcode(u8) {
        /// Create a socket session, also used for connect and listen.
        Create = 0x42,
        /// Close one session by id or every session on a port.
        Close = 0x43,
        /// Request buffered received data.
        ReadData = 0x6b,
        /// Take one pending connection off a listening session.
        Accept = 0x6c,
        /// Readiness query over session id bitmaps.
        Select = 0x74,
        /// A listening session produced a connection (event).
        Established = 0x61,
        /// The remote side closed a session (event).
        RemoteTerminate = 0x62,
        /// The co-processor acknowledged sent stream data (event).
        TcpAck = 0xab,
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Opcode::Create => write!(f, "create"),
            Opcode::Close => write!(f, "close"),
            Opcode::ReadData => write!(f, "read-data"),
            Opcode::Accept => write!(f, "accept"),
            Opcode::Select => write!(f, "select"),
            Opcode::Established => write!(f, "established"),
            Opcode::RemoteTerminate => write!(f, "remote-terminate"),
            Opcode::TcpAck => write!(f, "tcp-ack"),
            Opcode::Unknown(id) => write!(f, "unknown (0x{:02x})", id),
        }
    }
}

/// The error type for frame parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An incoming frame could not be parsed because it was shorter than assumed.
    ///
    /// The frame may be shorter than the fixed layout of its kind, or its embedded payload
    /// offset and length may point outside the received data.
    Truncated,

    /// An incoming frame could not be recognized and was dropped.
    ///
    /// E.g. an event frame with an identifier this implementation does not know. Not fatal as
    /// newer co-processor firmware may emit events older hosts are expected to ignore.
    Unrecognized,

    /// An incoming frame was recognized but was self-contradictory.
    ///
    /// Examples: a create response whose address family field is neither 4 nor 6; a close
    /// request naming both a session id and a port.
    Malformed,

    /// Parsing depends on information derived from a non-implemented feature.
    ///
    /// In contrast to `Unrecognized` we know that our implementation is incomplete.
    Unsupported,

    #[doc(hidden)]
    __Nonexhaustive(Private),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[doc(hidden)]
pub struct Private { private: () }

/// The result type for frame parsing.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated    => write!(f, "truncated frame"),
            Error::Unrecognized => write!(f, "unrecognized frame"),
            Error::Malformed    => write!(f, "malformed frame"),
            Error::Unsupported  => write!(f, "unsupported frame"),
            Error::__Nonexhaustive(_) => unreachable!(),
        }
    }
}
