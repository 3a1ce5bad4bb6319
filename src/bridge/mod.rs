//! The host-side socket logic.
//!
//! The state of every socket lives in an [`Endpoint`], backed by storage the
//! caller provided, while the co-processor owns the transport state proper.
//! Operations mutate the endpoint and talk through a [`Link`] handed in per
//! call; asynchronous completions come back through [`Endpoint::dispatch`]
//! which must be fed every event frame the link produces.
//!
//! Continuations are plain function pointers. That keeps the crate free of
//! allocation and matches the embedded callers this is written for, at the
//! price of callbacks reaching shared state only through statics or their
//! arguments.
//!
//! [`Link`]: ../link/trait.Link.html
//! [`Endpoint`]: struct.Endpoint.html
//! [`Endpoint::dispatch`]: struct.Endpoint.html#method.dispatch
use core::fmt;

use crate::link;
use crate::wire;
use crate::wire::ip::Endpoint as IpEndpoint;

mod endpoint;
mod event;
mod select;
mod socket;
mod table;
#[cfg(test)]
mod tests;

pub use self::endpoint::{CloseScope, Endpoint, SocketOption};
pub use self::select::FdSet;
pub use self::socket::{
    Config, DisconnectReason, ExtensionKind, Kind, Protocol, Socket, State, TlsExtensions,
};
pub use self::table::{Sockfd, Table};

/// The result type of socket operations.
pub type Result<T> = core::result::Result<T, Error>;

/// The error type of socket operations.
///
/// Validation failures are reported before anything reaches the link, so a
/// failed operation left no half-created session behind unless the variant
/// says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The address family is not one the co-processor serves.
    UnsupportedFamily,
    /// The socket kind is not one the co-processor serves.
    UnsupportedKind,
    /// The protocol contradicts the socket kind.
    IncompatibleProtocol,
    /// Every socket record is in use.
    Exhausted,
    /// The descriptor names no live socket.
    NotFound,
    /// The socket's state does not admit this operation.
    InvalidState,
    /// The socket already has a local binding.
    AlreadyBound,
    /// The socket already has a peer.
    AlreadyConnected,
    /// Another socket is bound to the requested port.
    AddressInUse,
    /// The address family of the argument is not the socket's.
    FamilyMismatch,
    /// The operation exists but this implementation does not offer it.
    NotSupported,
    /// An option value is out of its domain.
    BadOption,
    /// A fixed-capacity buffer cannot take the addition.
    InsufficientSpace,
    /// The payload exceeds what one send may carry on this socket.
    MessageTooLarge,
    /// The operation needs a peer and the socket has none.
    NotConnected,
    /// The command link failed.
    Link(link::Error),
    /// A frame could not be parsed.
    Frame(wire::Error),
    /// The session was torn down by the remote side while the operation
    /// was queued.
    Terminated,
}

impl From<link::Error> for Error {
    fn from(err: link::Error) -> Self {
        Error::Link(err)
    }
}

/// Can convert from a frame error.
///
/// This indicates a response or event frame that did not parse.
impl From<wire::Error> for Error {
    fn from(err: wire::Error) -> Self {
        Error::Frame(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnsupportedFamily => write!(f, "unsupported address family"),
            Error::UnsupportedKind => write!(f, "unsupported socket kind"),
            Error::IncompatibleProtocol => write!(f, "protocol incompatible with kind"),
            Error::Exhausted => write!(f, "socket table exhausted"),
            Error::NotFound => write!(f, "no such socket"),
            Error::InvalidState => write!(f, "operation invalid in this state"),
            Error::AlreadyBound => write!(f, "socket already bound"),
            Error::AlreadyConnected => write!(f, "socket already connected"),
            Error::AddressInUse => write!(f, "port already in use"),
            Error::FamilyMismatch => write!(f, "address of a foreign family"),
            Error::NotSupported => write!(f, "not supported"),
            Error::BadOption => write!(f, "option value out of range"),
            Error::InsufficientSpace => write!(f, "buffer capacity exceeded"),
            Error::MessageTooLarge => write!(f, "message exceeds segment limit"),
            Error::NotConnected => write!(f, "socket has no peer"),
            Error::Link(err) => write!(f, "link: {}", err),
            Error::Frame(err) => write!(f, "frame: {}", err),
            Error::Terminated => write!(f, "session terminated by peer"),
        }
    }
}

/// Continuation of an asynchronous accept.
///
/// Called once from the event context with the accepted socket, or the
/// failure, and the connecting peer.
pub type AcceptFn = fn(listener: Sockfd, result: Result<Sockfd>, peer: IpEndpoint);

/// Consumer of asynchronously received data.
///
/// The payload borrow ends with the call; the consumer copies out what it
/// wants to keep. The source is the unspecified endpoint when the frame did
/// not carry a recognizable one.
pub type RecvFn = fn(socket: Sockfd, data: &[u8], source: IpEndpoint);

/// Completion of an acknowledged send.
///
/// `Ok` carries the acknowledged byte count; `Err(Terminated)` reports a
/// send flushed because the session died first.
pub type SendDoneFn = fn(socket: Sockfd, result: Result<usize>);

/// Continuation of an asynchronous readiness query.
pub type SelectFn = fn(readable: FdSet, writable: FdSet, result: Result<usize>);

/// Observer of remote session teardown.
pub type TerminateFn = fn(socket: Sockfd, reason: DisconnectReason);
