//! The per-socket record.
//!
//! One `Socket` mirrors one co-processor session, or the intent to create
//! one. Everything here is plain state; the operations that change it
//! against the link live in the endpoint module.
use crate::wire::ip::{Endpoint, Version};
use crate::wire::TlsBitmap;

use super::{AcceptFn, Error, RecvFn, Result, SendDoneFn, Sockfd};

/// Largest segment a v4 stream session carries.
pub const STREAM_MSS_V4: u16 = 1460;
/// Largest segment a v6 stream session carries.
pub const STREAM_MSS_V6: u16 = 1440;
/// Largest payload of a v4 datagram session.
pub const DATAGRAM_MSS_V4: u16 = 1472;
/// Largest payload of a v6 datagram session.
pub const DATAGRAM_MSS_V6: u16 = 1452;
/// Bytes a TLS record may add on a v4 session, reserved out of the segment.
pub const TLS_ALLOWANCE_V4: u16 = 90;
/// Bytes a TLS record may add on a v6 session, reserved out of the segment.
pub const TLS_ALLOWANCE_V6: u16 = 110;

/// Capacity of the per-socket TLS extension buffer.
pub const MAX_EXTENSION_BYTES: usize = crate::wire::MAX_EXTENSION_DATA;

/// The lifecycle state of a socket record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The record is free.
    Reset,
    /// Created by `open`, no binding and no session yet.
    Initialized,
    /// Has a local binding, no session yet.
    Bound,
    /// A listening stream session exists on the co-processor.
    Listen,
    /// An unconnected datagram session exists on the co-processor.
    UdpUnconnectedReady,
    /// A connected session exists on the co-processor.
    Connected,
    /// The session existed and was torn down by the remote side.
    Disconnected,
}

impl Default for State {
    fn default() -> Self {
        State::Reset
    }
}

/// The transport kind of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Connection-oriented byte stream.
    Stream,
    /// Datagrams.
    Datagram,
}

/// The transport protocol of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Let the kind pick.
    Unspecified,
    /// Explicitly TCP.
    Tcp,
    /// Explicitly UDP.
    Udp,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Unspecified
    }
}

/// Why a socket ended up disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectReason {
    /// Bytes the co-processor had taken but not yet sent when the remote
    /// side closed.
    pub unsent: u32,
}

/// The TLS extension kinds a create request can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    /// Server name indication.
    ServerName,
    /// Application layer protocol negotiation.
    Alpn,
}

impl ExtensionKind {
    fn to_wire(self) -> u16 {
        match self {
            ExtensionKind::ServerName => 1,
            ExtensionKind::Alpn => 2,
        }
    }
}

/// TLS extensions staged for the session create.
///
/// Appends are atomic: an insert that does not fit fails without changing
/// the buffer, so everything staged before stays valid for the create.
#[derive(Debug, Clone)]
pub struct TlsExtensions {
    data: [u8; MAX_EXTENSION_BYTES],
    len: u16,
    count: u16,
}

impl Default for TlsExtensions {
    fn default() -> Self {
        TlsExtensions {
            data: [0; MAX_EXTENSION_BYTES],
            len: 0,
            count: 0,
        }
    }
}

impl TlsExtensions {
    const HEADER: usize = 4;

    /// Append one extension as a type, length, value record.
    pub fn insert(&mut self, kind: ExtensionKind, value: &[u8]) -> Result<()> {
        let start = usize::from(self.len);
        let needed = Self::HEADER.checked_add(value.len()).ok_or(Error::InsufficientSpace)?;
        if MAX_EXTENSION_BYTES - start < needed {
            return Err(Error::InsufficientSpace);
        }
        let header = kind.to_wire().to_le_bytes();
        self.data[start..start + 2].copy_from_slice(&header);
        let length = (value.len() as u16).to_le_bytes();
        self.data[start + 2..start + 4].copy_from_slice(&length);
        self.data[start + 4..start + needed].copy_from_slice(value);
        self.len += needed as u16;
        self.count += 1;
        Ok(())
    }

    /// The staged records, back to back.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }

    /// How many records are staged.
    pub fn count(&self) -> u16 {
        self.count
    }
}

/// Host-side tuning applied at session create.
///
/// Every field maps onto one create request field. After the session exists
/// only `read_timeout` stays live, the rest would apply to a future session
/// of the same record.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Stream retransmission attempts before the session is declared dead.
    pub retry_count: u8,
    /// Keepalive initial timeout, seconds.
    pub keepalive: u16,
    /// Requested maximum segment size, `0` for the co-processor default.
    ///
    /// Carried in the create request; the value the response reports is
    /// what the session actually uses.
    pub mss: u16,
    /// Blocking read limit, milliseconds, `0` to wait without limit.
    pub read_timeout: u16,
    /// Which of the provisioned certificates a TLS session presents.
    pub certificate_index: u8,
    /// Virtual interface the session binds to.
    pub vap: u8,
    /// Type of service field for outgoing packets.
    pub tos: u8,
    /// Retransmission timeout base, a power of two below 32, `0` for the
    /// co-processor default.
    pub retransmission_timeout: u8,
    /// Receive window scaling factor, `0` for the default.
    pub rx_window: u8,
    /// TLS enablement and offered versions.
    pub tls: TlsBitmap,
    /// TLS cipher selection bitmap, `0` for the default set.
    pub ciphers: u32,
    /// Ask for enlarged co-processor buffers.
    pub high_performance: bool,
    /// Ask for an acknowledgement event per stream send.
    pub ack_indication: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            retry_count: 10,
            keepalive: 1200,
            mss: 0,
            read_timeout: 0,
            certificate_index: 0,
            vap: 0,
            tos: 0,
            retransmission_timeout: 0,
            rx_window: 0,
            tls: TlsBitmap::default(),
            ciphers: 0,
            high_performance: false,
            ack_indication: false,
        }
    }
}

/// An accept waiting for its established event.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingAccept {
    /// The pre-allocated record the connection will land in.
    pub(crate) client: Sockfd,
    /// The continuation to call exactly once.
    pub(crate) callback: AcceptFn,
}

/// The host-side record of one socket.
#[derive(Default)]
pub struct Socket {
    pub(crate) state: State,
    pub(crate) kind: Option<Kind>,
    pub(crate) protocol: Protocol,
    pub(crate) version: Option<Version>,
    pub(crate) local: Endpoint,
    pub(crate) remote: Endpoint,
    /// The co-processor's identifier, present while a session exists.
    pub(crate) id: Option<u16>,
    /// Negotiated segment size, `0` until the session reported one.
    pub(crate) mss: u16,
    pub(crate) backlog: u16,
    pub(crate) config: Config,
    pub(crate) extensions: TlsExtensions,
    pub(crate) recv_callback: Option<RecvFn>,
    pub(crate) send_done: Option<SendDoneFn>,
    pub(crate) accept_pending: Option<PendingAccept>,
    /// Receive events delivered but not yet consumed by the callback owner.
    pub(crate) queued: u8,
    pub(crate) queue_limit: u8,
    pub(crate) disconnect_reason: Option<DisconnectReason>,
}

impl core::fmt::Debug for Socket {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Socket")
            .field("state", &self.state)
            .field("kind", &self.kind)
            .field("local", &self.local)
            .field("remote", &self.remote)
            .field("id", &self.id)
            .finish()
    }
}

impl Socket {
    /// Default backlog of receive events held for a callback socket.
    pub(crate) const DEFAULT_QUEUE_LIMIT: u8 = 3;

    /// The lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The local endpoint, unspecified until bound.
    pub fn local(&self) -> Endpoint {
        self.local
    }

    /// The remote endpoint, unspecified until connected.
    pub fn remote(&self) -> Endpoint {
        self.remote
    }

    /// The co-processor's session identifier, while one exists.
    pub fn session_id(&self) -> Option<u16> {
        self.id
    }

    /// The reported maximum segment size, `0` before the session exists.
    pub fn mss(&self) -> u16 {
        self.mss
    }

    /// Why the socket is disconnected, in that state only.
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.disconnect_reason
    }

    /// Wipe the record back to `Reset`.
    pub(crate) fn reset(&mut self) {
        *self = Socket::default();
    }

    pub(crate) fn kind(&self) -> Kind {
        // Only called on records past `open`, which always sets it.
        self.kind.unwrap_or(Kind::Stream)
    }

    pub(crate) fn version(&self) -> Version {
        self.version.unwrap_or(Version::V4)
    }

    /// Whether a session exists on the co-processor for this record.
    pub(crate) fn has_session(&self) -> bool {
        self.id.is_some()
    }

    /// The segment size in force, negotiated or the family default.
    pub(crate) fn effective_mss(&self) -> u16 {
        if self.mss != 0 {
            return self.mss;
        }
        match (self.kind(), self.version()) {
            (Kind::Stream, Version::V4) => STREAM_MSS_V4,
            (Kind::Stream, Version::V6) => STREAM_MSS_V6,
            (Kind::Datagram, Version::V4) => DATAGRAM_MSS_V4,
            (Kind::Datagram, Version::V6) => DATAGRAM_MSS_V6,
        }
    }

    /// The most payload one send may carry.
    ///
    /// TLS records grow in flight, so a TLS session reserves the allowance
    /// out of the segment.
    pub(crate) fn send_limit(&self) -> usize {
        let mss = self.effective_mss();
        if self.config.tls.is_enabled() {
            let allowance = match self.version() {
                Version::V4 => TLS_ALLOWANCE_V4,
                Version::V6 => TLS_ALLOWANCE_V6,
            };
            usize::from(mss.saturating_sub(allowance))
        } else {
            usize::from(mss)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_insert_is_atomic() {
        let mut ext = TlsExtensions::default();
        ext.insert(ExtensionKind::ServerName, b"device.example").unwrap();
        let staged = ext.as_bytes().len();
        assert_eq!(ext.count(), 1);

        let oversized = [0u8; MAX_EXTENSION_BYTES];
        assert_eq!(
            ext.insert(ExtensionKind::Alpn, &oversized),
            Err(Error::InsufficientSpace),
        );
        assert_eq!(ext.as_bytes().len(), staged);
        assert_eq!(ext.count(), 1);

        ext.insert(ExtensionKind::Alpn, b"h2").unwrap();
        assert_eq!(ext.count(), 2);
    }

    #[test]
    fn extension_wire_form() {
        let mut ext = TlsExtensions::default();
        ext.insert(ExtensionKind::ServerName, b"ab").unwrap();
        assert_eq!(ext.as_bytes(), &[1, 0, 2, 0, b'a', b'b']);
    }

    #[test]
    fn send_limit_reserves_tls_allowance() {
        let mut socket = Socket::default();
        socket.kind = Some(Kind::Stream);
        socket.version = Some(Version::V4);
        assert_eq!(socket.send_limit(), usize::from(STREAM_MSS_V4));

        socket.config.tls.insert(TlsBitmap::ENABLE);
        assert_eq!(
            socket.send_limit(),
            usize::from(STREAM_MSS_V4 - TLS_ALLOWANCE_V4),
        );

        socket.mss = 1000;
        assert_eq!(socket.send_limit(), usize::from(1000 - TLS_ALLOWANCE_V4));
    }
}
