//! The session create exchange and the listener established event.
//!
//! One create request covers four different session kinds. The bridge layer
//! picks the kind from the socket's mode of use: outgoing stream sessions
//! connect, listening ones carry a backlog, and datagram sessions come in a
//! locally-bound and a connected flavour.
use byteorder::{ByteOrder, LittleEndian};

use super::{Error, Result};
use super::ip::{Address, Endpoint};

/// Maximum bytes of TLS extension data carried in one create request.
pub const MAX_EXTENSION_DATA: usize = 256;

enum_with_unknown! {
    /// The session kind requested from the co-processor.
    pub doc enum SocketKind(u16) {
        /// An outgoing stream session; the create doubles as connect.
        TcpClient = 0,
        /// A connected datagram session.
        UdpClient = 1,
        /// A listening stream session accepting up to a backlog of peers.
        TcpServer = 2,
        /// A locally bound, unconnected datagram session.
        Ludp = 4,
    }
}

/// Per-session option bits of the create request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features(pub u8);

impl Features {
    /// Complete the create synchronously in the co-processor.
    pub const SYNCHRONOUS: Features = Features(1 << 0);
    /// The session will hand out accepted connections.
    pub const ACCEPT: Features = Features(1 << 1);
    /// Ask for an event acknowledging each stream send.
    pub const TCP_ACK_INDICATION: Features = Features(1 << 2);
    /// Honor the request's receive window size field.
    pub const RX_WINDOW: Features = Features(1 << 4);
    /// Honor the request's certificate index field.
    pub const CERT_INDEX: Features = Features(1 << 5);
    /// Dedicate larger co-processor buffers to this session.
    pub const HIGH_PERFORMANCE: Features = Features(1 << 7);

    /// Query a bit.
    pub fn contains(self, flag: Features) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Set a bit.
    pub fn insert(&mut self, flag: Features) {
        self.0 |= flag.0;
    }
}

/// The TLS enablement and version bits of the create request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TlsBitmap(pub u32);

impl TlsBitmap {
    /// Terminate TLS on the co-processor for this session.
    pub const ENABLE: TlsBitmap = TlsBitmap(1 << 0);
    /// Offer TLS 1.0.
    pub const V1_0: TlsBitmap = TlsBitmap(1 << 2);
    /// Offer TLS 1.2.
    pub const V1_2: TlsBitmap = TlsBitmap(1 << 3);
    /// Offer TLS 1.1.
    pub const V1_1: TlsBitmap = TlsBitmap(1 << 4);
    /// Offer TLS 1.3.
    pub const V1_3: TlsBitmap = TlsBitmap(1 << 8);

    /// Query whether TLS is enabled at all.
    pub fn is_enabled(self) -> bool {
        self.0 & TlsBitmap::ENABLE.0 != 0
    }

    /// Query a bit.
    pub fn contains(self, flag: TlsBitmap) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Set a bit.
    pub fn insert(&mut self, flag: TlsBitmap) {
        self.0 |= flag.0;
    }
}

byte_wrapper!(create_request);

mod field {
    #![allow(non_snake_case)]
    use crate::wire::field::Field;

    pub const IP_VERSION: Field = 0..2;
    pub const KIND: Field = 2..4;
    pub const LOCAL_PORT: Field = 4..6;
    pub const REMOTE_PORT: Field = 6..8;
    pub const REMOTE_ADDR: Field = 8..24;
    pub const BACKLOG: Field = 24..26;
    pub const TOS: Field = 26..28;
    pub const TLS_BITMAP: Field = 28..32;
    pub const RETRY_COUNT: usize = 32;
    pub const FEATURES: usize = 33;
    pub const RX_WINDOW: usize = 34;
    pub const KEEPALIVE: Field = 35..37;
    pub const VAP: usize = 37;
    pub const CERT_INDEX: usize = 38;
    pub const CIPHERS: Field = 39..43;
    pub const RETRANS_TIMEOUT: usize = 43;
    pub const MSS: Field = 44..46;
    pub const EXT_COUNT: Field = 46..48;
    pub const EXT_TOTAL: Field = 48..50;
    pub const EXT_DATA: Field = 50..306;

    pub const END: usize = EXT_DATA.end;
}

impl create_request {
    /// Fixed length of a create request frame.
    pub const LEN: usize = field::END;

    /// Interpret a byte slice as a frame, without bounds checking.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Interpret a mutable byte slice as a frame, without bounds checking.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Interpret a byte slice as a frame, checking its length.
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Interpret a mutable byte slice as a frame, checking its length.
    pub fn new_checked_mut(data: &mut [u8]) -> Result<&mut Self> {
        Self::new_checked(&data[..])?;
        Ok(Self::new_unchecked_mut(data))
    }

    /// Ensure that no accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < field::END {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the ip version field.
    pub fn ip_version(&self) -> u16 {
        LittleEndian::read_u16(&self.0[field::IP_VERSION])
    }

    /// Return the kind field.
    pub fn kind(&self) -> SocketKind {
        LittleEndian::read_u16(&self.0[field::KIND]).into()
    }

    /// Return the local port field.
    pub fn local_port(&self) -> u16 {
        LittleEndian::read_u16(&self.0[field::LOCAL_PORT])
    }

    /// Return the remote port field.
    pub fn remote_port(&self) -> u16 {
        LittleEndian::read_u16(&self.0[field::REMOTE_PORT])
    }

    /// Return the remote address, when the family field is recognized.
    pub fn remote_addr(&self) -> Result<Address> {
        let mut raw = [0; 16];
        raw.copy_from_slice(&self.0[field::REMOTE_ADDR]);
        Address::from_wire(self.ip_version(), &raw)
    }

    /// Return the backlog field.
    pub fn backlog(&self) -> u16 {
        LittleEndian::read_u16(&self.0[field::BACKLOG])
    }

    /// Return the features field.
    pub fn features(&self) -> Features {
        Features(self.0[field::FEATURES])
    }

    /// Return the tls bitmap field.
    pub fn tls_bitmap(&self) -> TlsBitmap {
        TlsBitmap(LittleEndian::read_u32(&self.0[field::TLS_BITMAP]))
    }

    /// Return the mss field.
    pub fn mss(&self) -> u16 {
        LittleEndian::read_u16(&self.0[field::MSS])
    }

    /// Return the extension count field.
    pub fn extension_count(&self) -> u16 {
        LittleEndian::read_u16(&self.0[field::EXT_COUNT])
    }

    /// Return the TLS extension bytes located by the total length field.
    pub fn extension_data(&self) -> &[u8] {
        let total = LittleEndian::read_u16(&self.0[field::EXT_TOTAL]) as usize;
        &self.0[field::EXT_DATA][..total.min(MAX_EXTENSION_DATA)]
    }

    /// Set the ip version field.
    pub fn set_ip_version(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[field::IP_VERSION], value)
    }

    /// Set the kind field.
    pub fn set_kind(&mut self, value: SocketKind) {
        LittleEndian::write_u16(&mut self.0[field::KIND], value.into())
    }

    /// Set the local port field.
    pub fn set_local_port(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[field::LOCAL_PORT], value)
    }

    /// Set the remote port field.
    pub fn set_remote_port(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[field::REMOTE_PORT], value)
    }

    /// Set the remote address field.
    pub fn set_remote_addr(&mut self, value: Address) {
        value.emit(&mut self.0[field::REMOTE_ADDR])
    }

    /// Set the backlog field.
    pub fn set_backlog(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[field::BACKLOG], value)
    }

    /// Set the tos field.
    pub fn set_tos(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[field::TOS], value)
    }

    /// Set the tls bitmap field.
    pub fn set_tls_bitmap(&mut self, value: TlsBitmap) {
        LittleEndian::write_u32(&mut self.0[field::TLS_BITMAP], value.0)
    }

    /// Set the retry count field.
    pub fn set_retry_count(&mut self, value: u8) {
        self.0[field::RETRY_COUNT] = value;
    }

    /// Set the features field.
    pub fn set_features(&mut self, value: Features) {
        self.0[field::FEATURES] = value.0;
    }

    /// Set the rx window field.
    pub fn set_rx_window(&mut self, value: u8) {
        self.0[field::RX_WINDOW] = value;
    }

    /// Set the keepalive field.
    pub fn set_keepalive(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[field::KEEPALIVE], value)
    }

    /// Set the vap field.
    pub fn set_vap(&mut self, value: u8) {
        self.0[field::VAP] = value;
    }

    /// Set the cert index field.
    pub fn set_cert_index(&mut self, value: u8) {
        self.0[field::CERT_INDEX] = value;
    }

    /// Set the ciphers field.
    pub fn set_ciphers(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[field::CIPHERS], value)
    }

    /// Set the retransmission timeout field.
    pub fn set_retransmission_timeout(&mut self, value: u8) {
        self.0[field::RETRANS_TIMEOUT] = value;
    }

    /// Set the mss field.
    pub fn set_mss(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[field::MSS], value)
    }

    /// Set the TLS extension count, total length and data fields.
    pub fn set_extensions(&mut self, count: u16, data: &[u8]) {
        debug_assert!(data.len() <= MAX_EXTENSION_DATA);
        LittleEndian::write_u16(&mut self.0[field::EXT_COUNT], count);
        LittleEndian::write_u16(&mut self.0[field::EXT_TOTAL], data.len() as u16);
        self.0[field::EXT_DATA][..data.len()].copy_from_slice(data);
    }
}

/// A high-level representation of a create request.
///
/// Options that only tune the co-processor (ciphers, keepalive, ...) are
/// emitted by the bridge layer directly from its socket record; the repr
/// carries what identifies the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateRepr {
    /// The kind of session to create.
    pub kind: SocketKind,
    /// The local half of the session. The address is implied by the
    /// co-processor's own configuration, only the port is carried.
    pub local_port: u16,
    /// The remote endpoint, unspecified except for connecting kinds.
    pub remote: Endpoint,
    /// The address family of the session.
    pub version: super::Version,
    /// Pending connection limit, listening kind only.
    pub backlog: u16,
    /// Option bits.
    pub features: Features,
    /// TLS enablement and versions.
    pub tls: TlsBitmap,
    /// Requested maximum segment size, `0` to let the co-processor pick.
    pub mss: u16,
}

impl CreateRepr {
    /// Parse a create request frame.
    pub fn parse(frame: &create_request) -> Result<CreateRepr> {
        frame.check_len()?;
        let version = super::Version::from_wire(frame.ip_version())?;
        Ok(CreateRepr {
            kind: frame.kind(),
            local_port: frame.local_port(),
            remote: Endpoint::new(frame.remote_addr()?, frame.remote_port()),
            version,
            backlog: frame.backlog(),
            features: frame.features(),
            tls: frame.tls_bitmap(),
            mss: frame.mss(),
        })
    }

    /// Emit the identifying fields into a frame.
    ///
    /// The remaining option fields keep whatever the caller put there,
    /// zeroes for a fresh buffer.
    pub fn emit(&self, frame: &mut create_request) {
        frame.set_ip_version(self.version.to_wire());
        frame.set_kind(self.kind);
        frame.set_local_port(self.local_port);
        frame.set_remote_port(self.remote.port);
        frame.set_remote_addr(self.remote.addr);
        frame.set_backlog(self.backlog);
        frame.set_features(self.features);
        frame.set_tls_bitmap(self.tls);
        frame.set_mss(self.mss);
    }
}

byte_wrapper!(create_response);

mod rsp_field {
    use crate::wire::field::Field;

    pub const IP_VERSION: Field = 0..2;
    pub const KIND: Field = 2..4;
    pub const ID: Field = 4..6;
    pub const LOCAL_PORT: Field = 6..8;
    pub const REMOTE_PORT: Field = 8..10;
    pub const LOCAL_ADDR: Field = 10..26;
    pub const REMOTE_ADDR: Field = 26..42;
    pub const MSS: Field = 42..44;
    pub const WINDOW: Field = 44..48;

    pub const END: usize = WINDOW.end;
}

impl create_response {
    /// Fixed length of a create response frame.
    pub const LEN: usize = rsp_field::END;

    /// Interpret a byte slice as a frame, without bounds checking.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Interpret a mutable byte slice as a frame, without bounds checking.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Interpret a byte slice as a frame, checking its length.
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Ensure that no accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < rsp_field::END {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the ip version field.
    pub fn ip_version(&self) -> u16 {
        LittleEndian::read_u16(&self.0[rsp_field::IP_VERSION])
    }

    /// Return the kind field.
    pub fn kind(&self) -> SocketKind {
        LittleEndian::read_u16(&self.0[rsp_field::KIND]).into()
    }

    /// Return the id field.
    pub fn id(&self) -> u16 {
        LittleEndian::read_u16(&self.0[rsp_field::ID])
    }

    /// Return the local port field.
    pub fn local_port(&self) -> u16 {
        LittleEndian::read_u16(&self.0[rsp_field::LOCAL_PORT])
    }

    /// Return the remote port field.
    pub fn remote_port(&self) -> u16 {
        LittleEndian::read_u16(&self.0[rsp_field::REMOTE_PORT])
    }

    /// Return the local address, when the family field is recognized.
    pub fn local_addr(&self) -> Result<Address> {
        let mut raw = [0; 16];
        raw.copy_from_slice(&self.0[rsp_field::LOCAL_ADDR]);
        Address::from_wire(self.ip_version(), &raw)
    }

    /// Return the remote address, when the family field is recognized.
    pub fn remote_addr(&self) -> Result<Address> {
        let mut raw = [0; 16];
        raw.copy_from_slice(&self.0[rsp_field::REMOTE_ADDR]);
        Address::from_wire(self.ip_version(), &raw)
    }

    /// Return the mss field.
    pub fn mss(&self) -> u16 {
        LittleEndian::read_u16(&self.0[rsp_field::MSS])
    }

    /// Return the window field.
    pub fn window(&self) -> u32 {
        LittleEndian::read_u32(&self.0[rsp_field::WINDOW])
    }

    /// Set the ip version field.
    pub fn set_ip_version(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[rsp_field::IP_VERSION], value)
    }

    /// Set the kind field.
    pub fn set_kind(&mut self, value: SocketKind) {
        LittleEndian::write_u16(&mut self.0[rsp_field::KIND], value.into())
    }

    /// Set the id field.
    pub fn set_id(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[rsp_field::ID], value)
    }

    /// Set the local port field.
    pub fn set_local_port(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[rsp_field::LOCAL_PORT], value)
    }

    /// Set the remote port field.
    pub fn set_remote_port(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[rsp_field::REMOTE_PORT], value)
    }

    /// Set the local address field.
    pub fn set_local_addr(&mut self, value: Address) {
        value.emit(&mut self.0[rsp_field::LOCAL_ADDR])
    }

    /// Set the remote address field.
    pub fn set_remote_addr(&mut self, value: Address) {
        value.emit(&mut self.0[rsp_field::REMOTE_ADDR])
    }

    /// Set the mss field.
    pub fn set_mss(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[rsp_field::MSS], value)
    }

    /// Set the window field.
    pub fn set_window(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[rsp_field::WINDOW], value)
    }
}

/// A high-level representation of a create response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateResponseRepr {
    /// The kind of session the co-processor created.
    pub kind: SocketKind,
    /// The co-processor's identifier for the session.
    pub id: u16,
    /// The local endpoint, with the co-processor's own address and the
    /// actually assigned port.
    pub local: Endpoint,
    /// The remote endpoint as the co-processor sees it.
    pub remote: Endpoint,
    /// The negotiated maximum segment size.
    pub mss: u16,
    /// The remote peer's window size.
    pub window: u32,
}

impl CreateResponseRepr {
    /// Parse a create response frame.
    pub fn parse(frame: &create_response) -> Result<CreateResponseRepr> {
        frame.check_len()?;
        Ok(CreateResponseRepr {
            kind: frame.kind(),
            id: frame.id(),
            local: Endpoint::new(frame.local_addr()?, frame.local_port()),
            remote: Endpoint::new(frame.remote_addr()?, frame.remote_port()),
            mss: frame.mss(),
            window: frame.window(),
        })
    }

    /// Emit into a frame.
    pub fn emit(&self, frame: &mut create_response) {
        let version = self.local.addr.version()
            .or_else(|| self.remote.addr.version())
            .unwrap_or(super::Version::V4);
        frame.set_ip_version(version.to_wire());
        frame.set_kind(self.kind);
        frame.set_id(self.id);
        frame.set_local_port(self.local.port);
        frame.set_remote_port(self.remote.port);
        frame.set_local_addr(self.local.addr);
        frame.set_remote_addr(self.remote.addr);
        frame.set_mss(self.mss);
        frame.set_window(self.window);
    }
}

byte_wrapper!(accept_request);

mod acc_field {
    use crate::wire::field::Field;

    pub const ID: usize = 0;
    pub const PORT: Field = 1..3;

    pub const END: usize = PORT.end;
}

impl accept_request {
    /// Fixed length of an accept request frame.
    pub const LEN: usize = acc_field::END;

    /// Interpret a byte slice as a frame, without bounds checking.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Interpret a mutable byte slice as a frame, without bounds checking.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Interpret a byte slice as a frame, checking its length.
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Ensure that no accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < acc_field::END {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the listening session id field.
    pub fn id(&self) -> u8 {
        self.0[acc_field::ID]
    }

    /// Return the listening port field.
    pub fn port(&self) -> u16 {
        LittleEndian::read_u16(&self.0[acc_field::PORT])
    }

    /// Set the listening session id field.
    pub fn set_id(&mut self, value: u8) {
        self.0[acc_field::ID] = value;
    }

    /// Set the listening port field.
    pub fn set_port(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[acc_field::PORT], value)
    }
}

/// A high-level representation of an accept request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptRepr {
    /// The listening session to take a connection from.
    pub id: u8,
    /// The port the listening session is bound to.
    pub port: u16,
}

impl AcceptRepr {
    /// Parse an accept request frame.
    pub fn parse(frame: &accept_request) -> Result<AcceptRepr> {
        frame.check_len()?;
        Ok(AcceptRepr {
            id: frame.id(),
            port: frame.port(),
        })
    }

    /// Emit into a frame.
    pub fn emit(&self, frame: &mut accept_request) {
        frame.set_id(self.id);
        frame.set_port(self.port);
    }
}

byte_wrapper!(established);

mod est_field {
    use crate::wire::field::Field;

    pub const IP_VERSION: Field = 0..2;
    pub const ID: Field = 2..4;
    pub const REMOTE_PORT: Field = 4..6;
    pub const REMOTE_ADDR: Field = 6..22;
    pub const MSS: Field = 22..24;
    pub const WINDOW: Field = 24..28;
    pub const LOCAL_PORT: Field = 28..30;

    pub const END: usize = LOCAL_PORT.end;
}

impl established {
    /// Fixed length of an established event frame.
    pub const LEN: usize = est_field::END;

    /// Interpret a byte slice as a frame, without bounds checking.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Interpret a mutable byte slice as a frame, without bounds checking.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Interpret a byte slice as a frame, checking its length.
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Ensure that no accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < est_field::END {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the ip version field.
    pub fn ip_version(&self) -> u16 {
        LittleEndian::read_u16(&self.0[est_field::IP_VERSION])
    }

    /// Return the id field.
    pub fn id(&self) -> u16 {
        LittleEndian::read_u16(&self.0[est_field::ID])
    }

    /// Return the remote port field.
    pub fn remote_port(&self) -> u16 {
        LittleEndian::read_u16(&self.0[est_field::REMOTE_PORT])
    }

    /// Return the remote address, when the family field is recognized.
    pub fn remote_addr(&self) -> Result<Address> {
        let mut raw = [0; 16];
        raw.copy_from_slice(&self.0[est_field::REMOTE_ADDR]);
        Address::from_wire(self.ip_version(), &raw)
    }

    /// Return the mss field.
    pub fn mss(&self) -> u16 {
        LittleEndian::read_u16(&self.0[est_field::MSS])
    }

    /// Return the window field.
    pub fn window(&self) -> u32 {
        LittleEndian::read_u32(&self.0[est_field::WINDOW])
    }

    /// Return the local port field.
    pub fn local_port(&self) -> u16 {
        LittleEndian::read_u16(&self.0[est_field::LOCAL_PORT])
    }

    /// Set the ip version field.
    pub fn set_ip_version(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[est_field::IP_VERSION], value)
    }

    /// Set the id field.
    pub fn set_id(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[est_field::ID], value)
    }

    /// Set the remote port field.
    pub fn set_remote_port(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[est_field::REMOTE_PORT], value)
    }

    /// Set the remote address field.
    pub fn set_remote_addr(&mut self, value: Address) {
        value.emit(&mut self.0[est_field::REMOTE_ADDR])
    }

    /// Set the mss field.
    pub fn set_mss(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[est_field::MSS], value)
    }

    /// Set the window field.
    pub fn set_window(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[est_field::WINDOW], value)
    }

    /// Set the local port field.
    pub fn set_local_port(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[est_field::LOCAL_PORT], value)
    }
}

/// A high-level representation of the connection established event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstablishedRepr {
    /// The identifier of the new session.
    pub id: u16,
    /// The local port the connection arrived on.
    pub local_port: u16,
    /// The connecting peer.
    pub remote: Endpoint,
    /// The negotiated maximum segment size.
    pub mss: u16,
    /// The peer's window size.
    pub window: u32,
}

impl EstablishedRepr {
    /// Parse an established event frame.
    pub fn parse(frame: &established) -> Result<EstablishedRepr> {
        frame.check_len()?;
        Ok(EstablishedRepr {
            id: frame.id(),
            local_port: frame.local_port(),
            remote: Endpoint::new(frame.remote_addr()?, frame.remote_port()),
            mss: frame.mss(),
            window: frame.window(),
        })
    }

    /// Emit into a frame.
    pub fn emit(&self, frame: &mut established) {
        let version = self.remote.addr.version().unwrap_or(super::Version::V4);
        frame.set_ip_version(version.to_wire());
        frame.set_id(self.id);
        frame.set_remote_port(self.remote.port);
        frame.set_remote_addr(self.remote.addr);
        frame.set_mss(self.mss);
        frame.set_window(self.window);
        frame.set_local_port(self.local_port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Version;

    #[test]
    fn request_roundtrip() {
        let repr = CreateRepr {
            kind: SocketKind::TcpClient,
            local_port: 50000,
            remote: Endpoint::new(Address::V4([203, 0, 113, 5]), 443),
            version: Version::V4,
            backlog: 0,
            features: Features::SYNCHRONOUS,
            tls: {
                let mut tls = TlsBitmap::ENABLE;
                tls.insert(TlsBitmap::V1_2);
                tls
            },
            mss: 1460,
        };
        let mut raw = [0; create_request::LEN];
        repr.emit(create_request::new_unchecked_mut(&mut raw));
        let parsed = CreateRepr::parse(create_request::new_checked(&raw).unwrap()).unwrap();
        assert_eq!(parsed, repr);
        assert!(parsed.tls.is_enabled());
    }

    #[test]
    fn request_too_short() {
        let raw = [0; create_request::LEN - 1];
        assert_eq!(create_request::new_checked(&raw).unwrap_err(), Error::Truncated);
    }

    #[test]
    fn response_rejects_bad_family() {
        let mut raw = [0; create_response::LEN];
        let frame = create_response::new_unchecked_mut(&mut raw);
        frame.set_ip_version(9);
        frame.set_id(3);
        let frame = create_response::new_checked(&raw).unwrap();
        assert_eq!(CreateResponseRepr::parse(frame).unwrap_err(), Error::Malformed);
    }

    #[test]
    fn established_roundtrip() {
        let repr = EstablishedRepr {
            id: 7,
            local_port: 8080,
            remote: Endpoint::new(Address::V4([198, 51, 100, 23]), 40001),
            mss: 1460,
            window: 0x4000,
        };
        let mut raw = [0; established::LEN];
        repr.emit(established::new_unchecked_mut(&mut raw));
        let parsed = EstablishedRepr::parse(established::new_checked(&raw).unwrap()).unwrap();
        assert_eq!(parsed, repr);
    }
}
