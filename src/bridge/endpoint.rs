//! The socket operations.
//!
//! An `Endpoint` owns the socket table and the process-wide continuations;
//! the link is handed in per call so the same endpoint can serve whatever
//! transport instance the platform glue currently holds. Blocking happens
//! inside the link according to the wait mode each operation picks, never
//! here.
use crate::link::{self, Link, Outcome, Queue, WaitMode};
use crate::managed::Slice;
use crate::wire::ip::{Endpoint as IpEndpoint, Version};
use crate::wire::{
    accept_request, close_request, close_response, create_request, create_response,
    established, read_request, recv_response, select_request, select_response, send_request,
    AcceptRepr, CloseRepr, CloseResponseRepr, CreateRepr, CreateResponseRepr, EstablishedRepr,
    Features, Opcode, ReadRepr, RecvRepr, SelectRepr, SelectResponseRepr, SendRepr, SocketKind,
    TlsBitmap, DATAGRAM_DATA_OFFSET, STREAM_DATA_OFFSET,
};

use super::select::FdSet;
use super::socket::{DisconnectReason, ExtensionKind, Kind, PendingAccept, Protocol, Socket, State};
use super::table::{Sockfd, Table};
use super::{AcceptFn, Error, RecvFn, Result, SelectFn, SendDoneFn, TerminateFn};

/// Wait limit for plain session management exchanges, milliseconds.
const COMMAND_TIMEOUT_MS: u32 = 5_000;
/// Wait limit for a stream connect, which includes the handshake.
const CONNECT_TIMEOUT_MS: u32 = 30_000;
/// Wait limit for a TLS connect, which includes both handshakes.
const TLS_CONNECT_TIMEOUT_MS: u32 = 60_000;

/// A per-socket tuning knob.
///
/// All of these feed the session create; setting one after the session
/// exists updates the record without touching the co-processor, except the
/// read timeout which every read request carries anew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketOption {
    /// Stream retransmission attempts.
    RetryCount(u8),
    /// Keepalive initial timeout, seconds.
    Keepalive(u16),
    /// Requested maximum segment size, `0` for the co-processor default.
    Mss(u16),
    /// Blocking read limit in microseconds, `0` to wait without limit.
    ///
    /// Granularity is milliseconds; anything between zero and one
    /// millisecond rounds up rather than degrading to an unbounded wait.
    ReadTimeout(u32),
    /// Which provisioned certificate a TLS session presents, `0` to `2`.
    CertificateIndex(u8),
    /// Virtual interface to bind the session to.
    Vap(u8),
    /// Type of service for outgoing packets.
    TypeOfService(u8),
    /// Retransmission timeout base, a power of two below 32.
    RetransmissionTimeout(u8),
    /// Receive window scaling factor.
    RxWindow(u8),
    /// TLS enablement and offered versions.
    Tls(TlsBitmap),
    /// TLS cipher selection bitmap.
    Ciphers(u32),
    /// Ask for enlarged co-processor buffers.
    HighPerformance(bool),
    /// Ask for an acknowledgement event per stream send.
    AckIndication(bool),
}

/// What a shutdown asks the co-processor to tear down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseScope {
    /// The socket's own session.
    Session,
    /// Every session on the socket's local port.
    Port,
}

pub(crate) struct PendingSelect {
    pub(crate) select_id: u8,
    pub(crate) callback: SelectFn,
}

/// The host side of the socket bridge.
pub struct Endpoint<'a> {
    pub(crate) table: Table<'a>,
    pub(crate) select_pending: Option<PendingSelect>,
    pub(crate) terminate_callback: Option<TerminateFn>,
    next_select_id: u8,
    pub(crate) auto_close: bool,
}

impl<'a> Endpoint<'a> {
    /// An endpoint over the given socket storage.
    pub fn new<S: Into<Slice<'a, Socket>>>(storage: S) -> Self {
        Endpoint {
            table: Table::new(storage),
            select_pending: None,
            terminate_callback: None,
            next_select_id: 0,
            auto_close: false,
        }
    }

    /// Release records on remote teardown instead of waiting for a close.
    ///
    /// With this set a disconnected descriptor goes stale the moment the
    /// teardown event is dispatched; without it the record lingers in
    /// `Disconnected` until closed, POSIX style.
    pub fn auto_close(mut self, enabled: bool) -> Self {
        self.auto_close = enabled;
        self
    }

    /// The socket table, for inspection.
    pub fn sockets(&self) -> &Table<'a> {
        &self.table
    }

    /// Create a socket. No exchange happens; the session is created by the
    /// first operation that needs one.
    pub fn open(&mut self, version: Version, kind: Kind, protocol: Protocol) -> Result<Sockfd> {
        match (kind, protocol) {
            (Kind::Stream, Protocol::Tcp)
            | (Kind::Stream, Protocol::Unspecified)
            | (Kind::Datagram, Protocol::Udp)
            | (Kind::Datagram, Protocol::Unspecified) => (),
            _ => return Err(Error::IncompatibleProtocol),
        }
        let fd = self.table.allocate()?;
        let socket = self.table.get_mut(fd)?;
        socket.kind = Some(kind);
        socket.protocol = protocol;
        socket.version = Some(version);
        socket.queue_limit = Socket::DEFAULT_QUEUE_LIMIT;
        net_trace!("{}: open {:?} {:?}", fd, kind, version);
        Ok(fd)
    }

    /// Create a socket whose inbound data is delivered through a callback.
    ///
    /// With the callback in place before `bind`, a datagram socket gets its
    /// inbound-capable session there instead of on the first transfer.
    pub fn open_async(
        &mut self,
        version: Version,
        kind: Kind,
        protocol: Protocol,
        recv_callback: RecvFn,
    ) -> Result<Sockfd> {
        let fd = self.open(version, kind, protocol)?;
        self.table.get_mut(fd)?.recv_callback = Some(recv_callback);
        Ok(fd)
    }

    /// Bind a socket to a local endpoint.
    ///
    /// For a datagram socket with a receive callback this also creates the
    /// session, so inbound traffic can flow before any send.
    pub fn bind<L: Link>(&mut self, link: &mut L, fd: Sockfd, local: IpEndpoint) -> Result<()> {
        let socket = self.table.get(fd)?;
        match socket.state {
            State::Initialized => (),
            State::Bound
            | State::Listen
            | State::UdpUnconnectedReady
            | State::Connected => return Err(Error::AlreadyBound),
            _ => return Err(Error::InvalidState),
        }
        check_family(socket, local.addr)?;
        if self.table.port_in_use(local.port) {
            return Err(Error::AddressInUse);
        }
        let socket = self.table.get_mut(fd)?;
        socket.local = local;
        socket.state = State::Bound;
        net_trace!("{}: bound to {}", fd, local);

        let eager = socket.kind() == Kind::Datagram && socket.recv_callback.is_some();
        if eager {
            self.create_session(link, fd, SocketKind::Ludp, COMMAND_TIMEOUT_MS)?;
        }
        Ok(())
    }

    /// Connect a socket to a remote endpoint.
    ///
    /// Streams block for the full handshake. A datagram socket that already
    /// has an unconnected session merely fixes its peer; otherwise a
    /// connected session is created.
    pub fn connect<L: Link>(&mut self, link: &mut L, fd: Sockfd, remote: IpEndpoint) -> Result<()> {
        let socket = self.table.get(fd)?;
        if remote.addr.version().is_none() {
            return Err(Error::UnsupportedFamily);
        }
        check_family(socket, remote.addr)?;
        match (socket.kind(), socket.state) {
            (_, State::Connected) => Err(Error::AlreadyConnected),
            (Kind::Stream, State::Initialized) | (Kind::Stream, State::Bound) => {
                let timeout = if socket.config.tls.is_enabled() {
                    TLS_CONNECT_TIMEOUT_MS
                } else {
                    CONNECT_TIMEOUT_MS
                };
                self.table.get_mut(fd)?.remote = remote;
                self.create_session(link, fd, SocketKind::TcpClient, timeout)
            }
            (Kind::Datagram, State::Initialized) | (Kind::Datagram, State::Bound) => {
                self.table.get_mut(fd)?.remote = remote;
                self.create_session(link, fd, SocketKind::UdpClient, COMMAND_TIMEOUT_MS)
            }
            (Kind::Datagram, State::UdpUnconnectedReady) => {
                // The session already exists and serves any peer; the
                // connect only fixes the default destination.
                let socket = self.table.get_mut(fd)?;
                socket.remote = remote;
                socket.state = State::Connected;
                net_trace!("{}: peer fixed to {}", fd, remote);
                Ok(())
            }
            _ => Err(Error::InvalidState),
        }
    }

    /// Turn a stream socket into a listener.
    ///
    /// A bind is not required; the create response reports the port the
    /// co-processor assigned to an unbound or wildcard-bound listener.
    pub fn listen<L: Link>(&mut self, link: &mut L, fd: Sockfd, backlog: u16) -> Result<()> {
        let socket = self.table.get(fd)?;
        if socket.kind() != Kind::Stream {
            return Err(Error::UnsupportedKind);
        }
        match socket.state {
            State::Initialized | State::Bound => (),
            _ => return Err(Error::InvalidState),
        }
        self.table.get_mut(fd)?.backlog = backlog.max(1);
        self.create_session(link, fd, SocketKind::TcpServer, COMMAND_TIMEOUT_MS)
    }

    /// Take one connection off a listener, blocking until a peer arrives.
    ///
    /// The connection lands in a freshly allocated record inheriting the
    /// listener's configuration.
    pub fn accept<L: Link>(&mut self, link: &mut L, fd: Sockfd)
        -> Result<(Sockfd, IpEndpoint)>
    {
        let (id, port) = self.listener_session(fd)?;
        let client = self.spawn_client(fd)?;

        let result: Result<EstablishedRepr> = (|| {
            let mut raw = [0; accept_request::LEN];
            AcceptRepr { id, port }.emit(accept_request::new_unchecked_mut(&mut raw));
            let outcome =
                link.command(Opcode::Accept, Queue::Command, &raw, WaitMode::Forever)?;
            let buffer = expect_response(outcome)?;
            let est = EstablishedRepr::parse(established::new_checked(&buffer)?)?;
            Ok(est)
        })();

        match result {
            Ok(est) => {
                self.establish(client, &est)?;
                Ok((client, est.remote))
            }
            Err(err) => {
                self.table.release(client);
                Err(err)
            }
        }
    }

    /// Queue an accept; the connection arrives through [`dispatch`].
    ///
    /// Returns the descriptor the connection will land in. The callback is
    /// invoked exactly once, from the event context.
    ///
    /// [`dispatch`]: #method.dispatch
    pub fn accept_async<L: Link>(&mut self, link: &mut L, fd: Sockfd, callback: AcceptFn)
        -> Result<Sockfd>
    {
        let (id, port) = self.listener_session(fd)?;
        if self.table.get(fd)?.accept_pending.is_some() {
            return Err(Error::InvalidState);
        }
        let client = self.spawn_client(fd)?;
        self.table.get_mut(fd)?.accept_pending = Some(PendingAccept { client, callback });

        let mut raw = [0; accept_request::LEN];
        AcceptRepr { id, port }.emit(accept_request::new_unchecked_mut(&mut raw));
        match link.command(Opcode::Accept, Queue::Command, &raw, WaitMode::Immediate) {
            Ok(_) => Ok(client),
            Err(err) => {
                self.table.get_mut(fd)?.accept_pending = None;
                self.table.release(client);
                Err(err.into())
            }
        }
    }

    /// Apply a tuning option.
    pub fn set_option(&mut self, fd: Sockfd, option: SocketOption) -> Result<()> {
        let socket = self.table.get_mut(fd)?;
        let config = &mut socket.config;
        match option {
            SocketOption::RetryCount(count) => config.retry_count = count,
            SocketOption::Keepalive(secs) => config.keepalive = secs,
            SocketOption::Mss(mss) => config.mss = mss,
            SocketOption::ReadTimeout(micros) => {
                let millis = micros / 1_000 + u32::from(micros % 1_000 != 0);
                config.read_timeout = millis.min(u32::from(u16::MAX)) as u16;
            }
            SocketOption::CertificateIndex(index) => {
                if index > 2 {
                    return Err(Error::BadOption);
                }
                config.certificate_index = index;
            }
            SocketOption::Vap(vap) => config.vap = vap,
            SocketOption::TypeOfService(tos) => config.tos = tos,
            SocketOption::RetransmissionTimeout(base) => {
                if base != 0 && !(base.is_power_of_two() && base < 32) {
                    return Err(Error::BadOption);
                }
                config.retransmission_timeout = base;
            }
            SocketOption::RxWindow(factor) => config.rx_window = factor,
            SocketOption::Tls(bitmap) => config.tls = bitmap,
            SocketOption::Ciphers(bitmap) => config.ciphers = bitmap,
            SocketOption::HighPerformance(enabled) => config.high_performance = enabled,
            SocketOption::AckIndication(enabled) => config.ack_indication = enabled,
        }
        Ok(())
    }

    /// Stage a TLS extension for the session create.
    pub fn add_tls_extension(&mut self, fd: Sockfd, kind: ExtensionKind, value: &[u8])
        -> Result<()>
    {
        let socket = self.table.get_mut(fd)?;
        if socket.has_session() {
            return Err(Error::InvalidState);
        }
        socket.extensions.insert(kind, value)
    }

    /// Register the consumer of asynchronously received data.
    ///
    /// For a datagram socket this must happen before `bind` to take effect,
    /// since the inbound-capable session is created there.
    pub fn set_recv_callback(&mut self, fd: Sockfd, callback: RecvFn) -> Result<()> {
        self.table.get_mut(fd)?.recv_callback = Some(callback);
        Ok(())
    }

    /// Register the completion target for acknowledged sends.
    pub fn set_send_done(&mut self, fd: Sockfd, callback: SendDoneFn) -> Result<()> {
        self.table.get_mut(fd)?.send_done = Some(callback);
        Ok(())
    }

    /// Bound the receive events held for a callback socket.
    pub fn set_queue_limit(&mut self, fd: Sockfd, limit: u8) -> Result<()> {
        self.table.get_mut(fd)?.queue_limit = limit;
        Ok(())
    }

    /// Register the process-wide observer of remote teardowns.
    ///
    /// Last writer wins; there is one slot, not a list.
    pub fn set_terminate_callback(&mut self, callback: TerminateFn) {
        self.terminate_callback = Some(callback);
    }

    /// Send to the connected peer.
    pub fn send<L: Link>(&mut self, link: &mut L, fd: Sockfd, data: &[u8]) -> Result<usize> {
        self.send_inner(link, fd, data, None)
    }

    /// Send a datagram to an explicit destination.
    pub fn send_to<L: Link>(&mut self, link: &mut L, fd: Sockfd, data: &[u8], dest: IpEndpoint)
        -> Result<usize>
    {
        self.send_inner(link, fd, data, Some(dest))
    }

    /// Send and have the completion delivered through a callback.
    ///
    /// The callback becomes the socket's completion target and fires from
    /// [`dispatch`] once per acknowledged send, provided the acknowledgement
    /// option is set, or with an error for sends flushed by a teardown.
    ///
    /// [`dispatch`]: #method.dispatch
    pub fn send_async<L: Link>(
        &mut self,
        link: &mut L,
        fd: Sockfd,
        data: &[u8],
        callback: SendDoneFn,
    ) -> Result<usize> {
        self.table.get_mut(fd)?.send_done = Some(callback);
        self.send_inner(link, fd, data, None)
    }

    /// Send a datagram with an explicit destination and completion target.
    pub fn send_to_async<L: Link>(
        &mut self,
        link: &mut L,
        fd: Sockfd,
        data: &[u8],
        dest: IpEndpoint,
        callback: SendDoneFn,
    ) -> Result<usize> {
        self.table.get_mut(fd)?.send_done = Some(callback);
        self.send_inner(link, fd, data, Some(dest))
    }

    /// Send a payload of any size by slicing it into segment-sized sends.
    ///
    /// Stops at the first failing slice; if anything went out before that,
    /// the count sent so far is returned instead of the error.
    pub fn send_large<L: Link>(&mut self, link: &mut L, fd: Sockfd, data: &[u8])
        -> Result<usize>
    {
        let limit = self.table.get(fd)?.send_limit();
        let mut sent = 0;
        while sent < data.len() {
            let end = (sent + limit).min(data.len());
            match self.send_inner(link, fd, &data[sent..end], None) {
                Ok(count) => sent += count,
                Err(_) if sent > 0 => return Ok(sent),
                Err(err) => return Err(err),
            }
        }
        Ok(sent)
    }

    fn send_inner<L: Link>(
        &mut self,
        link: &mut L,
        fd: Sockfd,
        data: &[u8],
        dest: Option<IpEndpoint>,
    ) -> Result<usize> {
        // Datagram sockets create their session on first use.
        if self.table.get(fd)?.kind() == Kind::Datagram {
            self.ensure_datagram_session(link, fd)?;
        }
        let socket = self.table.get(fd)?;
        let dest = match (socket.kind(), socket.state) {
            (Kind::Stream, State::Connected) => socket.remote,
            (Kind::Stream, _) => return Err(Error::NotConnected),
            (Kind::Datagram, State::Connected) => match dest {
                Some(dest) => {
                    check_family(socket, dest.addr)?;
                    dest
                }
                None => socket.remote,
            },
            (Kind::Datagram, State::UdpUnconnectedReady) => match dest {
                Some(dest) if dest.addr.version().is_some() => {
                    check_family(socket, dest.addr)?;
                    dest
                }
                _ => return Err(Error::NotConnected),
            },
            (Kind::Datagram, _) => return Err(Error::NotConnected),
        };
        if data.len() > socket.send_limit() {
            return Err(Error::MessageTooLarge);
        }
        let id = socket.id.ok_or(Error::InvalidState)?;
        let offset = match socket.kind() {
            Kind::Stream => STREAM_DATA_OFFSET,
            Kind::Datagram => DATAGRAM_DATA_OFFSET,
        };

        let mut raw = [0; send_request::HEADER_LEN];
        SendRepr {
            id,
            dest,
            offset: offset as u16,
            length: data.len() as u32,
        }
        .emit(send_request::new_unchecked_mut(&mut raw));
        link.transfer(&raw, offset, data)?;
        net_trace!("{}: sent {} bytes to {}", fd, data.len(), dest);
        Ok(data.len())
    }

    /// Receive from the connected peer.
    pub fn recv<L: Link>(&mut self, link: &mut L, fd: Sockfd, buffer: &mut [u8])
        -> Result<usize>
    {
        self.recv_inner(link, fd, buffer).map(|(count, _)| count)
    }

    /// Receive one datagram along with its source.
    ///
    /// The source is the unspecified endpoint when the response did not
    /// carry a recognizable one.
    pub fn recv_from<L: Link>(&mut self, link: &mut L, fd: Sockfd, buffer: &mut [u8])
        -> Result<(usize, IpEndpoint)>
    {
        self.recv_inner(link, fd, buffer)
    }

    fn recv_inner<L: Link>(&mut self, link: &mut L, fd: Sockfd, buffer: &mut [u8])
        -> Result<(usize, IpEndpoint)>
    {
        if self.table.get(fd)?.kind() == Kind::Datagram {
            self.ensure_datagram_session(link, fd)?;
        }
        let socket = self.table.get(fd)?;
        match (socket.kind(), socket.state) {
            (Kind::Stream, State::Connected)
            | (Kind::Datagram, State::Connected)
            | (Kind::Datagram, State::UdpUnconnectedReady) => (),
            _ => return Err(Error::NotConnected),
        }
        let id = socket.id.ok_or(Error::InvalidState)?;
        let requested = buffer.len().min(usize::from(socket.effective_mss())) as u32;
        let timeout = socket.config.read_timeout;
        let wait = if timeout == 0 {
            WaitMode::Forever
        } else {
            WaitMode::Response(u32::from(timeout))
        };

        let mut raw = [0; read_request::LEN];
        ReadRepr {
            id: id as u8,
            requested,
            timeout,
        }
        .emit(read_request::new_unchecked_mut(&mut raw));
        let outcome = link.command(Opcode::ReadData, Queue::Command, &raw, wait)?;
        let response = expect_response(outcome)?;
        let frame = recv_response::new_checked(&response)?;
        let repr = RecvRepr::parse(frame)?;
        let count = (repr.length as usize).min(buffer.len());
        buffer[..count].copy_from_slice(&frame.payload()[..count]);
        let source = repr.source.unwrap_or(IpEndpoint::UNSPECIFIED);
        Ok((count, source))
    }

    /// Wait for readiness on sets of sockets, POSIX select style.
    ///
    /// `read` and `write` are rewritten to the ready subsets; the return
    /// value counts their members. Exceptional sets are not offered by the
    /// co-processor, so a non-empty `except` is refused outright. A `None`
    /// timeout waits without limit, a zero timeout polls.
    pub fn select<L: Link>(
        &mut self,
        link: &mut L,
        read: &mut FdSet,
        write: &mut FdSet,
        except: &FdSet,
        timeout: Option<(u32, u32)>,
    ) -> Result<usize> {
        if !except.is_empty() {
            return Err(Error::NotSupported);
        }
        let repr = self.select_repr(*read, *write, timeout)?;
        let mut raw = [0; select_request::LEN];
        repr.emit(select_request::new_unchecked_mut(&mut raw));
        let outcome = link.command(Opcode::Select, Queue::Command, &raw, WaitMode::Forever)?;
        let response = expect_response(outcome)?;
        let rsp = SelectResponseRepr::parse(select_response::new_checked(&response)?)?;
        let (ready_read, ready_write) = self.apply_select(&rsp);
        *read = ready_read;
        *write = ready_write;
        Ok(read.len() + write.len())
    }

    /// Queue a readiness query; the result arrives through [`dispatch`].
    ///
    /// One query can be in flight at a time.
    ///
    /// [`dispatch`]: #method.dispatch
    pub fn select_async<L: Link>(
        &mut self,
        link: &mut L,
        read: FdSet,
        write: FdSet,
        timeout: Option<(u32, u32)>,
        callback: SelectFn,
    ) -> Result<()> {
        if self.select_pending.is_some() {
            return Err(Error::InvalidState);
        }
        let repr = self.select_repr(read, write, timeout)?;
        let mut raw = [0; select_request::LEN];
        repr.emit(select_request::new_unchecked_mut(&mut raw));
        self.select_pending = Some(PendingSelect {
            select_id: repr.select_id,
            callback,
        });
        match link.command(Opcode::Select, Queue::Command, &raw, WaitMode::Immediate) {
            Ok(_) => Ok(()),
            Err(err) => {
                self.select_pending = None;
                Err(err.into())
            }
        }
    }

    /// Tear a socket down.
    ///
    /// Sockets that never had a session release locally. A disconnected
    /// socket still holds a co-processor table entry, so its close goes
    /// out by session id, unless automatic close already retired the
    /// entry. A listener always closes by port whatever the requested
    /// scope, which also releases every connection it spawned. Every
    /// record the close response identifies is released, so one shutdown
    /// may retire several descriptors.
    pub fn shutdown<L: Link>(&mut self, link: &mut L, fd: Sockfd, scope: CloseScope)
        -> Result<()>
    {
        let socket = self.table.get(fd)?;
        let request = match socket.state {
            State::Initialized | State::Bound => {
                net_trace!("{}: released locally", fd);
                self.table.release(fd);
                return Ok(());
            }
            State::Disconnected => match (self.auto_close, socket.id) {
                (false, Some(id)) => CloseRepr::ById(id),
                _ => {
                    net_trace!("{}: released locally", fd);
                    self.table.release(fd);
                    return Ok(());
                }
            },
            State::Listen => CloseRepr::ByPort(socket.local.port),
            State::Connected | State::UdpUnconnectedReady => match scope {
                CloseScope::Port if socket.local.port != 0 => {
                    CloseRepr::ByPort(socket.local.port)
                }
                _ => CloseRepr::ById(socket.id.ok_or(Error::InvalidState)?),
            },
            State::Reset => return Err(Error::NotFound),
        };

        let mut raw = [0; close_request::LEN];
        request.emit(close_request::new_unchecked_mut(&mut raw));
        let outcome = link.command(
            Opcode::Close,
            Queue::Command,
            &raw,
            WaitMode::Response(COMMAND_TIMEOUT_MS),
        )?;
        let response = expect_response(outcome)?;
        let rsp = CloseResponseRepr::parse(close_response::new_checked(&response)?)?;

        let released = self.release_closed(&rsp);
        net_trace!("{}: closed, {} records released", fd, released);
        // The response should cover the requested descriptor; if the
        // co-processor said otherwise the local record still has to go.
        self.table.release(fd);
        Ok(())
    }

    /// Release every record the close response identifies.
    pub(crate) fn release_closed(&mut self, rsp: &CloseResponseRepr) -> usize {
        let mut released = 0;
        for index in 0..self.table.capacity() {
            let fd = Sockfd(index);
            let socket = match self.table.get(fd) {
                Ok(socket) => socket,
                Err(_) => continue,
            };
            let matched = if rsp.port != 0 {
                socket.local.port == rsp.port
            } else {
                socket.id == Some(rsp.id)
            };
            if matched {
                self.table.release(fd);
                released += 1;
            }
        }
        released
    }

    /// The next select correlation id.
    fn allocate_select_id(&mut self) -> u8 {
        let id = self.next_select_id;
        self.next_select_id = self.next_select_id.wrapping_add(1);
        id
    }

    fn select_repr(&mut self, read: FdSet, write: FdSet, timeout: Option<(u32, u32)>)
        -> Result<SelectRepr>
    {
        let mut read_ids = 0u32;
        let mut write_ids = 0u32;
        let mut num_fd = 0u8;
        for (set, ids) in [(read, &mut read_ids), (write, &mut write_ids)].iter_mut() {
            for fd in set.iter() {
                let socket = self.table.get(fd)?;
                let id = socket.id.ok_or(Error::InvalidState)?;
                if id >= 32 {
                    return Err(Error::NotSupported);
                }
                **ids |= 1u32 << id;
                num_fd = num_fd.max(id as u8 + 1);
            }
        }
        Ok(SelectRepr {
            select_id: self.allocate_select_id(),
            num_fd,
            read_ids,
            write_ids,
            timeout,
        })
    }

    /// Translate a select response back to descriptor sets and mark
    /// sessions the co-processor found dead.
    pub(crate) fn apply_select(&mut self, rsp: &SelectResponseRepr) -> (FdSet, FdSet) {
        let mut read = FdSet::new();
        let mut write = FdSet::new();
        for id in 0..32u16 {
            let bit = 1u32 << id;
            let fd = match self.table.lookup_session(id) {
                Some(fd) => fd,
                None => continue,
            };
            if rsp.read_ids & bit != 0 {
                read.insert(fd);
            }
            if rsp.write_ids & bit != 0 {
                write.insert(fd);
            }
            if rsp.terminated_ids & bit != 0 {
                if let Ok(socket) = self.table.get_mut(fd) {
                    socket.state = State::Disconnected;
                    socket.disconnect_reason = Some(DisconnectReason { unsent: 0 });
                }
            }
        }
        (read, write)
    }

    /// The listener's session id and port, checked.
    fn listener_session(&self, fd: Sockfd) -> Result<(u8, u16)> {
        let socket = self.table.get(fd)?;
        if socket.state != State::Listen {
            return Err(Error::InvalidState);
        }
        let id = socket.id.ok_or(Error::InvalidState)?;
        Ok((id as u8, socket.local.port))
    }

    /// Allocate the record an accepted connection will land in.
    ///
    /// The record inherits the listener's configuration and callbacks, so
    /// inbound data on the accepted connection reaches the same receive
    /// handler the listener was opened with.
    fn spawn_client(&mut self, listener: Sockfd) -> Result<Sockfd> {
        let (kind, protocol, version, local, config, extensions, queue_limit,
             recv_callback, send_done) =
        {
            let socket = self.table.get(listener)?;
            (
                socket.kind,
                socket.protocol,
                socket.version,
                socket.local,
                socket.config,
                socket.extensions.clone(),
                socket.queue_limit,
                socket.recv_callback,
                socket.send_done,
            )
        };
        let client = self.table.allocate()?;
        let socket = self.table.get_mut(client)?;
        socket.kind = kind;
        socket.protocol = protocol;
        socket.version = version;
        socket.local = local;
        socket.config = config;
        socket.extensions = extensions;
        socket.queue_limit = queue_limit;
        socket.recv_callback = recv_callback;
        socket.send_done = send_done;
        Ok(client)
    }

    /// Move an accepted record into its connected state.
    pub(crate) fn establish(&mut self, client: Sockfd, est: &EstablishedRepr) -> Result<()> {
        let socket = self.table.get_mut(client)?;
        socket.id = Some(est.id);
        socket.remote = est.remote;
        socket.mss = est.mss;
        if est.local_port != 0 {
            socket.local.port = est.local_port;
        }
        socket.state = State::Connected;
        net_trace!("{}: established from {}", client, est.remote);
        Ok(())
    }

    /// Create the socket's session and move it to the state the kind
    /// implies.
    fn create_session<L: Link>(
        &mut self,
        link: &mut L,
        fd: Sockfd,
        kind: SocketKind,
        timeout_ms: u32,
    ) -> Result<()> {
        let mut raw = [0u8; create_request::LEN];
        {
            let socket = self.table.get(fd)?;
            let mut features = Features::SYNCHRONOUS;
            if kind == SocketKind::TcpServer {
                features.insert(Features::ACCEPT);
            }
            if socket.config.ack_indication {
                features.insert(Features::TCP_ACK_INDICATION);
            }
            if socket.config.rx_window != 0 {
                features.insert(Features::RX_WINDOW);
            }
            if socket.config.certificate_index != 0 {
                features.insert(Features::CERT_INDEX);
            }
            if socket.config.high_performance {
                features.insert(Features::HIGH_PERFORMANCE);
            }
            let frame = create_request::new_unchecked_mut(&mut raw);
            CreateRepr {
                kind,
                local_port: socket.local.port,
                remote: socket.remote,
                version: socket.version(),
                backlog: socket.backlog,
                features,
                tls: socket.config.tls,
                mss: socket.config.mss,
            }
            .emit(frame);
            frame.set_tos(u16::from(socket.config.tos));
            frame.set_retry_count(socket.config.retry_count);
            frame.set_rx_window(socket.config.rx_window);
            frame.set_keepalive(socket.config.keepalive);
            frame.set_vap(socket.config.vap);
            frame.set_cert_index(socket.config.certificate_index);
            frame.set_ciphers(socket.config.ciphers);
            frame.set_retransmission_timeout(socket.config.retransmission_timeout);
            frame.set_extensions(socket.extensions.count(), socket.extensions.as_bytes());
        }

        let outcome = link.command(
            Opcode::Create,
            Queue::Command,
            &raw,
            WaitMode::Response(timeout_ms),
        )?;
        let response = expect_response(outcome)?;
        let rsp = CreateResponseRepr::parse(create_response::new_checked(&response)?)?;

        let socket = self.table.get_mut(fd)?;
        socket.id = Some(rsp.id);
        socket.mss = rsp.mss;
        socket.local.port = rsp.local.port;
        if !rsp.local.addr.is_unspecified() {
            socket.local.addr = rsp.local.addr;
        }
        socket.state = match kind {
            SocketKind::TcpClient | SocketKind::UdpClient => State::Connected,
            SocketKind::TcpServer => State::Listen,
            SocketKind::Ludp => State::UdpUnconnectedReady,
            SocketKind::Unknown(_) => return Err(Error::UnsupportedKind),
        };
        net_trace!("{}: session {} as {:?}", fd, rsp.id, kind);
        Ok(())
    }

    /// Create the lazy unconnected session of a datagram socket.
    fn ensure_datagram_session<L: Link>(&mut self, link: &mut L, fd: Sockfd) -> Result<()> {
        let socket = self.table.get(fd)?;
        match socket.state {
            State::Initialized | State::Bound if !socket.has_session() => {
                self.create_session(link, fd, SocketKind::Ludp, COMMAND_TIMEOUT_MS)
            }
            _ => Ok(()),
        }
    }
}

/// An address argument must stay in the socket's family. Unspecified
/// addresses fit anywhere.
fn check_family(socket: &Socket, addr: crate::wire::Address) -> Result<()> {
    match addr.version() {
        None => Ok(()),
        Some(version) if version == socket.version() => Ok(()),
        Some(_) => Err(Error::FamilyMismatch),
    }
}

fn expect_response<B>(outcome: Outcome<B>) -> Result<B> {
    match outcome {
        Outcome::Response(buffer) => Ok(buffer),
        // A response wait that came back without one is a link defect;
        // surface it as the nearest transport failure.
        Outcome::Done | Outcome::InProgress => Err(Error::Link(link::Error::Timeout)),
    }
}
