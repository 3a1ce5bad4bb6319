use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::vec::Vec;

use crate::link::sim::{Reply, Sim};
use crate::wire::ip::{Address, Endpoint as IpEndpoint, Version};
use crate::wire::{
    ack_event, close_response, create_request, create_response, established, recv_response,
    select_response,
    AckRepr, CloseResponseRepr, CreateResponseRepr, EstablishedRepr, Opcode, RecvRepr,
    SelectResponseRepr, SocketKind, STREAM_DATA_OFFSET,
};

use super::select::FdSet;
use super::socket::{Kind, Protocol, Socket, State};
use super::table::Sockfd;
use super::{CloseScope, Endpoint, Error, SocketOption};

fn endpoint(capacity: usize) -> Endpoint<'static> {
    let storage: Vec<Socket> = (0..capacity).map(|_| Socket::default()).collect();
    Endpoint::new(storage)
}

fn v4(a: u8, b: u8, c: u8, d: u8, port: u16) -> IpEndpoint {
    IpEndpoint::new(Address::V4([a, b, c, d]), port)
}

fn create_reply(kind: SocketKind, id: u16, local_port: u16, mss: u16) -> Reply {
    let mut raw = [0u8; create_response::LEN];
    CreateResponseRepr {
        kind,
        id,
        local: v4(10, 0, 0, 1, local_port),
        remote: IpEndpoint::UNSPECIFIED,
        mss,
        window: 0,
    }
    .emit(create_response::new_unchecked_mut(&mut raw));
    Reply::Response(raw.to_vec())
}

fn established_frame(id: u16, local_port: u16, remote: IpEndpoint, mss: u16) -> Vec<u8> {
    let mut raw = [0u8; established::LEN];
    EstablishedRepr {
        id,
        local_port,
        remote,
        mss,
        window: 0,
    }
    .emit(established::new_unchecked_mut(&mut raw));
    raw.to_vec()
}

fn terminate_frame(id: u16, unsent: u32) -> Vec<u8> {
    let mut raw = [0u8; close_response::LEN];
    CloseResponseRepr { id, sent: unsent, port: 0 }
        .emit(close_response::new_unchecked_mut(&mut raw));
    raw.to_vec()
}

fn data_frame(id: u16, source: IpEndpoint, payload: &[u8]) -> Vec<u8> {
    let mut raw = vec![0u8; recv_response::HEADER_LEN + payload.len()];
    RecvRepr {
        id,
        source: Some(source),
        offset: recv_response::HEADER_LEN as u16,
        length: payload.len() as u32,
    }
    .emit(recv_response::new_unchecked_mut(&mut raw));
    raw[recv_response::HEADER_LEN..].copy_from_slice(payload);
    raw
}

fn select_frame(select_id: u8, read: u32, write: u32, terminated: u32) -> Vec<u8> {
    let mut raw = [0u8; select_response::LEN];
    SelectResponseRepr {
        select_id,
        read_ids: read,
        write_ids: write,
        terminated_ids: terminated,
    }
    .emit(select_response::new_unchecked_mut(&mut raw));
    raw.to_vec()
}

/// A stream socket connected to `remote` with the given session id.
fn connected_stream(
    ep: &mut Endpoint<'static>,
    sim: &mut Sim,
    id: u16,
    remote: IpEndpoint,
) -> Sockfd {
    let fd = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    sim.reply(create_reply(SocketKind::TcpClient, id, 50_000 + id, 1460));
    ep.connect(sim, fd, remote).unwrap();
    fd
}

#[test]
fn stream_connect_runs_the_create() {
    let mut ep = endpoint(4);
    let mut sim = Sim::new();

    let fd = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    assert_eq!(ep.sockets().get(fd).unwrap().state(), State::Initialized);

    sim.reply(create_reply(SocketKind::TcpClient, 3, 50_123, 1400));
    ep.connect(&mut sim, fd, v4(192, 168, 1, 9, 80)).unwrap();

    let socket = ep.sockets().get(fd).unwrap();
    assert_eq!(socket.state(), State::Connected);
    assert_eq!(socket.session_id(), Some(3));
    assert_eq!(socket.local().port, 50_123);
    assert_eq!(sim.sent_of(Opcode::Create).count(), 1);
    sim.assert_done();
}

#[test]
fn protocol_must_fit_the_kind() {
    let mut ep = endpoint(2);
    assert_eq!(
        ep.open(Version::V4, Kind::Stream, Protocol::Udp),
        Err(Error::IncompatibleProtocol)
    );
    assert_eq!(
        ep.open(Version::V4, Kind::Datagram, Protocol::Tcp),
        Err(Error::IncompatibleProtocol)
    );
    assert!(ep.open(Version::V4, Kind::Datagram, Protocol::Unspecified).is_ok());
}

#[test]
fn bind_guards() {
    let mut ep = endpoint(4);
    let mut sim = Sim::new();

    let first = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    ep.bind(&mut sim, first, v4(0, 0, 0, 0, 8080)).unwrap();
    assert_eq!(
        ep.bind(&mut sim, first, v4(0, 0, 0, 0, 8081)),
        Err(Error::AlreadyBound)
    );

    let second = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    assert_eq!(
        ep.bind(&mut sim, second, v4(0, 0, 0, 0, 8080)),
        Err(Error::AddressInUse)
    );

    let v6only = ep.open(Version::V6, Kind::Stream, Protocol::Tcp).unwrap();
    assert_eq!(
        ep.bind(&mut sim, v6only, v4(127, 0, 0, 1, 9000)),
        Err(Error::FamilyMismatch)
    );
}

#[test]
fn listen_works_without_a_prior_bind() {
    let mut ep = endpoint(4);
    let mut sim = Sim::new();

    let dgram = ep.open(Version::V4, Kind::Datagram, Protocol::Udp).unwrap();
    assert_eq!(ep.listen(&mut sim, dgram, 4), Err(Error::UnsupportedKind));

    // An unbound listener gets its port from the create response.
    let unbound = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    sim.reply(create_reply(SocketKind::TcpServer, 1, 6000, 1460));
    ep.listen(&mut sim, unbound, 4).unwrap();
    let socket = ep.sockets().get(unbound).unwrap();
    assert_eq!(socket.state(), State::Listen);
    assert_eq!(socket.local().port, 6000);

    // So does a wildcard bind.
    let wildcard = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    ep.bind(&mut sim, wildcard, v4(0, 0, 0, 0, 0)).unwrap();
    sim.reply(create_reply(SocketKind::TcpServer, 2, 6001, 1460));
    ep.listen(&mut sim, wildcard, 4).unwrap();
    assert_eq!(ep.sockets().get(wildcard).unwrap().local().port, 6001);

    // Listening twice is refused.
    assert_eq!(ep.listen(&mut sim, unbound, 4), Err(Error::InvalidState));
    sim.assert_done();
}

#[test]
fn datagram_session_is_lazy() {
    let mut ep = endpoint(2);
    let mut sim = Sim::new();

    let fd = ep.open(Version::V4, Kind::Datagram, Protocol::Udp).unwrap();
    ep.bind(&mut sim, fd, v4(0, 0, 0, 0, 5000)).unwrap();
    // Without a receive callback the bind runs no exchange at all.
    assert_eq!(sim.sent().len(), 0);

    sim.reply(create_reply(SocketKind::Ludp, 7, 5000, 1472));
    ep.send_to(&mut sim, fd, b"ping", v4(10, 0, 0, 2, 6000)).unwrap();
    assert_eq!(ep.sockets().get(fd).unwrap().state(), State::UdpUnconnectedReady);
    assert_eq!(sim.sent_of(Opcode::Create).count(), 1);

    // The session is reused for every further exchange.
    ep.send_to(&mut sim, fd, b"pong", v4(10, 0, 0, 2, 6000)).unwrap();
    assert_eq!(sim.sent_of(Opcode::Create).count(), 1);
    assert_eq!(sim.transfers().count(), 2);
    sim.assert_done();
}

#[test]
fn eager_datagram_session_with_recv_callback() {
    fn sink(_: Sockfd, _: &[u8], _: IpEndpoint) {}

    let mut ep = endpoint(2);
    let mut sim = Sim::new();

    let fd = ep.open(Version::V4, Kind::Datagram, Protocol::Udp).unwrap();
    ep.set_recv_callback(fd, sink).unwrap();
    sim.reply(create_reply(SocketKind::Ludp, 2, 5353, 1472));
    ep.bind(&mut sim, fd, v4(0, 0, 0, 0, 5353)).unwrap();

    assert_eq!(ep.sockets().get(fd).unwrap().state(), State::UdpUnconnectedReady);
    assert_eq!(sim.sent_of(Opcode::Create).count(), 1);
    sim.assert_done();
}

#[test]
fn connecting_a_ready_datagram_keeps_the_session() {
    let mut ep = endpoint(2);
    let mut sim = Sim::new();

    let fd = ep.open(Version::V4, Kind::Datagram, Protocol::Udp).unwrap();
    sim.reply(create_reply(SocketKind::Ludp, 9, 40_000, 1472));
    ep.send_to(&mut sim, fd, b"x", v4(10, 0, 0, 2, 53)).unwrap();

    let peer = v4(10, 0, 0, 3, 53);
    ep.connect(&mut sim, fd, peer).unwrap();
    let socket = ep.sockets().get(fd).unwrap();
    assert_eq!(socket.state(), State::Connected);
    assert_eq!(socket.remote(), peer);
    assert_eq!(sim.sent_of(Opcode::Create).count(), 1);

    // And the fixed peer serves sends without a destination.
    ep.send(&mut sim, fd, b"y").unwrap();
    assert_eq!(sim.transfers().count(), 2);
}

#[test]
fn oversized_send_is_refused_up_front() {
    let remote = v4(1, 2, 3, 4, 443);
    let mut ep = endpoint(2);
    let mut sim = Sim::new();
    let fd = connected_stream(&mut ep, &mut sim, 1, remote);

    let big = vec![0u8; 1461];
    assert_eq!(ep.send(&mut sim, fd, &big), Err(Error::MessageTooLarge));
    assert_eq!(sim.transfers().count(), 0);

    assert_eq!(ep.send(&mut sim, fd, &big[..1460]), Ok(1460));
    let sent = sim.transfers().next().unwrap();
    assert_eq!(sent.frame.len(), STREAM_DATA_OFFSET + 1460);
}

#[test]
fn tls_reserves_segment_headroom() {
    let mut ep = endpoint(2);
    let mut sim = Sim::new();

    let fd = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    ep.set_option(fd, SocketOption::Tls(crate::wire::TlsBitmap::ENABLE)).unwrap();
    sim.reply(create_reply(SocketKind::TcpClient, 1, 50_001, 1460));
    ep.connect(&mut sim, fd, v4(1, 2, 3, 4, 443)).unwrap();

    let payload = vec![0u8; 1460 - 90 + 1];
    assert_eq!(ep.send(&mut sim, fd, &payload), Err(Error::MessageTooLarge));
    assert_eq!(ep.send(&mut sim, fd, &payload[..1460 - 90]), Ok(1370));
}

#[test]
fn send_large_slices_to_the_segment_limit() {
    let remote = v4(1, 2, 3, 4, 80);
    let mut ep = endpoint(2);
    let mut sim = Sim::new();
    let fd = connected_stream(&mut ep, &mut sim, 1, remote);

    let payload = vec![7u8; 3000];
    assert_eq!(ep.send_large(&mut sim, fd, &payload), Ok(3000));
    let lengths: Vec<usize> = sim
        .transfers()
        .map(|sent| sent.frame.len() - STREAM_DATA_OFFSET)
        .collect();
    assert_eq!(lengths, [1460, 1460, 80]);
}

#[test]
fn blocking_recv_copies_the_embedded_payload() {
    let remote = v4(10, 0, 0, 8, 7000);
    let mut ep = endpoint(2);
    let mut sim = Sim::new();
    let fd = connected_stream(&mut ep, &mut sim, 4, remote);

    sim.reply(Reply::Response(data_frame(4, remote, b"hello")));
    let mut buffer = [0u8; 16];
    let (count, source) = ep.recv_from(&mut sim, fd, &mut buffer).unwrap();
    assert_eq!(&buffer[..count], b"hello");
    assert_eq!(source, remote);
    sim.assert_done();
}

#[test]
fn read_timeout_becomes_the_wait_limit() {
    let remote = v4(10, 0, 0, 8, 7000);
    let mut ep = endpoint(2);
    let mut sim = Sim::new();
    let fd = connected_stream(&mut ep, &mut sim, 4, remote);

    // 1500 us rounds up to 2 ms rather than down to a poll.
    ep.set_option(fd, SocketOption::ReadTimeout(1_500)).unwrap();
    sim.reply(Reply::Timeout);
    let mut buffer = [0u8; 16];
    assert_eq!(
        ep.recv(&mut sim, fd, &mut buffer),
        Err(Error::Link(crate::link::Error::Timeout))
    );
}

#[test]
fn remote_terminate_flushes_queued_sends() {
    static COMPLETED: AtomicUsize = AtomicUsize::new(0);
    static FAILED: AtomicUsize = AtomicUsize::new(0);
    fn send_done(_: Sockfd, result: super::Result<usize>) {
        match result {
            Ok(_) => COMPLETED.fetch_add(1, Ordering::SeqCst),
            Err(_) => FAILED.fetch_add(1, Ordering::SeqCst),
        };
    }
    static TERMINATED: AtomicI32 = AtomicI32::new(-1);
    fn on_terminate(fd: Sockfd, _: super::DisconnectReason) {
        TERMINATED.store(fd.index() as i32, Ordering::SeqCst);
    }

    let remote = v4(1, 2, 3, 4, 80);
    let mut ep = endpoint(2);
    let mut sim = Sim::new();
    let fd = connected_stream(&mut ep, &mut sim, 6, remote);
    ep.set_send_done(fd, send_done).unwrap();
    ep.set_terminate_callback(on_terminate);

    ep.send(&mut sim, fd, b"a").unwrap();
    ep.send(&mut sim, fd, b"b").unwrap();
    assert_eq!(sim.pending_len(), 2);

    let consumed = ep
        .dispatch(&mut sim, Opcode::RemoteTerminate, &terminate_frame(6, 2))
        .unwrap();
    assert!(consumed);
    assert_eq!(sim.pending_len(), 0);
    assert_eq!(FAILED.load(Ordering::SeqCst), 2);
    assert_eq!(COMPLETED.load(Ordering::SeqCst), 0);
    assert_eq!(TERMINATED.load(Ordering::SeqCst), fd.index() as i32);

    let socket = ep.sockets().get(fd).unwrap();
    assert_eq!(socket.state(), State::Disconnected);
    assert_eq!(socket.disconnect_reason().unwrap().unsent, 2);

    // The record lingers until closed. The co-processor still holds its
    // side of the session, so the close goes out by id.
    sim.reply(Reply::Response(terminate_frame(6, 0)));
    ep.shutdown(&mut sim, fd, CloseScope::Session).unwrap();
    assert_eq!(sim.sent_of(Opcode::Close).count(), 1);
    assert_eq!(ep.sockets().get(fd).err(), Some(Error::NotFound));
    sim.assert_done();
}

#[test]
fn inbound_data_respects_the_queue_limit() {
    static DELIVERED: AtomicUsize = AtomicUsize::new(0);
    fn on_data(_: Sockfd, data: &[u8], _: IpEndpoint) {
        DELIVERED.fetch_add(data.len(), Ordering::SeqCst);
    }

    let mut ep = endpoint(2);
    let mut sim = Sim::new();
    let fd = ep.open(Version::V4, Kind::Datagram, Protocol::Udp).unwrap();
    ep.set_recv_callback(fd, on_data).unwrap();
    sim.reply(create_reply(SocketKind::Ludp, 3, 6000, 1472));
    ep.bind(&mut sim, fd, v4(0, 0, 0, 0, 6000)).unwrap();

    let frame = data_frame(3, v4(10, 0, 0, 9, 6001), b"abcd");
    assert!(ep.dispatch(&mut sim, Opcode::ReadData, &frame).unwrap());
    assert_eq!(DELIVERED.load(Ordering::SeqCst), 4);

    // With no room left the event is dropped instead of delivered.
    ep.set_queue_limit(fd, 0).unwrap();
    assert!(!ep.dispatch(&mut sim, Opcode::ReadData, &frame).unwrap());
    assert_eq!(DELIVERED.load(Ordering::SeqCst), 4);
}

#[test]
fn select_remaps_session_ids_to_descriptors() {
    let mut ep = endpoint(4);
    let mut sim = Sim::new();
    let a = connected_stream(&mut ep, &mut sim, 5, v4(1, 1, 1, 1, 80));
    let b = connected_stream(&mut ep, &mut sim, 9, v4(2, 2, 2, 2, 80));

    sim.reply(Reply::Response(select_frame(0, 1 << 5, 1 << 9, 1 << 9)));
    let mut read = FdSet::new();
    read.insert(a);
    read.insert(b);
    let mut write = FdSet::new();
    write.insert(b);
    let count = ep
        .select(&mut sim, &mut read, &mut write, &FdSet::new(), None)
        .unwrap();

    assert_eq!(count, 2);
    assert!(read.contains(a) && !read.contains(b));
    assert!(write.contains(b));
    // The terminated bit downgrades the session on the way through.
    assert_eq!(ep.sockets().get(b).unwrap().state(), State::Disconnected);
    sim.assert_done();
}

#[test]
fn exceptional_sets_are_refused() {
    let mut ep = endpoint(2);
    let mut sim = Sim::new();
    let fd = connected_stream(&mut ep, &mut sim, 1, v4(1, 1, 1, 1, 80));

    let mut except = FdSet::new();
    except.insert(fd);
    let result = ep.select(&mut sim, &mut FdSet::new(), &mut FdSet::new(), &except, None);
    assert_eq!(result.err(), Some(Error::NotSupported));
}

#[test]
fn async_select_resolves_through_dispatch() {
    static READY: AtomicUsize = AtomicUsize::new(usize::MAX);
    fn on_select(read: FdSet, _: FdSet, result: super::Result<usize>) {
        assert_eq!(result.ok(), Some(read.len()));
        let first = read.iter().next().map(Sockfd::index);
        READY.store(first.unwrap_or(usize::MAX), Ordering::SeqCst);
    }

    let mut ep = endpoint(2);
    let mut sim = Sim::new();
    let fd = connected_stream(&mut ep, &mut sim, 2, v4(1, 1, 1, 1, 80));

    let mut read = FdSet::new();
    read.insert(fd);
    ep.select_async(&mut sim, read, FdSet::new(), Some((1, 0)), on_select).unwrap();
    // A second query while one is in flight is refused.
    assert_eq!(
        ep.select_async(&mut sim, read, FdSet::new(), None, on_select),
        Err(Error::InvalidState)
    );

    assert!(ep.dispatch(&mut sim, Opcode::Select, &select_frame(0, 1 << 2, 0, 0)).unwrap());
    assert_eq!(READY.load(Ordering::SeqCst), fd.index());

    // The slot is free again.
    ep.select_async(&mut sim, read, FdSet::new(), None, on_select).unwrap();
}

#[test]
fn blocking_accept_lands_in_a_fresh_descriptor() {
    let mut ep = endpoint(4);
    let mut sim = Sim::new();

    let listener = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    ep.bind(&mut sim, listener, v4(0, 0, 0, 0, 8080)).unwrap();
    sim.reply(create_reply(SocketKind::TcpServer, 1, 8080, 1460));
    ep.listen(&mut sim, listener, 4).unwrap();
    assert_eq!(ep.sockets().get(listener).unwrap().state(), State::Listen);

    let peer = v4(10, 0, 0, 4, 40_000);
    sim.reply(Reply::Response(established_frame(2, 8080, peer, 1400)));
    let (client, remote) = ep.accept(&mut sim, listener).unwrap();

    assert_ne!(client, listener);
    assert_eq!(remote, peer);
    let socket = ep.sockets().get(client).unwrap();
    assert_eq!(socket.state(), State::Connected);
    assert_eq!(socket.session_id(), Some(2));
    assert_eq!(socket.remote(), peer);
    sim.assert_done();
}

#[test]
fn accepted_client_inherits_the_receive_callback() {
    static DELIVERED: AtomicUsize = AtomicUsize::new(0);
    fn on_data(_: Sockfd, data: &[u8], _: IpEndpoint) {
        assert_eq!(data, b"hi");
        DELIVERED.fetch_add(1, Ordering::SeqCst);
    }

    let mut ep = endpoint(4);
    let mut sim = Sim::new();
    let listener = ep
        .open_async(Version::V4, Kind::Stream, Protocol::Tcp, on_data)
        .unwrap();
    ep.bind(&mut sim, listener, v4(0, 0, 0, 0, 8081)).unwrap();
    sim.reply(create_reply(SocketKind::TcpServer, 1, 8081, 1460));
    ep.listen(&mut sim, listener, 2).unwrap();

    let peer = v4(10, 0, 0, 9, 43_000);
    sim.reply(Reply::Response(established_frame(2, 8081, peer, 1400)));
    let (client, _) = ep.accept(&mut sim, listener).unwrap();

    // Inbound data for the accepted connection reaches the handler the
    // listener was opened with.
    let frame = data_frame(2, peer, b"hi");
    assert!(ep.dispatch(&mut sim, Opcode::ReadData, &frame).unwrap());
    assert_eq!(DELIVERED.load(Ordering::SeqCst), 1);
    assert_eq!(ep.sockets().get(client).unwrap().state(), State::Connected);
    sim.assert_done();
}

#[test]
fn async_accept_resolves_exactly_once() {
    static RESOLVED: AtomicUsize = AtomicUsize::new(0);
    fn on_accept(_: Sockfd, result: super::Result<Sockfd>, _: IpEndpoint) {
        assert!(result.is_ok());
        RESOLVED.fetch_add(1, Ordering::SeqCst);
    }

    let mut ep = endpoint(4);
    let mut sim = Sim::new();
    let listener = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    ep.bind(&mut sim, listener, v4(0, 0, 0, 0, 9090)).unwrap();
    sim.reply(create_reply(SocketKind::TcpServer, 1, 9090, 1460));
    ep.listen(&mut sim, listener, 2).unwrap();

    let client = ep.accept_async(&mut sim, listener, on_accept).unwrap();
    // One pending accept per listener.
    assert_eq!(
        ep.accept_async(&mut sim, listener, on_accept),
        Err(Error::InvalidState)
    );

    let peer = v4(10, 0, 0, 5, 41_000);
    let frame = established_frame(3, 9090, peer, 1400);
    assert!(ep.dispatch(&mut sim, Opcode::Established, &frame).unwrap());
    assert_eq!(RESOLVED.load(Ordering::SeqCst), 1);
    assert_eq!(ep.sockets().get(client).unwrap().state(), State::Connected);

    // Without a queued accept a further connection event is dropped.
    assert!(!ep.dispatch(&mut sim, Opcode::Established, &frame).unwrap());
    assert_eq!(RESOLVED.load(Ordering::SeqCst), 1);
}

#[test]
fn closing_a_listener_retires_its_whole_port() {
    let mut ep = endpoint(4);
    let mut sim = Sim::new();

    let listener = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    ep.bind(&mut sim, listener, v4(0, 0, 0, 0, 7070)).unwrap();
    sim.reply(create_reply(SocketKind::TcpServer, 1, 7070, 1460));
    ep.listen(&mut sim, listener, 2).unwrap();

    let peer = v4(10, 0, 0, 6, 42_000);
    sim.reply(Reply::Response(established_frame(2, 7070, peer, 1400)));
    let (client, _) = ep.accept(&mut sim, listener).unwrap();

    // The session scope is overridden: listeners always close by port.
    let mut raw = [0u8; close_response::LEN];
    CloseResponseRepr { id: 1, sent: 0, port: 7070 }
        .emit(close_response::new_unchecked_mut(&mut raw));
    sim.reply(Reply::Response(raw.to_vec()));
    ep.shutdown(&mut sim, listener, CloseScope::Session).unwrap();

    assert_eq!(ep.sockets().get(listener).err(), Some(Error::NotFound));
    assert_eq!(ep.sockets().get(client).err(), Some(Error::NotFound));
    sim.assert_done();
}

#[test]
fn close_without_a_session_is_local() {
    let mut ep = endpoint(2);
    let mut sim = Sim::new();

    let fd = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    ep.bind(&mut sim, fd, v4(0, 0, 0, 0, 1234)).unwrap();
    ep.shutdown(&mut sim, fd, CloseScope::Session).unwrap();

    assert_eq!(sim.sent().len(), 0);
    assert_eq!(ep.sockets().get(fd).err(), Some(Error::NotFound));
}

#[test]
fn options_validate_their_range() {
    let mut ep = endpoint(2);
    let fd = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();

    assert_eq!(
        ep.set_option(fd, SocketOption::CertificateIndex(3)),
        Err(Error::BadOption)
    );
    assert!(ep.set_option(fd, SocketOption::CertificateIndex(2)).is_ok());
    assert_eq!(
        ep.set_option(fd, SocketOption::RetransmissionTimeout(3)),
        Err(Error::BadOption)
    );
    assert_eq!(
        ep.set_option(fd, SocketOption::RetransmissionTimeout(32)),
        Err(Error::BadOption)
    );
    assert!(ep.set_option(fd, SocketOption::RetransmissionTimeout(16)).is_ok());
}

#[test]
fn mss_option_reaches_the_create_request() {
    let mut ep = endpoint(2);
    let mut sim = Sim::new();

    let fd = ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    ep.set_option(fd, SocketOption::Mss(1400)).unwrap();
    sim.reply(create_reply(SocketKind::TcpClient, 2, 50_002, 1400));
    ep.connect(&mut sim, fd, v4(10, 0, 0, 2, 443)).unwrap();

    let sent = sim.sent_of(Opcode::Create).next().unwrap();
    assert_eq!(create_request::new_unchecked(&sent.frame).mss(), 1400);
    assert_eq!(ep.sockets().get(fd).unwrap().mss(), 1400);
}

#[test]
fn open_async_makes_the_bind_eager() {
    fn sink(_: Sockfd, _: &[u8], _: IpEndpoint) {}

    let mut ep = endpoint(2);
    let mut sim = Sim::new();
    let fd = ep
        .open_async(Version::V4, Kind::Datagram, Protocol::Udp, sink)
        .unwrap();
    sim.reply(create_reply(SocketKind::Ludp, 1, 5001, 1472));
    ep.bind(&mut sim, fd, v4(0, 0, 0, 0, 5001)).unwrap();
    assert_eq!(ep.sockets().get(fd).unwrap().state(), State::UdpUnconnectedReady);
    sim.assert_done();
}

#[test]
fn acknowledgement_completes_an_async_send() {
    static ACKED: AtomicUsize = AtomicUsize::new(0);
    fn on_done(_: Sockfd, result: super::Result<usize>) {
        ACKED.fetch_add(result.unwrap(), Ordering::SeqCst);
    }

    let mut ep = endpoint(2);
    let mut sim = Sim::new();
    let fd = connected_stream(&mut ep, &mut sim, 8, v4(1, 2, 3, 4, 80));

    assert_eq!(ep.send_async(&mut sim, fd, b"abc", on_done), Ok(3));

    let mut raw = [0u8; ack_event::LEN];
    AckRepr { id: 8, length: 3 }.emit(ack_event::new_unchecked_mut(&mut raw));
    assert!(ep.dispatch(&mut sim, Opcode::TcpAck, &raw).unwrap());
    assert_eq!(ACKED.load(Ordering::SeqCst), 3);
}

#[test]
fn table_exhaustion_reports_cleanly() {
    let mut ep = endpoint(1);
    ep.open(Version::V4, Kind::Stream, Protocol::Tcp).unwrap();
    assert_eq!(
        ep.open(Version::V4, Kind::Stream, Protocol::Tcp).err(),
        Some(Error::Exhausted)
    );
}
