//! Dispatch of unsolicited co-processor events.
//!
//! The platform glue feeds every frame that is not the response to a
//! pending command into [`Endpoint::dispatch`]. Continuations registered on
//! the sockets run from here, on the caller's stack.
//!
//! [`Endpoint::dispatch`]: ../struct.Endpoint.html#method.dispatch
use crate::link::{Link, Queue, QueuedCommand};
use crate::wire::{
    ack_event, close_response, established, read_request, recv_response, select_response,
    send_request, AckRepr, CloseResponseRepr, EstablishedRepr, Opcode, RecvRepr,
    SelectResponseRepr,
};
use crate::wire::ip::Endpoint as IpEndpoint;

use super::endpoint::Endpoint;
use super::socket::{DisconnectReason, State};
use super::{Error, Result};

impl Endpoint<'_> {
    /// Handle one unsolicited frame from the co-processor.
    ///
    /// Returns whether the frame was consumed by some socket. An event for
    /// a session nobody tracks is dropped and reported as such, not an
    /// error; an opcode this layer does not know is.
    pub fn dispatch<L: Link>(&mut self, link: &mut L, op: Opcode, frame: &[u8]) -> Result<bool> {
        match op {
            Opcode::Established => self.on_established(frame),
            Opcode::RemoteTerminate => self.on_remote_terminate(link, frame),
            Opcode::ReadData => self.on_inbound_data(frame),
            Opcode::Select => self.on_select_result(frame),
            Opcode::TcpAck => self.on_tcp_ack(frame),
            _ => Err(Error::Frame(crate::wire::Error::Unrecognized)),
        }
    }

    /// A connection arrived on a listener with a pending accept.
    fn on_established(&mut self, frame: &[u8]) -> Result<bool> {
        let est = EstablishedRepr::parse(established::new_checked(frame)?)?;
        let listener = match self.table.lookup_listener(est.local_port) {
            Some(fd) => fd,
            None => {
                net_debug!("established for port {} without listener", est.local_port);
                return Ok(false);
            }
        };
        let pending = match self.table.get_mut(listener)?.accept_pending.take() {
            Some(pending) => pending,
            None => {
                net_debug!("{}: established without pending accept", listener);
                return Ok(false);
            }
        };
        self.establish(pending.client, &est)?;
        (pending.callback)(listener, Ok(pending.client), est.remote);
        Ok(true)
    }

    /// The remote side tore the connection down.
    ///
    /// Queued but unsent data for the session is flushed from the link and
    /// completed with an error, so no continuation is left dangling.
    fn on_remote_terminate<L: Link>(&mut self, link: &mut L, frame: &[u8]) -> Result<bool> {
        let rsp = CloseResponseRepr::parse(close_response::new_checked(frame)?)?;
        let fd = match self.table.lookup_session(rsp.id) {
            Some(fd) => fd,
            None => {
                net_debug!("terminate for unknown session {}", rsp.id);
                return Ok(false);
            }
        };
        let reason = DisconnectReason { unsent: rsp.sent };
        let send_done = {
            let socket = self.table.get_mut(fd)?;
            socket.state = State::Disconnected;
            socket.disconnect_reason = Some(reason);
            socket.send_done
        };

        let flushed = flush_session(link, rsp.id);
        if let Some(callback) = send_done {
            for _ in 0..flushed {
                callback(fd, Err(Error::Terminated));
            }
        }
        net_trace!("{}: remote terminate, {} sends flushed", fd, flushed);

        if let Some(callback) = self.terminate_callback {
            callback(fd, reason);
        }
        if self.auto_close {
            self.table.release(fd);
        }
        Ok(true)
    }

    /// Data arrived for a session with a receive callback.
    ///
    /// A socket whose callback has not caught up past its queue limit
    /// drops the event; the peers' flow control recovers the data.
    fn on_inbound_data(&mut self, frame: &[u8]) -> Result<bool> {
        let parsed = recv_response::new_checked(frame)?;
        let repr = RecvRepr::parse(parsed)?;
        let fd = match self.table.lookup_session(repr.id) {
            Some(fd) => fd,
            None => {
                net_debug!("data for unknown session {}", repr.id);
                return Ok(false);
            }
        };
        let callback = {
            let socket = self.table.get_mut(fd)?;
            let callback = match socket.recv_callback {
                Some(callback) => callback,
                None => return Ok(false),
            };
            if socket.queued >= socket.queue_limit {
                net_debug!("{}: receive queue limit hit, event dropped", fd);
                return Ok(false);
            }
            socket.queued += 1;
            callback
        };
        let length = repr.length as usize;
        let payload = &parsed.payload()[..length.min(parsed.payload().len())];
        let source = repr.source.unwrap_or(IpEndpoint::UNSPECIFIED);
        callback(fd, payload, source);
        if let Ok(socket) = self.table.get_mut(fd) {
            socket.queued -= 1;
        }
        Ok(true)
    }

    /// An asynchronous readiness query completed.
    fn on_select_result(&mut self, frame: &[u8]) -> Result<bool> {
        let rsp = SelectResponseRepr::parse(select_response::new_checked(frame)?)?;
        let pending = match self.select_pending.take() {
            Some(pending) if pending.select_id == rsp.select_id => pending,
            Some(pending) => {
                // Not ours; keep waiting for the right correlation id.
                net_debug!("select result {} does not match pending {}",
                    rsp.select_id, pending.select_id);
                self.select_pending = Some(pending);
                return Ok(false);
            }
            None => {
                net_debug!("select result {} without pending query", rsp.select_id);
                return Ok(false);
            }
        };
        let (read, write) = self.apply_select(&rsp);
        (pending.callback)(read, write, Ok(read.len() + write.len()));
        Ok(true)
    }

    /// The co-processor acknowledged a stream send.
    fn on_tcp_ack(&mut self, frame: &[u8]) -> Result<bool> {
        let ack = AckRepr::parse(ack_event::new_checked(frame)?)?;
        let fd = match self.table.lookup_session(u16::from(ack.id)) {
            Some(fd) => fd,
            None => {
                net_debug!("ack for unknown session {}", ack.id);
                return Ok(false);
            }
        };
        if let Some(callback) = self.table.get(fd)?.send_done {
            callback(fd, Ok(usize::from(ack.length)));
            return Ok(true);
        }
        Ok(false)
    }
}

/// Drop everything still queued for a dead session.
///
/// Data frames carry the session id in their send header; pending reads
/// carry it in the read request. Returns how many data frames went.
fn flush_session<L: Link>(link: &mut L, id: u16) -> usize {
    let flushed = link.flush(Queue::Data, &mut |queued: QueuedCommand<'_>| {
        if queued.op.is_some() {
            return false;
        }
        match send_request::new_checked(queued.frame) {
            Ok(frame) => frame.id() == id,
            Err(_) => false,
        }
    });
    link.flush(Queue::Command, &mut |queued: QueuedCommand<'_>| {
        if queued.op != Some(Opcode::ReadData) {
            return false;
        }
        match read_request::new_checked(queued.frame) {
            Ok(frame) => u16::from(frame.id()) == id,
            Err(_) => false,
        }
    });
    flushed
}
