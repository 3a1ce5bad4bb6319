//! The socket table.
//!
//! A fixed arena over caller-provided storage. Descriptors are indices into
//! it; a descriptor is live exactly while its record is out of `Reset`, and
//! every operation re-validates through [`Table::get`] instead of holding
//! references across calls.
//!
//! [`Table::get`]: struct.Table.html#method.get
use core::fmt;

use crate::managed::Slice;

use super::socket::{Socket, State};
use super::{Error, Result};

/// A socket descriptor.
///
/// Plain index, cheap to copy and to hand through callbacks. Stale
/// descriptors are caught by the state check on lookup, not by the
/// descriptor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sockfd(pub(crate) usize);

impl Sockfd {
    /// The raw index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Sockfd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sock {}", self.0)
    }
}

/// The arena of socket records.
pub struct Table<'a> {
    sockets: Slice<'a, Socket>,
}

impl<'a> Table<'a> {
    /// A table over the given records.
    ///
    /// The records are wiped so recycled storage can not leak stale state.
    pub fn new<S: Into<Slice<'a, Socket>>>(storage: S) -> Self {
        let mut sockets = storage.into();
        for socket in sockets.iter_mut() {
            socket.reset();
        }
        Table { sockets }
    }

    /// How many sockets the storage admits.
    pub fn capacity(&self) -> usize {
        self.sockets.len()
    }

    /// Claim the first free record.
    pub fn allocate(&mut self) -> Result<Sockfd> {
        let index = self
            .sockets
            .iter()
            .position(|socket| socket.state == State::Reset)
            .ok_or(Error::Exhausted)?;
        self.sockets[index].state = State::Initialized;
        Ok(Sockfd(index))
    }

    /// Look up a live socket.
    pub fn get(&self, fd: Sockfd) -> Result<&Socket> {
        match self.sockets.get(fd.0) {
            Some(socket) if socket.state != State::Reset => Ok(socket),
            _ => Err(Error::NotFound),
        }
    }

    /// Look up a live socket for mutation.
    pub fn get_mut(&mut self, fd: Sockfd) -> Result<&mut Socket> {
        match self.sockets.as_mut_slice().get_mut(fd.0) {
            Some(socket) if socket.state != State::Reset => Ok(socket),
            _ => Err(Error::NotFound),
        }
    }

    /// Return a record to the free pool.
    pub fn release(&mut self, fd: Sockfd) {
        if let Some(socket) = self.sockets.as_mut_slice().get_mut(fd.0) {
            socket.reset();
        }
    }

    /// Whether any live socket holds this local port.
    ///
    /// Port `0` stands for an ephemeral assignment and never conflicts.
    pub fn port_in_use(&self, port: u16) -> bool {
        port != 0
            && self
                .sockets
                .iter()
                .any(|socket| socket.state != State::Reset && socket.local.port == port)
    }

    /// Find the socket owning a co-processor session id.
    pub fn lookup_session(&self, id: u16) -> Option<Sockfd> {
        self.sockets
            .iter()
            .position(|socket| socket.state != State::Reset && socket.id == Some(id))
            .map(Sockfd)
    }

    /// Find a listening socket on a local port.
    pub fn lookup_listener(&self, port: u16) -> Option<Sockfd> {
        self.sockets
            .iter()
            .position(|socket| socket.state == State::Listen && socket.local.port == port)
            .map(Sockfd)
    }

    /// Iterate over live sockets with their descriptors.
    pub fn iter(&self) -> impl Iterator<Item = (Sockfd, &Socket)> {
        self.sockets
            .iter()
            .enumerate()
            .filter(|(_, socket)| socket.state != State::Reset)
            .map(|(index, socket)| (Sockfd(index), socket))
    }

}
