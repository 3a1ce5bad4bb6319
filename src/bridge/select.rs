//! Descriptor sets for the readiness query.
use core::fmt;

use super::Sockfd;

/// A set of socket descriptors, one bit each.
///
/// Sized to the wire bitmaps, so it covers descriptors `0` to `31`; the
/// table storage the crate is used with stays within that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FdSet(u32);

impl FdSet {
    /// The empty set.
    pub fn new() -> Self {
        FdSet(0)
    }

    /// Add a descriptor. Descriptors beyond the bitmap are ignored.
    pub fn insert(&mut self, fd: Sockfd) {
        if fd.0 < 32 {
            self.0 |= 1 << fd.0;
        }
    }

    /// Remove a descriptor.
    pub fn remove(&mut self, fd: Sockfd) {
        if fd.0 < 32 {
            self.0 &= !(1 << fd.0);
        }
    }

    /// Query membership.
    pub fn contains(&self, fd: Sockfd) -> bool {
        fd.0 < 32 && self.0 & (1 << fd.0) != 0
    }

    /// Remove every descriptor.
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Whether no descriptor is in the set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// How many descriptors are in the set.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// The members, ascending.
    pub fn iter(&self) -> impl Iterator<Item = Sockfd> {
        let bits = self.0;
        (0..32)
            .filter(move |index| bits & (1 << index) != 0)
            .map(Sockfd)
    }
}

impl fmt::Display for FdSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for fd in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}", fd.index())?;
            first = false;
        }
        write!(f, "}}")
    }
}
