//! Address types shared by all frame kinds.
//!
//! The co-processor carries both families through the same 16 byte field,
//! with a separate version discriminant. These types keep the two coupled so
//! no caller can mix a family tag with the wrong byte form.
use core::fmt;

use super::{Error, Result};

/// An internet protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    /// Internet protocol version 4.
    V4,
    /// Internet protocol version 6.
    V6,
}

impl Version {
    /// The version discriminant used in frames.
    pub fn to_wire(self) -> u16 {
        match self {
            Version::V4 => 4,
            Version::V6 => 6,
        }
    }

    /// Parse the frame discriminant, rejecting anything but 4 and 6.
    pub fn from_wire(raw: u16) -> Result<Version> {
        match raw {
            4 => Ok(Version::V4),
            6 => Ok(Version::V6),
            _ => Err(Error::Malformed),
        }
    }
}

/// An internet protocol address of either family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Address {
    /// An address of unknown or unconfigured family.
    Unspecified,
    /// An IPv4 address.
    V4([u8; 4]),
    /// An IPv6 address.
    V6([u8; 16]),
}

impl Address {
    /// The family of this address, if it has one.
    pub fn version(&self) -> Option<Version> {
        match self {
            Address::Unspecified => None,
            Address::V4(_) => Some(Version::V4),
            Address::V6(_) => Some(Version::V6),
        }
    }

    /// Query whether the address is the unspecified one.
    ///
    /// Covers both the family-less variant and the all-zero address of
    /// either family.
    pub fn is_unspecified(&self) -> bool {
        match self {
            Address::Unspecified => true,
            Address::V4(bytes) => bytes.iter().all(|&b| b == 0),
            Address::V6(bytes) => bytes.iter().all(|&b| b == 0),
        }
    }

    /// Reconstruct an address from a frame's version field and address bytes.
    pub fn from_wire(version: u16, bytes: &[u8; 16]) -> Result<Address> {
        match Version::from_wire(version)? {
            Version::V4 => {
                let mut addr = [0; 4];
                addr.copy_from_slice(&bytes[..4]);
                Ok(Address::V4(addr))
            }
            Version::V6 => Ok(Address::V6(*bytes)),
        }
    }

    /// Write the address into a frame's 16 byte address field.
    ///
    /// The unused tail of an IPv4 address is zeroed, as is the whole field
    /// for the unspecified address.
    pub fn emit(&self, field: &mut [u8]) {
        let field = &mut field[..16];
        match self {
            Address::Unspecified => field.copy_from_slice(&[0; 16]),
            Address::V4(bytes) => {
                field[..4].copy_from_slice(bytes);
                field[4..].copy_from_slice(&[0; 12]);
            }
            Address::V6(bytes) => field.copy_from_slice(bytes),
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::Unspecified
    }
}

impl From<[u8; 4]> for Address {
    fn from(addr: [u8; 4]) -> Self {
        Address::V4(addr)
    }
}

impl From<[u8; 16]> for Address {
    fn from(addr: [u8; 16]) -> Self {
        Address::V6(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Unspecified => write!(f, "*"),
            Address::V4(b) => write!(f, "{}.{}.{}.{}", b[0], b[1], b[2], b[3]),
            Address::V6(b) => {
                for word in 0..8 {
                    if word != 0 {
                        write!(f, ":")?;
                    }
                    write!(f, "{:x}", u16::from(b[2 * word]) << 8 | u16::from(b[2 * word + 1]))?;
                }
                Ok(())
            }
        }
    }
}

/// An internet endpoint, one side of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    /// The address part.
    pub addr: Address,
    /// The port part, `0` meaning unbound.
    pub port: u16,
}

impl Endpoint {
    /// An endpoint with neither address nor port.
    pub const UNSPECIFIED: Endpoint = Endpoint {
        addr: Address::Unspecified,
        port: 0,
    };

    /// Construct an endpoint.
    pub fn new(addr: Address, port: u16) -> Self {
        Endpoint { addr, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}
