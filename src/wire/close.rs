//! The session close exchange.
//!
//! A close targets either one session by id or every session bound to a
//! port; the two request fields are mutually exclusive. Listening sessions
//! can only be torn down by port, which also covers every connection they
//! spawned. The same response layout doubles as the remote terminate event.
use byteorder::{ByteOrder, LittleEndian};

use super::{Error, Result};

byte_wrapper!(close_request);

mod field {
    use crate::wire::field::Field;

    pub const ID: Field = 0..2;
    pub const PORT: Field = 2..4;

    pub const END: usize = PORT.end;
}

impl close_request {
    /// Fixed length of a close request frame.
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

    /// Ensure that no accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < field::END {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the session id field.
    pub fn id(&self) -> u16 {
        LittleEndian::read_u16(&self.0[field::ID])
    }

    /// Return the port field.
    pub fn port(&self) -> u16 {
        LittleEndian::read_u16(&self.0[field::PORT])
    }

    /// Set the session id field.
    pub fn set_id(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[field::ID], value)
    }

    /// Set the port field.
    pub fn set_port(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[field::PORT], value)
    }
}

/// A high-level representation of a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseRepr {
    /// Close the one session with this id.
    ById(u16),
    /// Close every session bound to this port.
    ByPort(u16),
}

impl CloseRepr {
    /// Parse a close request frame.
    ///
    /// Session id `0` is a valid target, so the port field alone selects
    /// between the two forms. A frame naming both is rejected.
    pub fn parse(frame: &close_request) -> Result<CloseRepr> {
        frame.check_len()?;
        match (frame.id(), frame.port()) {
            (id, 0) => Ok(CloseRepr::ById(id)),
            (0, port) => Ok(CloseRepr::ByPort(port)),
            (_, _) => Err(Error::Malformed),
        }
    }

    /// Emit into a frame, zeroing the unused selector.
    pub fn emit(&self, frame: &mut close_request) {
        match *self {
            CloseRepr::ById(id) => {
                frame.set_id(id);
                frame.set_port(0);
            }
            CloseRepr::ByPort(port) => {
                frame.set_id(0);
                frame.set_port(port);
            }
        }
    }
}

byte_wrapper!(close_response);

mod rsp_field {
    use crate::wire::field::Field;

    pub const ID: Field = 0..2;
    pub const SENT: Field = 2..6;
    pub const PORT: Field = 6..8;

    pub const END: usize = PORT.end;
}

impl close_response {
    /// Fixed length of a close response frame.
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

    /// Return the session id field.
    pub fn id(&self) -> u16 {
        LittleEndian::read_u16(&self.0[rsp_field::ID])
    }

    /// Return the count of bytes sent but unacknowledged at close.
    pub fn sent(&self) -> u32 {
        LittleEndian::read_u32(&self.0[rsp_field::SENT])
    }

    /// Return the port field.
    pub fn port(&self) -> u16 {
        LittleEndian::read_u16(&self.0[rsp_field::PORT])
    }

    /// Set the session id field.
    pub fn set_id(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[rsp_field::ID], value)
    }

    /// Set the sent byte count field.
    pub fn set_sent(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[rsp_field::SENT], value)
    }

    /// Set the port field.
    pub fn set_port(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[rsp_field::PORT], value)
    }
}

/// A high-level representation of a close response or remote terminate event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseResponseRepr {
    /// The closed session, or the first of them for a close by port.
    pub id: u16,
    /// Bytes handed to the co-processor but not yet sent when it closed.
    pub sent: u32,
    /// The port whose sessions were closed, `0` for a close by id.
    pub port: u16,
}

impl CloseResponseRepr {
    /// Parse a close response frame.
    pub fn parse(frame: &close_response) -> Result<CloseResponseRepr> {
        frame.check_len()?;
        Ok(CloseResponseRepr {
            id: frame.id(),
            sent: frame.sent(),
            port: frame.port(),
        })
    }

    /// Emit into a frame.
    pub fn emit(&self, frame: &mut close_response) {
        frame.set_id(self.id);
        frame.set_sent(self.sent);
        frame.set_port(self.port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_selectors_exclusive() {
        let mut raw = [0; close_request::LEN];
        let frame = close_request::new_unchecked_mut(&mut raw);
        frame.set_id(3);
        frame.set_port(8080);
        let frame = close_request::new_checked(&raw).unwrap();
        assert_eq!(CloseRepr::parse(frame).unwrap_err(), Error::Malformed);

        let mut raw = [0; close_request::LEN];
        CloseRepr::ByPort(8080).emit(close_request::new_unchecked_mut(&mut raw));
        let frame = close_request::new_checked(&raw).unwrap();
        assert_eq!(CloseRepr::parse(frame).unwrap(), CloseRepr::ByPort(8080));
    }

    #[test]
    fn response_roundtrip() {
        let repr = CloseResponseRepr { id: 5, sent: 120, port: 0 };
        let mut raw = [0; close_response::LEN];
        repr.emit(close_response::new_unchecked_mut(&mut raw));
        let parsed = CloseResponseRepr::parse(close_response::new_checked(&raw).unwrap()).unwrap();
        assert_eq!(parsed, repr);
    }
}
