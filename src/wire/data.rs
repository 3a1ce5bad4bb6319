//! The data path frames.
//!
//! Sending pushes a header plus payload down the data queue; the payload
//! does not follow the header directly but sits at a fixed offset from the
//! start of the frame, larger for stream sessions whose headers the
//! co-processor rewrites in place. Receiving mirrors this with the payload
//! location embedded in the response.
use byteorder::{ByteOrder, LittleEndian};

use super::{Error, Result};
use super::ip::{Address, Endpoint};

/// Payload offset from frame start for stream sends.
pub const STREAM_DATA_OFFSET: usize = 56;
/// Payload offset from frame start for datagram sends.
pub const DATAGRAM_DATA_OFFSET: usize = 44;

byte_wrapper!(send_request);

mod send_field {
    use crate::wire::field::Field;

    pub const IP_VERSION: Field = 0..2;
    pub const ID: Field = 2..4;
    pub const LENGTH: Field = 4..8;
    pub const OFFSET: Field = 8..10;
    pub const PORT: Field = 10..12;
    pub const ADDR: Field = 12..28;

    pub const END: usize = ADDR.end;
}

impl send_request {
    /// Length of the send header, excluding padding up to the payload.
    pub const HEADER_LEN: usize = send_field::END;

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
    ///
    /// Checks the header and that the embedded offset and length locate the
    /// payload inside the buffer.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < send_field::END {
            return Err(Error::Truncated);
        }
        let end = self.offset() as usize + self.length() as usize;
        if self.0.len() < end {
            return Err(Error::Truncated);
        }
        Ok(())
    }

    /// Return the address family field.
    pub fn ip_version(&self) -> u16 {
        LittleEndian::read_u16(&self.0[send_field::IP_VERSION])
    }

    /// Return the session id field.
    pub fn id(&self) -> u16 {
        LittleEndian::read_u16(&self.0[send_field::ID])
    }

    /// Return the payload length field.
    pub fn length(&self) -> u32 {
        LittleEndian::read_u32(&self.0[send_field::LENGTH])
    }

    /// Return the payload offset field.
    pub fn offset(&self) -> u16 {
        LittleEndian::read_u16(&self.0[send_field::OFFSET])
    }

    /// Return the destination port field.
    pub fn port(&self) -> u16 {
        LittleEndian::read_u16(&self.0[send_field::PORT])
    }

    /// Return the destination address.
    pub fn addr(&self) -> Result<Address> {
        let mut raw = [0; 16];
        raw.copy_from_slice(&self.0[send_field::ADDR]);
        Address::from_wire(self.ip_version(), &raw)
    }

    /// Return the payload located by the offset and length fields.
    pub fn payload(&self) -> &[u8] {
        let start = self.offset() as usize;
        let end = start + self.length() as usize;
        &self.0[start..end]
    }

    /// Set the address family field.
    pub fn set_ip_version(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[send_field::IP_VERSION], value)
    }

    /// Set the session id field.
    pub fn set_id(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[send_field::ID], value)
    }

    /// Set the payload length field.
    pub fn set_length(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[send_field::LENGTH], value)
    }

    /// Set the payload offset field.
    pub fn set_offset(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[send_field::OFFSET], value)
    }

    /// Set the destination port field.
    pub fn set_port(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[send_field::PORT], value)
    }

    /// Set the destination address field.
    pub fn set_addr(&mut self, value: Address) {
        value.emit(&mut self.0[send_field::ADDR])
    }
}

/// A high-level representation of a send request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendRepr {
    /// The session to send on.
    pub id: u16,
    /// The destination of the data.
    pub dest: Endpoint,
    /// Payload offset from frame start.
    pub offset: u16,
    /// Payload byte count.
    pub length: u32,
}

impl SendRepr {
    /// Parse a send request frame.
    pub fn parse(frame: &send_request) -> Result<SendRepr> {
        frame.check_len()?;
        Ok(SendRepr {
            id: frame.id(),
            dest: Endpoint::new(frame.addr()?, frame.port()),
            offset: frame.offset(),
            length: frame.length(),
        })
    }

    /// Emit the header fields into a frame.
    pub fn emit(&self, frame: &mut send_request) {
        let version = self.dest.addr.version().unwrap_or(super::Version::V4);
        frame.set_ip_version(version.to_wire());
        frame.set_id(self.id);
        frame.set_length(self.length);
        frame.set_offset(self.offset);
        frame.set_port(self.dest.port);
        frame.set_addr(self.dest.addr);
    }
}

byte_wrapper!(read_request);

mod read_field {
    use crate::wire::field::Field;

    pub const ID: usize = 0;
    pub const REQUESTED: Field = 1..5;
    pub const TIMEOUT: Field = 5..7;

    pub const END: usize = TIMEOUT.end;
}

impl read_request {
    /// Fixed length of a read request frame.
    pub const LEN: usize = read_field::END;

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
        if self.0.len() < read_field::END {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the session id field.
    pub fn id(&self) -> u8 {
        self.0[read_field::ID]
    }

    /// Return the requested byte count field.
    pub fn requested(&self) -> u32 {
        LittleEndian::read_u32(&self.0[read_field::REQUESTED])
    }

    /// Return the timeout field, milliseconds, `0` meaning no limit.
    pub fn timeout(&self) -> u16 {
        LittleEndian::read_u16(&self.0[read_field::TIMEOUT])
    }

    /// Set the session id field.
    pub fn set_id(&mut self, value: u8) {
        self.0[read_field::ID] = value;
    }

    /// Set the requested byte count field.
    pub fn set_requested(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[read_field::REQUESTED], value)
    }

    /// Set the timeout field.
    pub fn set_timeout(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[read_field::TIMEOUT], value)
    }
}

/// A high-level representation of a read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRepr {
    /// The session to read from.
    pub id: u8,
    /// How many bytes the host is prepared to take.
    pub requested: u32,
    /// Wait limit in milliseconds, `0` to wait without limit.
    pub timeout: u16,
}

impl ReadRepr {
    /// Parse a read request frame.
    pub fn parse(frame: &read_request) -> Result<ReadRepr> {
        frame.check_len()?;
        Ok(ReadRepr {
            id: frame.id(),
            requested: frame.requested(),
            timeout: frame.timeout(),
        })
    }

    /// Emit into a frame.
    pub fn emit(&self, frame: &mut read_request) {
        frame.set_id(self.id);
        frame.set_requested(self.requested);
        frame.set_timeout(self.timeout);
    }
}

byte_wrapper!(recv_response);

mod recv_field {
    use crate::wire::field::Field;

    pub const IP_VERSION: Field = 0..2;
    pub const ID: Field = 2..4;
    pub const LENGTH: Field = 4..8;
    pub const OFFSET: Field = 8..10;
    pub const PORT: Field = 10..12;
    pub const ADDR: Field = 12..28;

    pub const END: usize = ADDR.end;
}

impl recv_response {
    /// Length of the receive header, excluding padding up to the payload.
    pub const HEADER_LEN: usize = recv_field::END;

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
    ///
    /// Checks the header and that the embedded offset and length locate the
    /// payload inside the buffer.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < recv_field::END {
            return Err(Error::Truncated);
        }
        let end = self.offset() as usize + self.length() as usize;
        if self.0.len() < end {
            return Err(Error::Truncated);
        }
        Ok(())
    }

    /// Return the address family field.
    pub fn ip_version(&self) -> u16 {
        LittleEndian::read_u16(&self.0[recv_field::IP_VERSION])
    }

    /// Return the session id field.
    pub fn id(&self) -> u16 {
        LittleEndian::read_u16(&self.0[recv_field::ID])
    }

    /// Return the payload length field.
    pub fn length(&self) -> u32 {
        LittleEndian::read_u32(&self.0[recv_field::LENGTH])
    }

    /// Return the payload offset field.
    pub fn offset(&self) -> u16 {
        LittleEndian::read_u16(&self.0[recv_field::OFFSET])
    }

    /// Return the source port field.
    pub fn port(&self) -> u16 {
        LittleEndian::read_u16(&self.0[recv_field::PORT])
    }

    /// Return the source address, when the family field is recognized.
    pub fn addr(&self) -> Result<Address> {
        let mut raw = [0; 16];
        raw.copy_from_slice(&self.0[recv_field::ADDR]);
        Address::from_wire(self.ip_version(), &raw)
    }

    /// Return the payload located by the offset and length fields.
    pub fn payload(&self) -> &[u8] {
        let start = self.offset() as usize;
        let end = start + self.length() as usize;
        &self.0[start..end]
    }

    /// Set the address family field.
    pub fn set_ip_version(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[recv_field::IP_VERSION], value)
    }

    /// Set the session id field.
    pub fn set_id(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[recv_field::ID], value)
    }

    /// Set the payload length field.
    pub fn set_length(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[recv_field::LENGTH], value)
    }

    /// Set the payload offset field.
    pub fn set_offset(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[recv_field::OFFSET], value)
    }

    /// Set the source port field.
    pub fn set_port(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[recv_field::PORT], value)
    }

    /// Set the source address field.
    pub fn set_addr(&mut self, value: Address) {
        value.emit(&mut self.0[recv_field::ADDR])
    }
}

/// A high-level representation of a receive response header.
///
/// The payload itself stays in the frame buffer; `parse` only locates it so
/// the caller can copy out exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvRepr {
    /// The session that received.
    pub id: u16,
    /// The source of the data, when the frame carried a recognizable one.
    pub source: Option<Endpoint>,
    /// Payload offset from frame start.
    pub offset: u16,
    /// Payload byte count.
    pub length: u32,
}

impl RecvRepr {
    /// Parse a receive response frame.
    pub fn parse(frame: &recv_response) -> Result<RecvRepr> {
        frame.check_len()?;
        let source = match frame.addr() {
            Ok(addr) => Some(Endpoint::new(addr, frame.port())),
            Err(_) => None,
        };
        Ok(RecvRepr {
            id: frame.id(),
            source,
            offset: frame.offset(),
            length: frame.length(),
        })
    }

    /// Emit the header fields into a frame.
    pub fn emit(&self, frame: &mut recv_response) {
        let dest = self.source.unwrap_or(Endpoint::UNSPECIFIED);
        let version = dest.addr.version().unwrap_or(super::Version::V4);
        frame.set_ip_version(version.to_wire());
        frame.set_id(self.id);
        frame.set_length(self.length);
        frame.set_offset(self.offset);
        frame.set_port(dest.port);
        frame.set_addr(dest.addr);
    }
}

byte_wrapper!(ack_event);

mod ack_field {
    use crate::wire::field::Field;

    pub const ID: usize = 0;
    pub const LENGTH: Field = 1..3;

    pub const END: usize = LENGTH.end;
}

impl ack_event {
    /// Fixed length of a send acknowledgement event frame.
    pub const LEN: usize = ack_field::END;

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
        if self.0.len() < ack_field::END {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the session id field.
    pub fn id(&self) -> u8 {
        self.0[ack_field::ID]
    }

    /// Return the acknowledged byte count field.
    pub fn length(&self) -> u16 {
        LittleEndian::read_u16(&self.0[ack_field::LENGTH])
    }

    /// Set the session id field.
    pub fn set_id(&mut self, value: u8) {
        self.0[ack_field::ID] = value;
    }

    /// Set the acknowledged byte count field.
    pub fn set_length(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.0[ack_field::LENGTH], value)
    }
}

/// A high-level representation of the send acknowledgement event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRepr {
    /// The session whose send completed.
    pub id: u8,
    /// How many bytes the co-processor took responsibility for.
    pub length: u16,
}

impl AckRepr {
    /// Parse an acknowledgement event frame.
    pub fn parse(frame: &ack_event) -> Result<AckRepr> {
        frame.check_len()?;
        Ok(AckRepr {
            id: frame.id(),
            length: frame.length(),
        })
    }

    /// Emit into a frame.
    pub fn emit(&self, frame: &mut ack_event) {
        frame.set_id(self.id);
        frame.set_length(self.length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_roundtrip() {
        let repr = SendRepr {
            id: 2,
            dest: Endpoint::new(Address::V4([10, 0, 0, 9]), 9000),
            offset: STREAM_DATA_OFFSET as u16,
            length: 5,
        };
        let mut raw = [0u8; STREAM_DATA_OFFSET + 5];
        repr.emit(send_request::new_unchecked_mut(&mut raw));
        raw[STREAM_DATA_OFFSET..].copy_from_slice(b"hello");
        let frame = send_request::new_checked(&raw).unwrap();
        assert_eq!(SendRepr::parse(frame).unwrap(), repr);
        assert_eq!(frame.payload(), b"hello");
    }

    #[test]
    fn recv_payload_out_of_bounds() {
        let mut raw = [0u8; recv_response::HEADER_LEN + 4];
        {
            let frame = recv_response::new_unchecked_mut(&mut raw);
            frame.set_ip_version(4);
            frame.set_offset(recv_response::HEADER_LEN as u16);
            frame.set_length(5);
        }
        assert_eq!(recv_response::new_checked(&raw).unwrap_err(), Error::Truncated);
    }

    #[test]
    fn recv_unknown_family_loses_source_only() {
        let mut raw = [0u8; recv_response::HEADER_LEN + 3];
        {
            let frame = recv_response::new_unchecked_mut(&mut raw);
            frame.set_ip_version(0xffff);
            frame.set_id(4);
            frame.set_offset(recv_response::HEADER_LEN as u16);
            frame.set_length(3);
        }
        let repr = RecvRepr::parse(recv_response::new_checked(&raw).unwrap()).unwrap();
        assert_eq!(repr.id, 4);
        assert_eq!(repr.source, None);
        assert_eq!(repr.length, 3);
    }
}
