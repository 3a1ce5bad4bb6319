//! The readiness query exchange.
//!
//! Both directions carry session ids as one-bit-per-id words. The request
//! distinguishes an immediate poll (zero timeout) from an unbounded wait
//! through a separate flag since a zero timeval already means poll.
use byteorder::{ByteOrder, LittleEndian};

use super::{Error, Result};

/// Ids covered by the fixed width of the wire bitmaps.
pub const MAX_SELECT_IDS: usize = 32;

mod field {
    use crate::wire::field::Field;

    pub const NUM_FD: usize = 0;
    pub const SELECT_ID: usize = 1;
    pub const READ: Field = 2..6;
    pub const WRITE: Field = 6..10;
    pub const TV_SEC: Field = 10..14;
    pub const TV_USEC: Field = 14..18;
    pub const NO_TIMEOUT: usize = 18;

    pub const END: usize = NO_TIMEOUT + 1;
}

byte_wrapper!(select_request);

impl select_request {
    /// Fixed length of a select request frame.
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

    /// Return the highest session id probed plus one.
    pub fn num_fd(&self) -> u8 {
        self.0[field::NUM_FD]
    }

    /// Return the identifier correlating request and response.
    pub fn select_id(&self) -> u8 {
        self.0[field::SELECT_ID]
    }

    /// Return the read interest bitmap.
    pub fn read_ids(&self) -> u32 {
        LittleEndian::read_u32(&self.0[field::READ])
    }

    /// Return the write interest bitmap.
    pub fn write_ids(&self) -> u32 {
        LittleEndian::read_u32(&self.0[field::WRITE])
    }

    /// Return the timeout seconds field.
    pub fn tv_sec(&self) -> u32 {
        LittleEndian::read_u32(&self.0[field::TV_SEC])
    }

    /// Return the timeout microseconds field.
    pub fn tv_usec(&self) -> u32 {
        LittleEndian::read_u32(&self.0[field::TV_USEC])
    }

    /// Return whether the query waits without limit.
    pub fn no_timeout(&self) -> bool {
        self.0[field::NO_TIMEOUT] != 0
    }

    /// Set the highest probed id plus one.
    pub fn set_num_fd(&mut self, value: u8) {
        self.0[field::NUM_FD] = value;
    }

    /// Set the correlating identifier.
    pub fn set_select_id(&mut self, value: u8) {
        self.0[field::SELECT_ID] = value;
    }

    /// Set the read interest bitmap.
    pub fn set_read_ids(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[field::READ], value)
    }

    /// Set the write interest bitmap.
    pub fn set_write_ids(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[field::WRITE], value)
    }

    /// Set the timeout seconds field.
    pub fn set_tv_sec(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[field::TV_SEC], value)
    }

    /// Set the timeout microseconds field.
    pub fn set_tv_usec(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[field::TV_USEC], value)
    }

    /// Set the unbounded wait flag.
    pub fn set_no_timeout(&mut self, value: bool) {
        self.0[field::NO_TIMEOUT] = value as u8;
    }
}

/// A high-level representation of a select request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectRepr {
    /// Correlates the eventual response with this request.
    pub select_id: u8,
    /// Highest probed session id plus one.
    pub num_fd: u8,
    /// Sessions probed for readability.
    pub read_ids: u32,
    /// Sessions probed for writability.
    pub write_ids: u32,
    /// Wait limit, `None` to wait without limit, `Some((0, 0))` to poll.
    pub timeout: Option<(u32, u32)>,
}

impl SelectRepr {
    /// Parse a select request frame.
    pub fn parse(frame: &select_request) -> Result<SelectRepr> {
        frame.check_len()?;
        let timeout = if frame.no_timeout() {
            None
        } else {
            Some((frame.tv_sec(), frame.tv_usec()))
        };
        Ok(SelectRepr {
            select_id: frame.select_id(),
            num_fd: frame.num_fd(),
            read_ids: frame.read_ids(),
            write_ids: frame.write_ids(),
            timeout,
        })
    }

    /// Emit into a frame.
    pub fn emit(&self, frame: &mut select_request) {
        frame.set_num_fd(self.num_fd);
        frame.set_select_id(self.select_id);
        frame.set_read_ids(self.read_ids);
        frame.set_write_ids(self.write_ids);
        match self.timeout {
            None => {
                frame.set_tv_sec(0);
                frame.set_tv_usec(0);
                frame.set_no_timeout(true);
            }
            Some((sec, usec)) => {
                frame.set_tv_sec(sec);
                frame.set_tv_usec(usec);
                frame.set_no_timeout(false);
            }
        }
    }
}

byte_wrapper!(select_response);

mod rsp_field {
    use crate::wire::field::Field;

    pub const SELECT_ID: usize = 0;
    pub const READ: Field = 1..5;
    pub const WRITE: Field = 5..9;
    pub const TERMINATED: Field = 9..13;

    pub const END: usize = TERMINATED.end;
}

impl select_response {
    /// Fixed length of a select response frame.
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

    /// Return the identifier correlating request and response.
    pub fn select_id(&self) -> u8 {
        self.0[rsp_field::SELECT_ID]
    }

    /// Return the readable session bitmap.
    pub fn read_ids(&self) -> u32 {
        LittleEndian::read_u32(&self.0[rsp_field::READ])
    }

    /// Return the writable session bitmap.
    pub fn write_ids(&self) -> u32 {
        LittleEndian::read_u32(&self.0[rsp_field::WRITE])
    }

    /// Return the bitmap of sessions found terminated.
    pub fn terminated_ids(&self) -> u32 {
        LittleEndian::read_u32(&self.0[rsp_field::TERMINATED])
    }

    /// Set the correlating identifier.
    pub fn set_select_id(&mut self, value: u8) {
        self.0[rsp_field::SELECT_ID] = value;
    }

    /// Set the readable session bitmap.
    pub fn set_read_ids(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[rsp_field::READ], value)
    }

    /// Set the writable session bitmap.
    pub fn set_write_ids(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[rsp_field::WRITE], value)
    }

    /// Set the terminated session bitmap.
    pub fn set_terminated_ids(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.0[rsp_field::TERMINATED], value)
    }
}

/// A high-level representation of a select response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectResponseRepr {
    /// Correlates with the request of the same id.
    pub select_id: u8,
    /// Sessions found readable.
    pub read_ids: u32,
    /// Sessions found writable.
    pub write_ids: u32,
    /// Sessions found terminated by their peer.
    pub terminated_ids: u32,
}

impl SelectResponseRepr {
    /// Parse a select response frame.
    pub fn parse(frame: &select_response) -> Result<SelectResponseRepr> {
        frame.check_len()?;
        Ok(SelectResponseRepr {
            select_id: frame.select_id(),
            read_ids: frame.read_ids(),
            write_ids: frame.write_ids(),
            terminated_ids: frame.terminated_ids(),
        })
    }

    /// Emit into a frame.
    pub fn emit(&self, frame: &mut select_response) {
        frame.set_select_id(self.select_id);
        frame.set_read_ids(self.read_ids);
        frame.set_write_ids(self.write_ids);
        frame.set_terminated_ids(self.terminated_ids);
    }
}
