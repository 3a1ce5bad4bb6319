//! Encapsulates the command link towards the co-processor.
//!
//! The physical transport (SPI, SDIO, UART) and the blocking primitives of
//! the host environment both live behind the [`Link`] trait. The bridge
//! layer only decides what to send and how long it is willing to wait; the
//! implementation owns buffer management, queueing and the actual waiting.
//! A software emulation for tests is provided in [`sim`].
use core::fmt;
use core::ops;

use crate::wire::Opcode;

#[cfg(any(feature = "std", test))]
pub mod sim;

/// The outgoing queues of the link.
///
/// Commands and bulk data travel separately so a large send can not delay an
/// urgent close. Flushing affects one queue at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    /// Control exchanges with small fixed-size frames.
    Command,
    /// Send headers with their payloads.
    Data,
}

/// How long a command submission is willing to block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Queue the command and return; completion arrives as an event.
    Immediate,
    /// Block until the co-processor has taken the command, not until it
    /// answered. Milliseconds.
    CommandAccepted(u32),
    /// Block until the response frame arrived. Milliseconds.
    Response(u32),
    /// Block until the response frame arrived, without a time limit.
    Forever,
}

/// What a command submission produced.
#[derive(Debug)]
pub enum Outcome<B> {
    /// The command went out; nothing was waited for.
    Done,
    /// The command is queued and will complete through an event.
    InProgress,
    /// The co-processor answered with this frame.
    Response(B),
}

/// One entry of an outgoing queue, as seen by a flush matcher.
#[derive(Debug, Clone, Copy)]
pub struct QueuedCommand<'a> {
    /// The command identifier, `None` for a raw data frame.
    pub op: Option<Opcode>,
    /// The queued frame, header and payload for data sends.
    pub frame: &'a [u8],
    /// Whether a completion was promised to the submitter.
    pub wants_response: bool,
}

/// The error type of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The co-processor answered with a failure status.
    Rejected(u16),

    /// The wait limit passed without the expected progress.
    Timeout,

    /// No buffer was available to stage the command.
    ///
    /// Transient by nature, retrying after completions came back is
    /// reasonable.
    NoBuffer,
}

/// The result type of link operations.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Rejected(status) => write!(f, "rejected by co-processor (0x{:04x})", status),
            Error::Timeout => write!(f, "timed out"),
            Error::NoBuffer => write!(f, "out of command buffers"),
        }
    }
}

/// A command link towards the co-processor.
///
/// All three methods may be called from the operation context; `flush` is
/// additionally called from the event context when a session dies with
/// traffic still queued.
pub trait Link {
    /// A response frame on loan from the link's buffer pool.
    ///
    /// Dropping it returns the buffer; every code path that obtains one must
    /// let it go out of scope, also on error paths.
    type Buffer: ops::Deref<Target = [u8]>;

    /// Submit one command frame.
    ///
    /// Blocking behavior follows `wait`; only the two response-waiting modes
    /// may produce `Outcome::Response`.
    fn command(
        &mut self,
        op: Opcode,
        queue: Queue,
        frame: &[u8],
        wait: WaitMode,
    ) -> Result<Outcome<Self::Buffer>>;

    /// Submit a raw data frame as header plus out-of-line payload.
    ///
    /// The payload starts at `payload_offset` bytes from the frame start;
    /// the gap behind the header is transmitted as zeroes. Keeping the two
    /// parts separate lets scatter-capable transports skip the copy.
    fn transfer(
        &mut self,
        header: &[u8],
        payload_offset: usize,
        payload: &[u8],
    ) -> Result<()>;

    /// Drop queued but unsent entries that the matcher claims.
    ///
    /// Returns how many entries were removed. The submitters of removed
    /// entries are not notified here; the caller owns synthesizing their
    /// completions.
    fn flush(&mut self, queue: Queue, matcher: &mut dyn FnMut(QueuedCommand<'_>) -> bool)
        -> usize;
}

impl<L: Link + ?Sized> Link for &mut L {
    type Buffer = L::Buffer;

    fn command(
        &mut self,
        op: Opcode,
        queue: Queue,
        frame: &[u8],
        wait: WaitMode,
    ) -> Result<Outcome<Self::Buffer>> {
        (**self).command(op, queue, frame, wait)
    }

    fn transfer(
        &mut self,
        header: &[u8],
        payload_offset: usize,
        payload: &[u8],
    ) -> Result<()> {
        (**self).transfer(header, payload_offset, payload)
    }

    fn flush(&mut self, queue: Queue, matcher: &mut dyn FnMut(QueuedCommand<'_>) -> bool)
        -> usize {
        (**self).flush(queue, matcher)
    }
}
