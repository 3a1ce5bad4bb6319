//! A scripted software co-processor.
//!
//! Tests (and hosted experiments) drive the bridge layer against this link:
//! every submitted command is recorded, and responses come from a script the
//! test loads beforehand. Blocking never actually blocks since the scripted
//! answer is already there.
use std::collections::VecDeque;
use std::vec::Vec;

use crate::wire::Opcode;

use super::{Error, Link, Outcome, Queue, QueuedCommand, Result, WaitMode};

/// One scripted reaction to a response-waiting command.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this response frame.
    Response(Vec<u8>),
    /// Reject with this co-processor status.
    Failure(u16),
    /// Let the wait run out.
    Timeout,
}

/// A record of one submitted command or data frame.
#[derive(Debug, Clone)]
pub struct Sent {
    /// The command identifier, `None` for a raw data frame.
    pub op: Option<Opcode>,
    /// The queue it went down.
    pub queue: Queue,
    /// The complete frame, payload included for data sends.
    pub frame: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Pending {
    op: Option<Opcode>,
    queue: Queue,
    frame: Vec<u8>,
    wants_response: bool,
}

/// The scripted link.
#[derive(Debug, Default)]
pub struct Sim {
    script: VecDeque<Reply>,
    sent: Vec<Sent>,
    pending: Vec<Pending>,
}

impl Sim {
    /// A simulator with an empty script.
    pub fn new() -> Self {
        Sim::default()
    }

    /// Append one scripted reply.
    ///
    /// Replies are consumed in order by commands that wait for a response.
    pub fn reply(&mut self, reply: Reply) -> &mut Self {
        self.script.push_back(reply);
        self
    }

    /// Everything submitted so far, in order.
    pub fn sent(&self) -> &[Sent] {
        &self.sent
    }

    /// The submitted frames of one opcode, in order.
    pub fn sent_of(&self, op: Opcode) -> impl Iterator<Item = &Sent> {
        self.sent.iter().filter(move |sent| sent.op == Some(op))
    }

    /// The raw data frames submitted, in order.
    pub fn transfers(&self) -> impl Iterator<Item = &Sent> {
        self.sent.iter().filter(|sent| sent.op.is_none())
    }

    /// Entries queued by immediate submissions and not yet flushed.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Assert the script was fully consumed.
    pub fn assert_done(&self) {
        assert!(self.script.is_empty(), "unconsumed scripted replies: {:?}", self.script);
    }
}

impl Link for Sim {
    type Buffer = Vec<u8>;

    fn command(
        &mut self,
        op: Opcode,
        queue: Queue,
        frame: &[u8],
        wait: WaitMode,
    ) -> Result<Outcome<Vec<u8>>> {
        self.sent.push(Sent {
            op: Some(op),
            queue,
            frame: frame.to_vec(),
        });
        match wait {
            WaitMode::Immediate => {
                self.pending.push(Pending {
                    op: Some(op),
                    queue,
                    frame: frame.to_vec(),
                    wants_response: true,
                });
                Ok(Outcome::InProgress)
            }
            WaitMode::CommandAccepted(_) => Ok(Outcome::Done),
            WaitMode::Response(_) | WaitMode::Forever => {
                match self.script.pop_front() {
                    Some(Reply::Response(data)) => Ok(Outcome::Response(data)),
                    Some(Reply::Failure(status)) => Err(Error::Rejected(status)),
                    Some(Reply::Timeout) | None => Err(Error::Timeout),
                }
            }
        }
    }

    fn transfer(
        &mut self,
        header: &[u8],
        payload_offset: usize,
        payload: &[u8],
    ) -> Result<()> {
        assert!(header.len() <= payload_offset);
        let mut frame = vec![0; payload_offset + payload.len()];
        frame[..header.len()].copy_from_slice(header);
        frame[payload_offset..].copy_from_slice(payload);
        self.sent.push(Sent {
            op: None,
            queue: Queue::Data,
            frame: frame.clone(),
        });
        self.pending.push(Pending {
            op: None,
            queue: Queue::Data,
            frame,
            wants_response: true,
        });
        Ok(())
    }

    fn flush(&mut self, queue: Queue, matcher: &mut dyn FnMut(QueuedCommand<'_>) -> bool)
        -> usize {
        let before = self.pending.len();
        self.pending.retain(|entry| {
            entry.queue != queue
                || !matcher(QueuedCommand {
                    op: entry.op,
                    frame: &entry.frame,
                    wants_response: entry.wants_response,
                })
        });
        before - self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_replies_in_order() {
        let mut sim = Sim::new();
        sim.reply(Reply::Response(vec![1, 2, 3]));
        sim.reply(Reply::Failure(0x0021));
        match sim.command(Opcode::Create, Queue::Command, &[], WaitMode::Forever) {
            Ok(Outcome::Response(data)) => assert_eq!(data, vec![1, 2, 3]),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(
            sim.command(Opcode::Create, Queue::Command, &[], WaitMode::Forever).unwrap_err(),
            Error::Rejected(0x0021),
        );
        sim.assert_done();
    }

    #[test]
    fn flush_claims_matching_entries() {
        let mut sim = Sim::new();
        sim.transfer(&[7], 4, b"xy").unwrap();
        sim.transfer(&[9], 4, b"z").unwrap();
        let removed = sim.flush(Queue::Data, &mut |entry| entry.frame[0] == 7);
        assert_eq!(removed, 1);
        assert_eq!(sim.pending_len(), 1);
    }
}
