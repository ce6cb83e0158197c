//! Byte intake: assembles wire bytes into lines through a lock-free double buffer.
//!
//! [`LineFramer::feed_byte`] is meant to run in the byte-arrival context (a
//! UART interrupt on hardware, a reader thread on a host). Everything else is
//! called from the single main context. The two sides only meet on atomics:
//!
//! - the intake writes the line bytes and its length with `Relaxed` stores,
//!   then publishes the buffer by storing `ready` with `Release`;
//! - the consumer loads `ready` with `Acquire`, which makes those bytes
//!   visible, copies the line out and hands the buffer back by clearing
//!   `ready` with `Release`.
//!
//! While a line is waiting the intake never flips into its buffer: a second
//! line completed before the first was taken is dropped and counted.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use crate::command::{cmd_byte, Command};
use crate::line::{Line, LINE_CAPACITY, LINE_TERMINATOR, MAX_LINE_LEN};

/// What happened to a byte handed to the intake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intake {
    /// Stored in the active buffer
    Stored,
    /// Buffer full, byte dropped
    Overflow,
    /// Line finished and published
    LineReady,
    /// Line finished while the previous one was still waiting; dropped
    Overrun,
}

/// Double line buffer shared between the intake and the main context
pub struct LineFramer {
    buffers: [[AtomicU8; LINE_CAPACITY]; 2],
    lengths: [AtomicUsize; 2],
    /// Buffer the intake is filling
    active: AtomicUsize,
    /// Write position in the active buffer, intake only
    cursor: AtomicUsize,
    /// Set when the buffer that is not active holds a finished line
    ready: AtomicBool,
    last_command: AtomicU8,
    dropped_bytes: AtomicU32,
    dropped_lines: AtomicU32,
}

impl LineFramer {
    pub const fn new() -> Self {
        LineFramer {
            buffers: [
                [const { AtomicU8::new(0) }; LINE_CAPACITY],
                [const { AtomicU8::new(0) }; LINE_CAPACITY],
            ],
            lengths: [AtomicUsize::new(0), AtomicUsize::new(0)],
            active: AtomicUsize::new(0),
            cursor: AtomicUsize::new(0),
            ready: AtomicBool::new(false),
            last_command: AtomicU8::new(cmd_byte::NONE),
            dropped_bytes: AtomicU32::new(0),
            dropped_lines: AtomicU32::new(0),
        }
    }

    /// Take one byte from the wire. Never blocks and never allocates.
    ///
    /// Must only be called from one context at a time.
    pub fn feed_byte(&self, byte: u8) -> Intake {
        let active = self.active.load(Ordering::Relaxed);
        let cursor = self.cursor.load(Ordering::Relaxed);

        if byte != LINE_TERMINATOR {
            if cursor >= MAX_LINE_LEN {
                self.dropped_bytes.fetch_add(1, Ordering::Relaxed);
                return Intake::Overflow;
            }
            self.buffers[active][cursor].store(byte, Ordering::Relaxed);
            self.cursor.store(cursor + 1, Ordering::Relaxed);
            return Intake::Stored;
        }

        self.cursor.store(0, Ordering::Relaxed);
        if self.ready.load(Ordering::Acquire) {
            self.dropped_lines.fetch_add(1, Ordering::Relaxed);
            return Intake::Overrun;
        }

        let first = if cursor > 0 {
            self.buffers[active][0].load(Ordering::Relaxed)
        } else {
            cmd_byte::NONE
        };
        let command = match Command::from_byte(first) {
            Some(cmd) => cmd.byte(),
            None => cmd_byte::NONE,
        };

        self.lengths[active].store(cursor, Ordering::Relaxed);
        self.last_command.store(command, Ordering::Relaxed);
        self.active.store(active ^ 1, Ordering::Relaxed);
        // Publish: everything above happens-before a consumer that sees `ready`.
        self.ready.store(true, Ordering::Release);
        Intake::LineReady
    }

    /// True while a finished line waits to be taken
    pub fn line_waiting(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Command byte of the waiting line, `0xFF` when it carries none
    pub fn last_command(&self) -> u8 {
        if self.line_waiting() {
            self.last_command.load(Ordering::Relaxed)
        } else {
            cmd_byte::NONE
        }
    }

    /// Copy the waiting line out and release its buffer to the intake
    pub fn take_line(&self) -> Option<Line> {
        if !self.ready.load(Ordering::Acquire) {
            return None;
        }
        // The intake only flips `active` while `ready` is clear, so the
        // finished buffer is the one it is not filling.
        let finished = self.active.load(Ordering::Relaxed) ^ 1;
        let len = self.lengths[finished].load(Ordering::Relaxed).min(MAX_LINE_LEN);
        let mut bytes = [0u8; LINE_CAPACITY];
        for (dst, src) in bytes.iter_mut().zip(&self.buffers[finished][..len]) {
            *dst = src.load(Ordering::Relaxed);
        }
        self.ready.store(false, Ordering::Release);
        Some(Line::from_bytes(&bytes[..len]))
    }

    /// Bytes dropped because a line exceeded the buffer
    pub fn dropped_bytes(&self) -> u32 {
        self.dropped_bytes.load(Ordering::Relaxed)
    }

    /// Lines dropped because the previous one was not taken in time
    pub fn dropped_lines(&self) -> u32 {
        self.dropped_lines.load(Ordering::Relaxed)
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(framer: &LineFramer, bytes: &[u8]) -> Vec<Line> {
        let mut lines = Vec::new();
        for &b in bytes {
            framer.feed_byte(b);
            if let Some(line) = framer.take_line() {
                lines.push(line);
            }
        }
        lines
    }

    #[test]
    fn test_single_line() {
        let framer = LineFramer::new();
        assert!(!framer.line_waiting());
        for &b in b"abc" {
            assert_eq!(framer.feed_byte(b), Intake::Stored);
        }
        assert_eq!(framer.feed_byte(b'\n'), Intake::LineReady);
        assert!(framer.line_waiting());
        assert_eq!(framer.last_command(), cmd_byte::NONE);
        let line = framer.take_line().unwrap();
        assert_eq!(line.as_bytes(), b"abc");
        assert!(!framer.line_waiting());
        assert!(framer.take_line().is_none());
    }

    #[test]
    fn test_last_command() {
        let framer = LineFramer::new();
        for &b in b"\x83time:1\n" {
            framer.feed_byte(b);
        }
        assert_eq!(framer.last_command(), cmd_byte::GAME_STATUS);
        let line = framer.take_line().unwrap();
        assert_eq!(line.command_kind(), Some(Command::GameStatus));
        assert_eq!(framer.last_command(), cmd_byte::NONE);
    }

    #[test]
    fn test_overflow_drops_and_continues() {
        let framer = LineFramer::new();
        let mut input = vec![b'x'; 100];
        input.push(b'\n');
        input.extend_from_slice(b"ok\n");
        let lines = feed(&framer, &input);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), MAX_LINE_LEN);
        assert_eq!(lines[1].as_bytes(), b"ok");
        assert_eq!(framer.dropped_bytes(), 21);
    }

    #[test]
    fn test_overrun_keeps_waiting_line() {
        let framer = LineFramer::new();
        for &b in b"first\nsecond\nthird" {
            framer.feed_byte(b);
        }
        assert_eq!(framer.dropped_lines(), 1);
        assert_eq!(framer.take_line().unwrap().as_bytes(), b"first");
        assert_eq!(framer.feed_byte(b'\n'), Intake::LineReady);
        assert_eq!(framer.take_line().unwrap().as_bytes(), b"third");
    }

    #[test]
    fn test_empty_lines() {
        let framer = LineFramer::new();
        let lines = feed(&framer, b"\n\na\n");
        let bodies: Vec<&[u8]> = lines.iter().map(|l| l.as_bytes()).collect();
        assert_eq!(bodies, vec![&b""[..], &b""[..], &b"a"[..]]);
    }

    #[test]
    fn test_concurrent_intake() {
        use std::sync::Arc;
        use std::thread;

        let framer = Arc::new(LineFramer::new());
        let intake = framer.clone();
        let producer = thread::spawn(move || {
            for i in 0..200u32 {
                let text = format!("line:{}\n", i);
                for &b in text.as_bytes() {
                    intake.feed_byte(b);
                }
                // Let the consumer keep up; overruns are counted, not lost silently.
                while intake.line_waiting() {
                    thread::yield_now();
                }
            }
        });

        let mut seen = Vec::new();
        while seen.len() < 200 {
            if let Some(line) = framer.take_line() {
                seen.push(line);
            } else {
                thread::yield_now();
            }
        }
        producer.join().unwrap();

        for (i, line) in seen.iter().enumerate() {
            assert_eq!(line.as_bytes(), format!("line:{}", i).as_bytes());
        }
        assert_eq!(framer.dropped_lines(), 0);
    }
}
