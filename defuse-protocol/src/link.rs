//! Byte links between a module and the wire.

use crate::framer::LineFramer;
use crate::line::Line;

/// Byte-level access to the serial line.
///
/// Outgoing bytes go through `send`. Incoming bytes normally reach the
/// [`LineFramer`] from the byte-arrival context; links without one (tests,
/// simulations) move buffered input in `pump`, which the main context calls
/// once per poll.
pub trait SerialLink {
    /// Put one byte on the wire
    fn send(&mut self, byte: u8);

    /// Hand buffered incoming bytes to `intake`
    fn pump(&mut self, _intake: &LineFramer) {}

    /// Push out anything buffered by `send`
    fn flush(&mut self) {}

    /// Send a line followed by the terminator
    fn send_line(&mut self, line: &Line) {
        let (wire, len) = line.to_wire();
        for &b in &wire[..len] {
            self.send(b);
        }
    }
}

impl<L: SerialLink + ?Sized> SerialLink for &mut L {
    fn send(&mut self, byte: u8) {
        (**self).send(byte)
    }

    fn pump(&mut self, intake: &LineFramer) {
        (**self).pump(intake)
    }

    fn flush(&mut self) {
        (**self).flush()
    }

    fn send_line(&mut self, line: &Line) {
        (**self).send_line(line)
    }
}

/// Link that drops everything sent and never receives (standalone demo mode)
pub struct NullLink;

impl SerialLink for NullLink {
    fn send(&mut self, _byte: u8) {}
}

#[cfg(feature = "std")]
pub use host_links::{LoopbackLink, WriteLink};

#[cfg(feature = "std")]
mod host_links {
    use super::SerialLink;
    use crate::framer::{Intake, LineFramer};
    use std::collections::VecDeque;
    use std::io::Write;

    /// In-memory link: queued input is fed to the intake one line per pump
    /// and sent bytes are collected.
    #[derive(Debug, Default)]
    pub struct LoopbackLink {
        rx_queue: VecDeque<u8>,
        tx: Vec<u8>,
    }

    impl LoopbackLink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue raw bytes as if they arrived on the wire
        pub fn queue_rx(&mut self, bytes: &[u8]) {
            self.rx_queue.extend(bytes.iter().copied());
        }

        /// Queue one line; the terminator is added
        pub fn queue_line(&mut self, bytes: &[u8]) {
            self.queue_rx(bytes);
            self.rx_queue.push_back(b'\n');
        }

        pub fn rx_pending(&self) -> usize {
            self.rx_queue.len()
        }

        /// Drain everything sent so far
        pub fn take_sent(&mut self) -> Vec<u8> {
            std::mem::take(&mut self.tx)
        }
    }

    impl SerialLink for LoopbackLink {
        fn send(&mut self, byte: u8) {
            self.tx.push(byte);
        }

        fn pump(&mut self, intake: &LineFramer) {
            // Stop at a finished line so the main context can take it
            // before the next one arrives.
            while !intake.line_waiting() {
                let Some(byte) = self.rx_queue.pop_front() else {
                    break;
                };
                if intake.feed_byte(byte) == Intake::LineReady {
                    break;
                }
            }
        }
    }

    /// Sends through any writer (serial port, socket writer half)
    pub struct WriteLink<W: Write> {
        writer: W,
        failed: bool,
    }

    impl<W: Write> WriteLink<W> {
        pub fn new(writer: W) -> Self {
            WriteLink {
                writer,
                failed: false,
            }
        }

        /// True once a write failed; later bytes are dropped
        pub fn has_failed(&self) -> bool {
            self.failed
        }

        pub fn into_inner(self) -> W {
            self.writer
        }
    }

    impl<W: Write> SerialLink for WriteLink<W> {
        fn send(&mut self, byte: u8) {
            if self.failed {
                return;
            }
            if let Err(e) = self.writer.write_all(&[byte]) {
                log::warn!("Link write error: {}", e);
                self.failed = true;
            }
        }

        fn flush(&mut self) {
            if self.failed {
                return;
            }
            if let Err(e) = self.writer.flush() {
                log::warn!("Link flush error: {}", e);
                self.failed = true;
            }
        }

        fn send_line(&mut self, line: &crate::line::Line) {
            if self.failed {
                return;
            }
            let (wire, len) = line.to_wire();
            if let Err(e) = self.writer.write_all(&wire[..len]) {
                log::warn!("Link write error: {}", e);
                self.failed = true;
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::line::Line;

        #[test]
        fn test_loopback_pumps_one_line_at_a_time() {
            let framer = LineFramer::new();
            let mut link = LoopbackLink::new();
            link.queue_line(b"a:1");
            link.queue_line(b"b:2");

            link.pump(&framer);
            assert_eq!(framer.take_line().unwrap().as_bytes(), b"a:1");
            assert!(link.rx_pending() > 0);
            link.pump(&framer);
            assert_eq!(framer.take_line().unwrap().as_bytes(), b"b:2");
            assert_eq!(link.rx_pending(), 0);
        }

        #[test]
        fn test_write_link() {
            let mut link = WriteLink::new(Vec::new());
            link.send_line(&Line::from_bytes(b"\x80x"));
            link.send(b'!');
            link.flush();
            assert!(!link.has_failed());
            assert_eq!(link.into_inner(), b"\x80x\n!".to_vec());
        }
    }
}
