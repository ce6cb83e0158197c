//! Fixed-capacity protocol lines.

use core::fmt;

use crate::command::Command;
use crate::state::GameState;

/// Size of one line buffer
pub const LINE_CAPACITY: usize = 80;

/// Longest line body, excluding the terminator
pub const MAX_LINE_LEN: usize = LINE_CAPACITY - 1;

/// Line terminator on the wire
pub const LINE_TERMINATOR: u8 = b'\n';

/// One framed line, copied out of the intake buffers.
///
/// The terminator is not stored.
#[derive(Clone, Copy)]
pub struct Line {
    buf: [u8; LINE_CAPACITY],
    len: usize,
}

impl Line {
    pub const fn empty() -> Self {
        Line {
            buf: [0; LINE_CAPACITY],
            len: 0,
        }
    }

    /// Build a line from raw bytes, truncating at [`MAX_LINE_LEN`]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut line = Line::empty();
        let len = bytes.len().min(MAX_LINE_LEN);
        line.buf[..len].copy_from_slice(&bytes[..len]);
        line.len = len;
        line
    }

    /// Compose a command line: the command byte followed by whatever `body` writes.
    ///
    /// Output beyond [`MAX_LINE_LEN`] is reported as `fmt::Error`.
    pub fn command<F>(command: Command, body: F) -> Result<Self, fmt::Error>
    where
        F: FnOnce(&mut LineWriter<'_>) -> fmt::Result,
    {
        let mut line = Line::empty();
        line.buf[0] = command.byte();
        line.len = 1;
        let mut writer = LineWriter { line: &mut line };
        body(&mut writer)?;
        Ok(line)
    }

    /// The `GameStatus` line a controller sends for `state`
    pub fn game_status(state: &GameState) -> Self {
        // Longest rendering is well under the line limit.
        Line::command(Command::GameStatus, |w| {
            use fmt::Write;
            write!(
                w,
                "time:{} state:{} strikes:{}",
                state.countdown_millis,
                state.state.code(),
                state.strikes
            )
        })
        .unwrap_or_else(|_| Line::empty())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Command named by the first byte, if any
    pub fn command_kind(&self) -> Option<Command> {
        self.as_bytes().first().copied().and_then(Command::from_byte)
    }

    /// Line body after the command byte (the whole line when there is none)
    pub fn payload(&self) -> &[u8] {
        let bytes = self.as_bytes();
        match self.command_kind() {
            Some(_) => &bytes[1..],
            None => bytes,
        }
    }

    /// Space separated `tag:value` fragments of the payload, with a trailing `\r` removed
    pub fn fragments(&self) -> impl Iterator<Item = &[u8]> {
        let mut payload = self.payload();
        if let Some((&b'\r', rest)) = payload.split_last() {
            payload = rest;
        }
        payload
            .split(|b| *b == b' ' || *b == b'\t')
            .filter(|f| !f.is_empty())
    }

    /// Bytes to put on the wire, terminator included
    pub fn to_wire(&self) -> ([u8; LINE_CAPACITY], usize) {
        let mut out = [0u8; LINE_CAPACITY];
        out[..self.len].copy_from_slice(self.as_bytes());
        out[self.len] = LINE_TERMINATOR;
        (out, self.len + 1)
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> fmt::Result {
        if self.len + bytes.len() > MAX_LINE_LEN {
            return Err(fmt::Error);
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }
}

impl Default for Line {
    fn default() -> Self {
        Line::empty()
    }
}

impl PartialEq for Line {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Line {}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line(")?;
        for &b in self.as_bytes() {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02X}", b)?;
            }
        }
        write!(f, ")")
    }
}

/// `fmt::Write` adapter that appends to a [`Line`]
pub struct LineWriter<'a> {
    line: &'a mut Line,
}

impl LineWriter<'_> {
    pub fn write_bytes(&mut self, bytes: &[u8]) -> fmt::Result {
        self.line.push_bytes(bytes)
    }
}

impl fmt::Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.line.push_bytes(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;
    use core::fmt::Write;

    #[test]
    fn test_from_bytes_truncates() {
        let line = Line::from_bytes(&[b'x'; 100]);
        assert_eq!(line.len(), MAX_LINE_LEN);
    }

    #[test]
    fn test_payload_and_fragments() {
        let line = Line::from_bytes(b"\x83time:5000  state:1 strikes:0\r");
        assert_eq!(line.command_kind(), Some(Command::GameStatus));
        let fragments: Vec<&[u8]> = line.fragments().collect();
        assert_eq!(
            fragments,
            vec![&b"time:5000"[..], &b"state:1"[..], &b"strikes:0"[..]]
        );

        let plain = Line::from_bytes(b"sno:123");
        assert_eq!(plain.command_kind(), None);
        assert_eq!(plain.payload(), b"sno:123");
    }

    #[test]
    fn test_command_builder_overflow() {
        let ok = Line::command(Command::Settings, |w| write!(w, "a:1 b:2")).unwrap();
        assert_eq!(ok.as_bytes(), b"\x82a:1 b:2");

        let too_long = Line::command(Command::Settings, |w| w.write_bytes(&[b'x'; 79]));
        assert!(too_long.is_err());
    }

    #[test]
    fn test_game_status_line() {
        let state = GameState {
            countdown_millis: 5000,
            state: State::Active,
            strikes: 0,
        };
        let line = Line::game_status(&state);
        assert_eq!(line.as_bytes(), b"\x83time:5000 state:1 strikes:0");
        let (wire, len) = line.to_wire();
        assert_eq!(wire[len - 1], LINE_TERMINATOR);
    }
}
