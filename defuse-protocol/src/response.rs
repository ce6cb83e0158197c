//! Outgoing replies, one pending slot per command kind.

use crate::command::{Command, COMMAND_COUNT};
use crate::line::Line;
use crate::link::SerialLink;

#[derive(Debug, Clone, Copy, Default)]
struct ResponseSlot {
    line: Line,
    pending: bool,
}

/// Reply buffers filled by the dispatcher and drained onto the link
#[derive(Debug, Clone, Default)]
pub struct ResponseSlots {
    slots: [ResponseSlot; COMMAND_COUNT],
}

impl ResponseSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the reply for `command`, replacing any reply not yet sent
    pub fn fill(&mut self, command: Command, line: Line) {
        let slot = &mut self.slots[command.slot()];
        if slot.pending {
            log::debug!("Reply to {} replaced before it was sent", command);
        }
        slot.line = line;
        slot.pending = true;
    }

    /// Remove and return the pending reply for `command`
    pub fn take(&mut self, command: Command) -> Option<Line> {
        let slot = &mut self.slots[command.slot()];
        if !slot.pending {
            return None;
        }
        slot.pending = false;
        Some(slot.line)
    }

    /// Write every pending reply to `link` in command order
    pub fn drain_to<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> usize {
        let mut sent = 0;
        for command in Command::ALL {
            if let Some(line) = self.take(command) {
                log::trace!("-> {} {:?}", command, line);
                link.send_line(&line);
                sent += 1;
            }
        }
        if sent > 0 {
            link.flush();
        }
        sent
    }
}
