//! Command bytes that open a protocol line.

/// Command byte constants
pub mod cmd_byte {
    pub const ENUMERATE: u8 = 0x80;
    pub const NEIGHBOUR: u8 = 0x81;
    pub const SETTINGS: u8 = 0x82;
    pub const GAME_STATUS: u8 = 0x83;
    pub const RESET: u8 = 0x84;
    /// Internal "no command" marker, never transmitted
    pub const NONE: u8 = 0xFF;
}

/// Number of command kinds (one response slot each)
pub const COMMAND_COUNT: usize = 5;

/// A command recognised from the first byte of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Controller asks every module on the chain to announce itself
    Enumerate = cmd_byte::ENUMERATE,
    /// Presence exchange between neighbouring modules
    Neighbour = cmd_byte::NEIGHBOUR,
    /// Configuration values from the controller
    Settings = cmd_byte::SETTINGS,
    /// Countdown, state and strikes from the controller
    GameStatus = cmd_byte::GAME_STATUS,
    /// Return to initialization
    Reset = cmd_byte::RESET,
}

impl Command {
    pub const ALL: [Command; COMMAND_COUNT] = [
        Command::Enumerate,
        Command::Neighbour,
        Command::Settings,
        Command::GameStatus,
        Command::Reset,
    ];

    /// Map a raw byte to a command, `None` outside 0x80..=0x84
    pub fn from_byte(byte: u8) -> Option<Command> {
        match byte {
            cmd_byte::ENUMERATE => Some(Command::Enumerate),
            cmd_byte::NEIGHBOUR => Some(Command::Neighbour),
            cmd_byte::SETTINGS => Some(Command::Settings),
            cmd_byte::GAME_STATUS => Some(Command::GameStatus),
            cmd_byte::RESET => Some(Command::Reset),
            _ => None,
        }
    }

    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Index of this command's response slot
    pub fn slot(self) -> usize {
        (self.byte() - cmd_byte::ENUMERATE) as usize
    }

    /// Whether this command is answered with the module descriptor
    pub fn wants_descriptor(self) -> bool {
        matches!(
            self,
            Command::Enumerate | Command::Neighbour | Command::Settings
        )
    }
}

impl core::fmt::Display for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Command::Enumerate => "ENUMERATE",
            Command::Neighbour => "NEIGHBOUR",
            Command::Settings => "SETTINGS",
            Command::GameStatus => "GAME_STATUS",
            Command::Reset => "RESET",
        };
        write!(f, "{}", name)
    }
}
