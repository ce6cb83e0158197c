//! Game state as reported by the controller, double buffered.

/// State of the bomb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    #[default]
    Deactivated = 0,
    Active = 1,
    Exploded = 2,
    Sleep = 3,
}

impl State {
    pub fn from_code(code: i32) -> Option<State> {
        match code {
            0 => Some(State::Deactivated),
            1 => Some(State::Active),
            2 => Some(State::Exploded),
            3 => Some(State::Sleep),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Snapshot handed to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GameState {
    /// Countdown time in ms
    pub countdown_millis: i32,
    pub state: State,
    /// Count of strikes, starting at 0
    pub strikes: u8,
}

impl GameState {
    pub const CLEARED: GameState = GameState {
        countdown_millis: 0,
        state: State::Deactivated,
        strikes: 0,
    };
}

/// The module's own armed/disarmed flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleState {
    Deactivated,
    #[default]
    Active,
}

/// Two game state slots and the index of the live one.
///
/// The dispatcher writes into the slot that is not live and then flips the
/// index, so a reader never observes a half-written snapshot.
#[derive(Debug, Clone, Default)]
pub struct GameStateStore {
    slots: [GameState; 2],
    current: usize,
    last_read: GameState,
}

impl GameStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a new snapshot and make it live
    pub fn write(&mut self, state: GameState) {
        let next = self.current ^ 1;
        self.slots[next] = state;
        self.current = next;
    }

    /// Reset both slots to the cleared state
    pub fn clear(&mut self) {
        self.slots = [GameState::CLEARED; 2];
        self.current = 0;
    }

    /// True if the live snapshot changed since the previous call
    pub fn update_state(&mut self) -> bool {
        let live = self.slots[self.current];
        if live != self.last_read {
            self.last_read = live;
            true
        } else {
            false
        }
    }

    /// Copy of the live snapshot
    pub fn game_state(&self) -> GameState {
        self.slots[self.current]
    }

    /// Copy of the snapshot that was live before the last write
    pub fn previous(&self) -> GameState {
        self.slots[self.current ^ 1]
    }
}
