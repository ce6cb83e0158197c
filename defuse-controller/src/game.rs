//! The controller's view of the game: countdown, strikes and the bomb state.

use defuse_protocol::{GameState, ModuleReport, State};

pub struct Game {
    round_millis: u32,
    max_strikes: u8,
    started_at: Option<u64>,
    strikes: u8,
    /// Set once the bomb exploded or was defused; the countdown stops there
    finished: Option<GameState>,
}

impl Game {
    pub fn new(round_millis: u32, max_strikes: u8) -> Self {
        Game {
            round_millis,
            max_strikes,
            started_at: None,
            strikes: 0,
            finished: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.finished.is_none()
    }

    pub fn start(&mut self, now_millis: u64) {
        self.started_at = Some(now_millis);
        self.strikes = 0;
        self.finished = None;
    }

    pub fn stop(&mut self) {
        self.started_at = None;
        self.strikes = 0;
        self.finished = None;
    }

    pub fn add_strike(&mut self, now_millis: u64) {
        if !self.is_running() {
            return;
        }
        self.strikes = self.strikes.saturating_add(1);
        log::info!("Strike {} of {}", self.strikes, self.max_strikes);
        if self.strikes >= self.max_strikes {
            self.finish(now_millis, State::Exploded);
        }
    }

    /// Account for a module's answer to a game status
    pub fn on_report(&mut self, report: &ModuleReport, now_millis: u64) {
        match report.code {
            ModuleReport::TRIGGERED => self.add_strike(now_millis),
            0 if self.is_running() => {
                log::info!("Module '{}' defused", report.name);
                self.finish(now_millis, State::Deactivated);
            }
            _ => {}
        }
    }

    fn finish(&mut self, now_millis: u64, state: State) {
        let mut final_state = self.state_at(now_millis);
        final_state.state = state;
        self.finished = Some(final_state);
    }

    /// Game status to send at `now_millis`
    pub fn state_at(&self, now_millis: u64) -> GameState {
        if let Some(state) = self.finished {
            return state;
        }
        let Some(started_at) = self.started_at else {
            return GameState {
                countdown_millis: 0,
                state: State::Sleep,
                strikes: 0,
            };
        };
        let elapsed = now_millis.saturating_sub(started_at);
        let remaining = u64::from(self.round_millis).saturating_sub(elapsed);
        GameState {
            countdown_millis: remaining.min(i32::MAX as u64) as i32,
            state: if remaining == 0 {
                State::Exploded
            } else {
                State::Active
            },
            strikes: self.strikes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown() {
        let mut game = Game::new(10_000, 3);
        assert_eq!(game.state_at(0).state, State::Sleep);

        game.start(1_000);
        let state = game.state_at(4_000);
        assert_eq!(state.countdown_millis, 7_000);
        assert_eq!(state.state, State::Active);

        let state = game.state_at(20_000);
        assert_eq!(state.countdown_millis, 0);
        assert_eq!(state.state, State::Exploded);
    }

    #[test]
    fn test_strikes_explode() {
        let mut game = Game::new(10_000, 2);
        game.start(0);
        let triggered = ModuleReport {
            name: "wires",
            code: ModuleReport::TRIGGERED,
        };
        game.on_report(&triggered, 100);
        assert_eq!(game.state_at(200).strikes, 1);
        assert!(game.is_running());

        game.on_report(&triggered, 300);
        assert!(!game.is_running());
        let state = game.state_at(5_000);
        assert_eq!(state.state, State::Exploded);
        assert_eq!(state.countdown_millis, 9_700);
        assert_eq!(state.strikes, 2);
    }

    #[test]
    fn test_defused() {
        let mut game = Game::new(10_000, 3);
        // Reports before the game started do not end it
        let disarmed = ModuleReport {
            name: "wires",
            code: 0,
        };
        game.on_report(&disarmed, 0);
        game.start(0);
        game.on_report(
            &ModuleReport {
                name: "wires",
                code: ModuleReport::ARMED,
            },
            100,
        );
        assert!(game.is_running());
        game.on_report(&disarmed, 1_000);
        assert_eq!(game.state_at(2_000).state, State::Deactivated);
        assert_eq!(game.state_at(2_000).countdown_millis, 9_000);
    }
}
