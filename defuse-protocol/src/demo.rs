//! Demo mode: a self-running game used when no controller is on the line.

use crate::state::{GameState, State};

/// Demo mode timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Silence on the line before demo mode starts by itself; `None` never starts it
    pub grace_millis: Option<u64>,
    /// Length of one countdown round
    pub round_millis: u64,
    /// A scheduled strike is added every this many ms of a round
    pub strike_interval_millis: u64,
    /// Upper bound for scheduled strikes
    pub max_strikes: u8,
    /// Time spent exploded between rounds
    pub pause_millis: u64,
    /// Countdown resolution
    pub tick_millis: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        DemoConfig {
            grace_millis: Some(10_000),
            round_millis: 300_000,
            strike_interval_millis: 90_000,
            max_strikes: 3,
            pause_millis: 5_000,
            tick_millis: 100,
        }
    }
}

/// Free-running replacement for controller game status
#[derive(Debug, Clone)]
pub struct DemoTimer {
    config: DemoConfig,
    enabled: bool,
    start_millis: u64,
    elapsed_millis: u64,
    /// Strikes caused locally by triggers while in demo mode
    strikes: u8,
}

impl DemoTimer {
    pub fn new(config: DemoConfig) -> Self {
        DemoTimer {
            config,
            enabled: false,
            start_millis: 0,
            elapsed_millis: 0,
            strikes: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.elapsed_millis
    }

    pub fn enable(&mut self, now_millis: u64) {
        if self.enabled {
            return;
        }
        log::info!("Demo mode on");
        self.enabled = true;
        self.start_millis = now_millis;
        self.elapsed_millis = 0;
        self.strikes = 0;
    }

    pub fn disable(&mut self) {
        if self.enabled {
            log::info!("Demo mode off");
        }
        self.enabled = false;
        self.strikes = 0;
    }

    /// Start demo mode if the line has been quiet for the grace period
    pub fn check_grace(&mut self, now_millis: u64, last_traffic_millis: u64) {
        if self.enabled {
            return;
        }
        if let Some(grace) = self.config.grace_millis {
            if now_millis.saturating_sub(last_traffic_millis) >= grace {
                self.enable(now_millis);
            }
        }
    }

    /// Count a local trigger against the demo game
    pub fn add_strike(&mut self) {
        self.strikes = self.strikes.saturating_add(1);
    }

    /// Advance to `now_millis` and return the demo state, `None` when disabled
    pub fn tick(&mut self, now_millis: u64) -> Option<GameState> {
        if !self.enabled {
            return None;
        }
        self.elapsed_millis = now_millis.saturating_sub(self.start_millis);
        let mut state = self.state_at(self.elapsed_millis);
        state.strikes = state.strikes.saturating_add(self.strikes);
        Some(state)
    }

    /// Scheduled game state after `elapsed_millis` of demo mode
    pub fn state_at(&self, elapsed_millis: u64) -> GameState {
        let cfg = &self.config;
        let cycle = cfg.round_millis + cfg.pause_millis;
        if cycle == 0 {
            return GameState::CLEARED;
        }
        let in_round = elapsed_millis % cycle;
        if in_round >= cfg.round_millis {
            return GameState {
                countdown_millis: 0,
                state: State::Exploded,
                strikes: cfg.max_strikes,
            };
        }

        let tick = cfg.tick_millis.max(1);
        let remaining = cfg.round_millis - in_round;
        // Round up so the countdown only reaches zero when the round ends.
        let remaining = remaining.div_ceil(tick) * tick;
        let scheduled = if cfg.strike_interval_millis == 0 {
            0
        } else {
            in_round / cfg.strike_interval_millis
        };
        GameState {
            countdown_millis: remaining.min(i32::MAX as u64) as i32,
            state: State::Active,
            strikes: scheduled.min(cfg.max_strikes as u64) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DemoConfig {
        DemoConfig {
            grace_millis: Some(1_000),
            round_millis: 10_000,
            strike_interval_millis: 4_000,
            max_strikes: 2,
            pause_millis: 2_000,
            tick_millis: 100,
        }
    }

    #[test]
    fn test_disabled_timer_reports_nothing() {
        let mut timer = DemoTimer::new(config());
        assert_eq!(timer.tick(5_000), None);
    }

    #[test]
    fn test_schedule() {
        let timer = DemoTimer::new(config());
        let start = timer.state_at(0);
        assert_eq!(start.state, State::Active);
        assert_eq!(start.countdown_millis, 10_000);
        assert_eq!(start.strikes, 0);

        // Quantised to the tick
        assert_eq!(timer.state_at(50).countdown_millis, 10_000);
        assert_eq!(timer.state_at(150).countdown_millis, 9_900);

        assert_eq!(timer.state_at(4_000).strikes, 1);
        assert_eq!(timer.state_at(9_999).strikes, 2);

        let pause = timer.state_at(10_500);
        assert_eq!(pause.state, State::Exploded);
        assert_eq!(pause.countdown_millis, 0);

        // Next round
        assert_eq!(timer.state_at(12_000), start);
    }

    #[test]
    fn test_grace_period() {
        let mut timer = DemoTimer::new(config());
        timer.check_grace(500, 0);
        assert!(!timer.is_enabled());
        timer.check_grace(1_000, 0);
        assert!(timer.is_enabled());
        assert_eq!(timer.tick(1_000).unwrap().countdown_millis, 10_000);
        assert_eq!(timer.elapsed_millis(), 0);
    }

    #[test]
    fn test_no_grace_never_starts() {
        let mut timer = DemoTimer::new(DemoConfig {
            grace_millis: None,
            ..config()
        });
        timer.check_grace(u64::MAX, 0);
        assert!(!timer.is_enabled());
    }

    #[test]
    fn test_local_strikes_and_disable() {
        let mut timer = DemoTimer::new(config());
        timer.enable(0);
        timer.add_strike();
        assert_eq!(timer.tick(100).unwrap().strikes, 1);
        timer.disable();
        assert_eq!(timer.tick(200), None);
        timer.enable(300);
        assert_eq!(timer.tick(300).unwrap().strikes, 0);
    }
}
