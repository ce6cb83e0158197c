//! The module: dispatcher, game state, replies and demo mode behind one handle.

use crate::clock::Clock;
use crate::command::Command;
use crate::demo::{DemoConfig, DemoTimer};
use crate::descriptor::{ModuleDescriptor, ModuleReport};
use crate::dispatcher::{classify, Action, Phase};
use crate::error::ModuleError;
use crate::framer::{Intake, LineFramer};
use crate::line::Line;
use crate::link::SerialLink;
use crate::response::ResponseSlots;
use crate::state::{GameState, GameStateStore, ModuleState, State};
use crate::tagged::{missing, offer_fragment, TaggedValue};

/// What a trigger does to the next reported game state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrikePolicy {
    /// One more strike
    #[default]
    Escalate,
    /// One more strike and the bomb explodes
    Explode,
}

/// Per-module behaviour
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    pub strike_policy: StrikePolicy,
    pub demo: DemoConfig,
}

/// Protocol state of one game module.
///
/// Owned by the application's main loop. The byte-arrival context only
/// touches the shared [`LineFramer`] (through [`DefuseModule::handler`] or
/// the framer itself).
pub struct DefuseModule<'a> {
    intake: &'a LineFramer,
    descriptor: ModuleDescriptor<'a>,
    config: ModuleConfig,
    phase: Phase,
    store: GameStateStore,
    responses: ResponseSlots,
    demo: DemoTimer,
    my_state: ModuleState,
    trigger_pending: bool,
    /// Set by a trigger, reported and cleared by the next status reply
    triggered_since_report: bool,
    last_traffic_millis: u64,
    lines_handled: u32,
    lines_discarded: u32,
}

impl<'a> DefuseModule<'a> {
    pub fn new(
        intake: &'a LineFramer,
        descriptor: ModuleDescriptor<'a>,
        config: ModuleConfig,
    ) -> Self {
        let demo = DemoTimer::new(config.demo.clone());
        DefuseModule {
            intake,
            descriptor,
            config,
            phase: Phase::WaitingForInit,
            store: GameStateStore::new(),
            responses: ResponseSlots::new(),
            demo,
            my_state: ModuleState::default(),
            trigger_pending: false,
            triggered_since_report: false,
            last_traffic_millis: 0,
            lines_handled: 0,
            lines_discarded: 0,
        }
    }

    /// Byte-arrival entry point; safe to call from an interrupt handler
    pub fn handler(&self, byte: u8) -> Intake {
        self.intake.feed_byte(byte)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_demo_mode(&self) -> bool {
        self.demo.is_enabled()
    }

    /// Start demo mode now, regardless of line traffic
    pub fn start_demo(&mut self, now_millis: u64) {
        self.phase = Phase::Running;
        self.demo.enable(now_millis);
        self.tick_demo(now_millis);
    }

    pub fn lines_handled(&self) -> u32 {
        self.lines_handled
    }

    pub fn lines_discarded(&self) -> u32 {
        self.lines_discarded
    }

    /// Wait until the controller has supplied every value in `tags`.
    ///
    /// Polls `link` and answers enumeration while waiting. Returns
    /// `ModuleError::InitTimeout` if `timeout_millis` passes first; the module
    /// then runs in demo mode.
    pub fn wait_for_init<L, C>(
        &mut self,
        link: &mut L,
        clock: &C,
        tags: &mut [TaggedValue],
        timeout_millis: Option<u64>,
    ) -> Result<(), ModuleError>
    where
        L: SerialLink + ?Sized,
        C: Clock + ?Sized,
    {
        let start = clock.now_millis();
        self.phase = Phase::WaitingForInit;
        log::info!("Waiting for init: {} values requested", tags.len());

        loop {
            let now = clock.now_millis();
            self.poll(link, now, tags);

            if missing(tags) == 0 {
                self.phase = Phase::Running;
                self.last_traffic_millis = now;
                log::info!("Init complete after {} ms", now.saturating_sub(start));
                return Ok(());
            }

            let waited = now.saturating_sub(start);
            if let Some(timeout) = timeout_millis {
                if waited >= timeout {
                    let outstanding = missing(tags);
                    log::info!("Init timed out, {} values missing", outstanding);
                    self.start_demo(now);
                    self.responses.drain_to(link);
                    return Err(ModuleError::InitTimeout {
                        waited_millis: waited,
                        missing: outstanding,
                    });
                }
            }
            clock.idle();
        }
    }

    /// One pass of the main loop: take waiting lines, run demo mode, send replies.
    ///
    /// Returns the last command handled in this pass. A `Reset` ends the pass
    /// and is always the command returned; lines behind it stay queued for the
    /// following `wait_for_init`.
    pub fn service<L>(&mut self, link: &mut L, now_millis: u64) -> Option<Command>
    where
        L: SerialLink + ?Sized,
    {
        let last = self.poll(link, now_millis, &mut []);
        if self.phase == Phase::Running {
            self.demo.check_grace(now_millis, self.last_traffic_millis);
            self.tick_demo(now_millis);
        }
        self.responses.drain_to(link);
        last
    }

    fn poll<L>(
        &mut self,
        link: &mut L,
        now_millis: u64,
        tags: &mut [TaggedValue],
    ) -> Option<Command>
    where
        L: SerialLink + ?Sized,
    {
        let mut last = None;
        loop {
            link.pump(self.intake);
            let Some(line) = self.intake.take_line() else {
                break;
            };
            if let Some(command) = self.handle_line(&line, now_millis, tags) {
                last = Some(command);
                if command == Command::Reset {
                    break;
                }
            }
        }
        self.responses.drain_to(link);
        last
    }

    /// Act on one framed line. Returns the command it carried, if it was accepted.
    pub fn handle_line(
        &mut self,
        line: &Line,
        now_millis: u64,
        tags: &mut [TaggedValue],
    ) -> Option<Command> {
        log::trace!("<- {:?}", line);
        let action = match classify(line, self.phase) {
            Ok(action) => action,
            Err(e) => {
                log::debug!("Discarding line: {}", e);
                self.lines_discarded += 1;
                return None;
            }
        };
        self.lines_handled += 1;

        if self.phase == Phase::WaitingForInit {
            for fragment in line.fragments() {
                if let Some(i) = offer_fragment(tags, fragment) {
                    log::debug!("Received value for '{}'", tags[i].tag());
                }
            }
        }

        let command = line.command_kind();
        if command.is_some() {
            self.last_traffic_millis = now_millis;
        }

        match action {
            Action::Values => {}
            Action::Describe(command) => self.reply_descriptor(command),
            Action::GameStatus(state) => {
                self.demo.disable();
                self.commit_state(state);
                let code = self.report_code();
                self.responses
                    .fill(Command::GameStatus, self.descriptor.status_line(code));
            }
            Action::Reset => self.reset(),
        }
        command
    }

    fn reply_descriptor(&mut self, command: Command) {
        match self.descriptor.line(command) {
            Ok(line) => self.responses.fill(command, line),
            // Checked when the descriptor was built.
            Err(_) => log::warn!("Descriptor does not fit a line"),
        }
    }

    fn reset(&mut self) {
        log::info!("Reset: clearing game state");
        self.store.clear();
        self.demo.disable();
        self.trigger_pending = false;
        self.triggered_since_report = false;
        self.phase = Phase::WaitingForInit;
        self.reply_descriptor(Command::Reset);
    }

    /// Write a state through the slot flip, applying a pending trigger
    fn commit_state(&mut self, mut state: GameState) {
        if self.trigger_pending {
            self.trigger_pending = false;
            state.strikes = state.strikes.saturating_add(1);
            if self.config.strike_policy == StrikePolicy::Explode {
                state.state = State::Exploded;
            }
        }
        self.store.write(state);
    }

    fn tick_demo(&mut self, now_millis: u64) {
        if let Some(state) = self.demo.tick(now_millis) {
            if self.trigger_pending {
                // The strike stays with the demo game instead of one write.
                self.trigger_pending = false;
                self.demo.add_strike();
                let mut state = self.demo.tick(now_millis).unwrap_or(state);
                if self.config.strike_policy == StrikePolicy::Explode {
                    state.state = State::Exploded;
                }
                self.store.write(state);
                return;
            }
            if state != self.store.game_state() {
                self.store.write(state);
            }
        }
    }

    fn report_code(&mut self) -> u8 {
        let code = if self.triggered_since_report {
            ModuleReport::TRIGGERED
        } else {
            match self.my_state {
                ModuleState::Deactivated => 0,
                ModuleState::Active => ModuleReport::ARMED,
            }
        };
        self.triggered_since_report = false;
        code
    }

    /// True if the game state changed since the previous call
    pub fn update_state(&mut self) -> bool {
        self.store.update_state()
    }

    /// Copy of the current game state
    pub fn game_state(&self) -> GameState {
        self.store.game_state()
    }

    pub fn my_state(&self) -> ModuleState {
        self.my_state
    }

    pub fn set_my_state(&mut self, state: ModuleState) {
        self.my_state = state;
    }

    pub fn set_armed(&mut self) {
        self.set_my_state(ModuleState::Active);
    }

    pub fn set_disarmed(&mut self) {
        self.set_my_state(ModuleState::Deactivated);
    }

    /// Register a wrong move; ignored while the module is disarmed
    pub fn trigger(&mut self) {
        if self.my_state == ModuleState::Deactivated {
            return;
        }
        log::debug!("Triggered");
        self.trigger_pending = true;
        self.triggered_since_report = true;
    }

    pub fn trigger_pending(&self) -> bool {
        self.trigger_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::StepClock;
    use crate::descriptor::FeatureTag;
    use crate::link::LoopbackLink;

    const FEATURES: [FeatureTag<'static>; 1] = [FeatureTag::new("LED", "4")];

    fn module(framer: &LineFramer) -> DefuseModule<'_> {
        let descriptor = ModuleDescriptor::new("wires", &FEATURES).unwrap();
        let config = ModuleConfig {
            demo: DemoConfig {
                grace_millis: None,
                ..DemoConfig::default()
            },
            ..ModuleConfig::default()
        };
        let mut m = DefuseModule::new(framer, descriptor, config);
        m.phase = Phase::Running;
        m
    }

    fn status(time: i32, state: u8, strikes: u8) -> Vec<u8> {
        let state = GameState {
            countdown_millis: time,
            state: State::from_code(state as i32).unwrap(),
            strikes,
        };
        Line::game_status(&state).as_bytes().to_vec()
    }

    #[test]
    fn test_game_status_updates_once() {
        let framer = LineFramer::new();
        let mut m = module(&framer);
        let mut link = LoopbackLink::new();

        link.queue_line(&status(5000, 1, 0));
        assert_eq!(m.service(&mut link, 0), Some(Command::GameStatus));
        assert!(m.update_state());
        assert_eq!(
            m.game_state(),
            GameState {
                countdown_millis: 5000,
                state: State::Active,
                strikes: 0
            }
        );
        assert!(!m.update_state());
        assert_eq!(link.take_sent(), b"\x83wires:state:1\n".to_vec());
    }

    #[test]
    fn test_malformed_status_is_discarded() {
        let framer = LineFramer::new();
        let mut m = module(&framer);
        let mut link = LoopbackLink::new();

        link.queue_line(&status(5000, 1, 0));
        m.service(&mut link, 0);
        m.update_state();

        link.queue_line(b"\x83time:1 state:9 strikes:0");
        link.queue_line(b"\x83time:1");
        m.service(&mut link, 0);
        m.service(&mut link, 0);
        assert!(!m.update_state());
        assert_eq!(m.game_state().countdown_millis, 5000);
        assert_eq!(m.lines_discarded(), 2);
    }

    #[test]
    fn test_reset_clears_state_and_demo() {
        let framer = LineFramer::new();
        let mut m = module(&framer);
        let mut link = LoopbackLink::new();

        link.queue_line(&status(4000, 1, 2));
        m.service(&mut link, 0);
        m.start_demo(10);
        assert!(m.is_demo_mode());

        link.queue_line(b"\x84");
        assert_eq!(m.service(&mut link, 20), Some(Command::Reset));
        assert!(!m.is_demo_mode());
        assert_eq!(m.game_state(), GameState::CLEARED);
        assert_eq!(m.store.previous(), GameState::CLEARED);
        assert_eq!(m.phase(), Phase::WaitingForInit);
    }

    #[test]
    fn test_reset_leaves_following_lines_for_init() {
        let framer = LineFramer::new();
        let mut m = module(&framer);
        let mut link = LoopbackLink::new();
        let clock = StepClock::new(10);

        link.queue_line(b"\x84");
        link.queue_line(b"\x80");
        link.queue_line(b"level:2");
        assert_eq!(m.service(&mut link, 0), Some(Command::Reset));
        assert_eq!(m.phase(), Phase::WaitingForInit);
        assert_eq!(m.lines_handled(), 1);

        let mut tags = [TaggedValue::int("level")];
        m.wait_for_init(&mut link, &clock, &mut tags, Some(500))
            .unwrap();
        assert_eq!(tags[0].as_int(), Some(2));
        assert_eq!(m.phase(), Phase::Running);
        assert_eq!(
            link.take_sent(),
            b"\x84wires:LED:4\n\x80wires:LED:4\n".to_vec()
        );
    }

    #[test]
    fn test_trigger_while_disarmed_is_ignored() {
        let framer = LineFramer::new();
        let mut m = module(&framer);
        let mut link = LoopbackLink::new();

        m.set_disarmed();
        m.trigger();
        assert!(!m.trigger_pending());
        link.queue_line(&status(3000, 1, 0));
        m.service(&mut link, 0);
        assert_eq!(m.game_state().strikes, 0);
        assert_eq!(link.take_sent(), b"\x83wires:state:0\n".to_vec());
    }

    #[test]
    fn test_trigger_escalates_next_status() {
        let framer = LineFramer::new();
        let mut m = module(&framer);
        let mut link = LoopbackLink::new();

        m.trigger();
        link.queue_line(&status(3000, 1, 0));
        m.service(&mut link, 0);
        assert_eq!(m.game_state().strikes, 1);
        assert_eq!(m.game_state().state, State::Active);
        assert_eq!(link.take_sent(), b"\x83wires:state:2\n".to_vec());

        // Consumed by that write
        link.queue_line(&status(2900, 1, 0));
        m.service(&mut link, 0);
        assert_eq!(m.game_state().strikes, 0);
        assert_eq!(link.take_sent(), b"\x83wires:state:1\n".to_vec());
    }

    #[test]
    fn test_trigger_explode_policy() {
        let framer = LineFramer::new();
        let mut m = module(&framer);
        m.config.strike_policy = StrikePolicy::Explode;
        let mut link = LoopbackLink::new();

        m.trigger();
        link.queue_line(&status(3000, 1, 0));
        m.service(&mut link, 0);
        assert_eq!(m.game_state().state, State::Exploded);
        assert_eq!(m.game_state().strikes, 1);
    }

    #[test]
    fn test_enumerate_answered_while_running() {
        let framer = LineFramer::new();
        let mut m = module(&framer);
        let mut link = LoopbackLink::new();

        link.queue_line(b"\x80");
        link.queue_line(b"\x81");
        m.service(&mut link, 0);
        assert_eq!(
            link.take_sent(),
            b"\x80wires:LED:4\n\x81wires:LED:4\n".to_vec()
        );
    }

    #[test]
    fn test_demo_mode_after_grace() {
        let framer = LineFramer::new();
        let mut m = module(&framer);
        m.demo = DemoTimer::new(DemoConfig {
            grace_millis: Some(1_000),
            ..DemoConfig::default()
        });
        let mut link = LoopbackLink::new();

        m.service(&mut link, 500);
        assert!(!m.is_demo_mode());
        m.service(&mut link, 1_000);
        assert!(m.is_demo_mode());
        assert!(m.update_state());
        assert_eq!(m.game_state().state, State::Active);

        // Controller traffic takes over
        link.queue_line(&status(100, 1, 0));
        m.service(&mut link, 1_100);
        assert!(!m.is_demo_mode());
        assert_eq!(m.game_state().countdown_millis, 100);
    }

    #[test]
    fn test_trigger_in_demo_mode() {
        let framer = LineFramer::new();
        let mut m = module(&framer);
        let mut link = LoopbackLink::new();

        m.start_demo(0);
        let before = m.game_state().strikes;
        m.trigger();
        m.service(&mut link, 10);
        assert_eq!(m.game_state().strikes, before + 1);
        assert!(!m.trigger_pending());
        // Sticks on later ticks
        m.service(&mut link, 20);
        assert_eq!(m.game_state().strikes, before + 1);
    }
}
