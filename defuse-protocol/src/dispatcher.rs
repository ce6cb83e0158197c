//! Interpretation of framed lines.

use crate::command::Command;
use crate::error::DispatchError;
use crate::line::Line;
use crate::state::{GameState, State};
use crate::tagged::TaggedValue;

/// Negotiation phase of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the controller to supply every requested value
    WaitingForInit,
    /// Configured; game status is applied
    Running,
}

/// What a line asks the module to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Plain `tag:value` line without a command byte
    Values,
    /// Answer with the module descriptor
    Describe(Command),
    /// Apply a new game state
    GameStatus(GameState),
    /// Clear game state and renegotiate
    Reset,
}

const TIME_TAG: &str = "time";
const STATE_TAG: &str = "state";
const STRIKES_TAG: &str = "strikes";

/// Parse `time:<ms> state:<0..3> strikes:<n>`; every field is required
pub fn parse_game_status(line: &Line) -> Result<GameState, DispatchError> {
    let command = Command::GameStatus;
    let mut fields = [
        TaggedValue::int(TIME_TAG),
        TaggedValue::int(STATE_TAG),
        TaggedValue::int(STRIKES_TAG),
    ];
    for fragment in line.fragments() {
        for field in fields.iter_mut() {
            if field.parse(fragment).is_ok() {
                break;
            }
        }
    }

    let mut values = [0i32; 3];
    for (value, field) in values.iter_mut().zip(&fields) {
        *value = field.as_int().ok_or(DispatchError::MissingField {
            command,
            tag: field.tag(),
        })?;
    }
    let [time, state, strikes] = values;

    let state = State::from_code(state).ok_or(DispatchError::InvalidField {
        command,
        tag: STATE_TAG,
    })?;
    let strikes = u8::try_from(strikes).map_err(|_| DispatchError::InvalidField {
        command,
        tag: STRIKES_TAG,
    })?;
    Ok(GameState {
        countdown_millis: time,
        state,
        strikes,
    })
}

/// Decide what `line` means in `phase`
pub fn classify(line: &Line, phase: Phase) -> Result<Action, DispatchError> {
    let Some(command) = line.command_kind() else {
        return Ok(Action::Values);
    };
    match command {
        Command::Enumerate | Command::Neighbour | Command::Settings => {
            Ok(Action::Describe(command))
        }
        Command::GameStatus => match phase {
            Phase::WaitingForInit => Err(DispatchError::WrongPhase(command)),
            Phase::Running => parse_game_status(line).map(Action::GameStatus),
        },
        Command::Reset => Ok(Action::Reset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_game_status() {
        let line = Line::from_bytes(b"\x83time:5000 state:1 strikes:0");
        assert_eq!(
            parse_game_status(&line),
            Ok(GameState {
                countdown_millis: 5000,
                state: State::Active,
                strikes: 0,
            })
        );
    }

    #[test]
    fn test_parse_game_status_any_order() {
        let line = Line::from_bytes(b"\x83strikes:2 state:2 time:-1");
        let state = parse_game_status(&line).unwrap();
        assert_eq!(state.countdown_millis, -1);
        assert_eq!(state.state, State::Exploded);
        assert_eq!(state.strikes, 2);
    }

    #[test]
    fn test_truncated_game_status() {
        let line = Line::from_bytes(b"\x83time:5000 state:1");
        assert_eq!(
            parse_game_status(&line),
            Err(DispatchError::MissingField {
                command: Command::GameStatus,
                tag: "strikes"
            })
        );
    }

    #[test]
    fn test_invalid_game_status_fields() {
        let bad_state = Line::from_bytes(b"\x83time:1 state:7 strikes:0");
        assert!(matches!(
            parse_game_status(&bad_state),
            Err(DispatchError::InvalidField { tag: "state", .. })
        ));
        let bad_strikes = Line::from_bytes(b"\x83time:1 state:1 strikes:300");
        assert!(matches!(
            parse_game_status(&bad_strikes),
            Err(DispatchError::InvalidField { tag: "strikes", .. })
        ));
        let garbage = Line::from_bytes(b"\x83time:abc state:1 strikes:0");
        assert!(parse_game_status(&garbage).is_err());
    }

    #[test]
    fn test_classify() {
        let plain = Line::from_bytes(b"sno:1");
        assert_eq!(classify(&plain, Phase::Running), Ok(Action::Values));

        let enumerate = Line::from_bytes(b"\x80");
        assert_eq!(
            classify(&enumerate, Phase::WaitingForInit),
            Ok(Action::Describe(Command::Enumerate))
        );

        let status = Line::from_bytes(b"\x83time:1 state:1 strikes:0");
        assert_eq!(
            classify(&status, Phase::WaitingForInit),
            Err(DispatchError::WrongPhase(Command::GameStatus))
        );
        assert!(matches!(
            classify(&status, Phase::Running),
            Ok(Action::GameStatus(_))
        ));

        let reset = Line::from_bytes(b"\x84");
        assert_eq!(classify(&reset, Phase::WaitingForInit), Ok(Action::Reset));
    }
}
