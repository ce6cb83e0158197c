//! Module descriptor: the name and features a module announces.

use core::fmt::Write;

use crate::command::Command;
use crate::error::ModuleError;
use crate::line::Line;

/// A capability advertised to neighbours, e.g. `LED` → `4`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureTag<'a> {
    pub name: &'a str,
    pub data: &'a str,
}

impl<'a> FeatureTag<'a> {
    pub const fn new(name: &'a str, data: &'a str) -> Self {
        FeatureTag { name, data }
    }
}

/// Name and feature list of this module
#[derive(Debug, Clone, Copy)]
pub struct ModuleDescriptor<'a> {
    name: &'a str,
    features: &'a [FeatureTag<'a>],
}

fn check_text(text: &str, what: &'static str) -> Result<(), ModuleError> {
    let bad = text
        .bytes()
        .any(|b| matches!(b, b':' | b',' | b' ' | b'\n' | b'\r') || !b.is_ascii());
    if bad {
        return Err(ModuleError::InvalidDescriptor(what));
    }
    Ok(())
}

impl<'a> ModuleDescriptor<'a> {
    /// Validate the descriptor; it must fit a single line behind any command byte
    pub fn new(name: &'a str, features: &'a [FeatureTag<'a>]) -> Result<Self, ModuleError> {
        if name.is_empty() {
            return Err(ModuleError::InvalidDescriptor("empty module name"));
        }
        check_text(name, "module name contains a separator")?;
        for feature in features {
            if feature.name.is_empty() {
                return Err(ModuleError::InvalidDescriptor("empty feature name"));
            }
            check_text(feature.name, "feature name contains a separator")?;
            check_text(feature.data, "feature data contains a separator")?;
        }
        let descriptor = ModuleDescriptor { name, features };
        let fits_status = Line::command(Command::GameStatus, |w| {
            write!(w, "{}:state:{}", name, ModuleReport::TRIGGERED)
        })
        .is_ok();
        if descriptor.line(Command::Enumerate).is_err() || !fits_status {
            return Err(ModuleError::InvalidDescriptor(
                "descriptor does not fit a line",
            ));
        }
        Ok(descriptor)
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn features(&self) -> &'a [FeatureTag<'a>] {
        self.features
    }

    /// `<cmd><name>:<feature>:<data>,<feature>:<data>...`
    pub fn line(&self, command: Command) -> Result<Line, core::fmt::Error> {
        Line::command(command, |w| {
            write!(w, "{}:", self.name)?;
            for (i, feature) in self.features.iter().enumerate() {
                if i > 0 {
                    w.write_char(',')?;
                }
                write!(w, "{}:{}", feature.name, feature.data)?;
            }
            Ok(())
        })
    }

    /// `<0x83><name>:state:<code>`, the module's answer to a game status
    pub fn status_line(&self, code: u8) -> Line {
        // Length was checked in `new`.
        Line::command(Command::GameStatus, |w| {
            write!(w, "{}:state:{}", self.name, code)
        })
        .unwrap_or_else(|_| Line::empty())
    }
}

/// A module's reply to a game status, as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleReport<'a> {
    pub name: &'a str,
    pub code: u8,
}

impl<'a> ModuleReport<'a> {
    /// Armed, nothing to report
    pub const ARMED: u8 = 1;
    /// Module was triggered since the last report
    pub const TRIGGERED: u8 = 2;

    pub fn parse(line: &'a Line) -> Option<Self> {
        if line.command_kind() != Some(Command::GameStatus) {
            return None;
        }
        let text = core::str::from_utf8(line.payload()).ok()?;
        let (name, rest) = text.split_once(':')?;
        let code = rest.strip_prefix("state:")?.trim().parse().ok()?;
        Some(ModuleReport { name, code })
    }
}
