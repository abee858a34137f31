//! Global console-style actions

use std::fmt;
use std::str::FromStr;

const PREFIX: &str = "Overlay.";

/// Action shared by the console surface and the chord tables
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GlobalCommand {
    /// Create or release the "Demos" context
    ToggleDemos,
    ToggleVisibility,
    ToggleControls,
}

impl GlobalCommand {
    pub const ALL: [GlobalCommand; 3] = [
        GlobalCommand::ToggleDemos,
        GlobalCommand::ToggleVisibility,
        GlobalCommand::ToggleControls,
    ];

    /// Console name, e.g. `Overlay.ToggleDemos`
    pub fn name(self) -> &'static str {
        match self {
            GlobalCommand::ToggleDemos => "Overlay.ToggleDemos",
            GlobalCommand::ToggleVisibility => "Overlay.ToggleVisibility",
            GlobalCommand::ToggleControls => "Overlay.ToggleControls",
        }
    }
}

impl fmt::Display for GlobalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name that matches no command
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Unknown overlay command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for GlobalCommand {
    type Err = UnknownCommand;

    /// Case-insensitive, with or without the `Overlay.` prefix
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bare = match trimmed.get(..PREFIX.len()) {
            Some(head) if head.eq_ignore_ascii_case(PREFIX) => &trimmed[PREFIX.len()..],
            _ => trimmed,
        };
        GlobalCommand::ALL
            .into_iter()
            .find(|command| command.name()[PREFIX.len()..].eq_ignore_ascii_case(bare))
            .ok_or_else(|| UnknownCommand(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_prefix() {
        assert_eq!("Overlay.ToggleDemos".parse(), Ok(GlobalCommand::ToggleDemos));
        assert_eq!("overlay.togglevisibility".parse(), Ok(GlobalCommand::ToggleVisibility));
        assert_eq!(" ToggleControls ".parse(), Ok(GlobalCommand::ToggleControls));
        assert!("Overlay.Toggle".parse::<GlobalCommand>().is_err());
        assert!("".parse::<GlobalCommand>().is_err());
    }

    #[test]
    fn names_round_trip() {
        for command in GlobalCommand::ALL {
            assert_eq!(command.to_string().parse(), Ok(command));
        }
    }
}
