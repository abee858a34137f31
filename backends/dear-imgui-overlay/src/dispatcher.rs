//! Single entry point for host input
//!
//! Keys first update the chord-tracking set and are checked against the
//! toggle tables; a chord hit short-circuits the whole dispatch. Everything
//! else fans out to the contexts in creation order until one claims it.

use std::cell::RefCell;

use crate::command::GlobalCommand;
use crate::key::{HostKey, InputEventKind};
use crate::registry::ContextRegistry;
use crate::runtime::Runtime;
use crate::settings::{KeyPair, OverlaySettings};

/// Outcome of dispatching one key event
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyDispatch {
    /// A chord fired; no context saw the key
    Command(GlobalCommand),
    Claimed,
    Unclaimed,
}

impl KeyDispatch {
    /// Whether the host should consider the event handled
    pub fn is_claimed(self) -> bool {
        !matches!(self, KeyDispatch::Unclaimed)
    }
}

/// Chord tables and the keys currently held, as seen by the chord detector
pub struct InputDispatcher {
    chords: Vec<(GlobalCommand, Vec<KeyPair>)>,
    pressed: RefCell<Vec<HostKey>>,
}

impl InputDispatcher {
    pub fn new(settings: &OverlaySettings) -> Self {
        let mut chords = Vec::with_capacity(3);
        if settings.include_demos {
            chords.push((GlobalCommand::ToggleDemos, settings.toggle_demos.clone()));
        }
        chords.push((GlobalCommand::ToggleVisibility, settings.toggle_visibility.clone()));
        chords.push((GlobalCommand::ToggleControls, settings.toggle_controls.clone()));
        Self {
            chords,
            pressed: RefCell::new(Vec::new()),
        }
    }

    /// Keys held according to the chord detector
    pub fn pressed(&self) -> Vec<HostKey> {
        self.pressed.borrow().clone()
    }

    /// Track `key` and return the command its chord fires, if any
    pub fn chord(&self, key: HostKey, event: InputEventKind) -> Option<GlobalCommand> {
        let mut pressed = self.pressed.borrow_mut();
        if event.is_press_like() {
            if !pressed.contains(&key) {
                pressed.push(key);
            }
        } else {
            pressed.retain(|held| *held != key);
        }

        if !event.is_chord_edge() {
            return None;
        }
        self.chords.iter().find_map(|(command, pairs)| {
            pairs
                .iter()
                .any(|pair| pair.contains(key) && pair.matches(&pressed))
                .then_some(*command)
        })
    }

    pub fn route_key<R: Runtime>(
        &self,
        registry: &ContextRegistry<R>,
        key: HostKey,
        event: InputEventKind,
        uppercase: bool,
    ) -> KeyDispatch {
        if let Some(command) = self.chord(key, event) {
            tracing::debug!(target: "dear-imgui-overlay", "Chord {:?} fired {}", key, command);
            return KeyDispatch::Command(command);
        }
        let claimed = registry.snapshot().iter().any(|handle| {
            handle
                .try_borrow_mut()
                .is_some_and(|mut context| context.route_key(key, event, uppercase))
        });
        if claimed {
            KeyDispatch::Claimed
        } else {
            KeyDispatch::Unclaimed
        }
    }

    pub fn route_axis<R: Runtime>(&self, registry: &ContextRegistry<R>, key: HostKey, delta: f32) -> bool {
        registry.snapshot().iter().any(|handle| {
            handle
                .try_borrow_mut()
                .is_some_and(|mut context| context.route_axis(key, delta))
        })
    }

    /// Offer the host cursor to every context; runs even without movement
    /// so capture can be handed back
    pub fn route_cursor<R: Runtime>(&self, registry: &ContextRegistry<R>) -> bool {
        registry.snapshot().iter().any(|handle| {
            handle
                .try_borrow_mut()
                .is_some_and(|mut context| context.route_cursor())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_key_chord_fires_on_press_only() {
        let dispatcher = InputDispatcher::new(&OverlaySettings::default());
        assert_eq!(
            dispatcher.chord(HostKey::Home, InputEventKind::Pressed),
            Some(GlobalCommand::ToggleVisibility)
        );
        assert_eq!(dispatcher.chord(HostKey::Home, InputEventKind::Repeat), None);
        assert_eq!(dispatcher.chord(HostKey::Home, InputEventKind::Released), None);
        assert!(dispatcher.pressed().is_empty());
    }

    #[test]
    fn two_key_chord_needs_both_held() {
        let dispatcher = InputDispatcher::new(&OverlaySettings::default());
        assert_eq!(dispatcher.chord(HostKey::GamepadDPadUp, InputEventKind::Pressed), None);
        dispatcher.chord(HostKey::GamepadDPadUp, InputEventKind::Released);

        assert_eq!(dispatcher.chord(HostKey::GamepadSpecialLeft, InputEventKind::Pressed), None);
        assert_eq!(
            dispatcher.chord(HostKey::GamepadDPadUp, InputEventKind::Pressed),
            Some(GlobalCommand::ToggleControls)
        );
        assert_eq!(
            dispatcher.pressed(),
            vec![HostKey::GamepadSpecialLeft, HostKey::GamepadDPadUp]
        );
    }

    #[test]
    fn tables_are_checked_in_order() {
        let settings = OverlaySettings {
            toggle_visibility: vec![KeyPair::single(HostKey::F1)],
            toggle_controls: vec![KeyPair::single(HostKey::F1)],
            ..OverlaySettings::default()
        };
        let dispatcher = InputDispatcher::new(&settings);
        assert_eq!(
            dispatcher.chord(HostKey::F1, InputEventKind::DoubleClick),
            Some(GlobalCommand::ToggleVisibility)
        );
    }

    #[test]
    fn demo_chord_is_dropped_without_demos() {
        let settings = OverlaySettings {
            include_demos: false,
            ..OverlaySettings::default()
        };
        let dispatcher = InputDispatcher::new(&settings);
        assert_eq!(dispatcher.chord(HostKey::PageUp, InputEventKind::Pressed), None);
    }
}
