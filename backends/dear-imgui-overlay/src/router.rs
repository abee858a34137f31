//! Per-context input arbitration
//!
//! Every physical key is in one of three states for a context: unheld, held
//! by the immediate-mode layer (the API side) or held by the host (the engine
//! side). A key pressed on one side is released on that same side, so neither
//! the immediate-mode layer nor the host ever sees a key stuck down.

use std::collections::HashMap;
use std::rc::Rc;

use crate::geometry::Geometry;
use crate::host::{CaptorId, InputHost};
use crate::key::{ApiKey, HostKey, InputEventKind, KeyRemap, classify, keypad_char};
use crate::runtime::{InputEvent, Runtime};

/// Who currently holds a key
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyHold {
    /// Claimed by the immediate-mode layer, with the id it was pressed as
    Api(ApiKey),
    /// Left to the host
    Engine,
}

/// Host widget flavor of a context, which decides cursor capture policy
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContextKind {
    /// Inside a running game viewport that has keyboard focus
    Gameplay,
    /// Anywhere else, e.g. editor panels
    Editor,
}

/// Snapshot of the conditions under which a context may claim input
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RouteGate {
    pub visible: bool,
    pub controls: bool,
    pub focused: bool,
}

impl RouteGate {
    /// Gate that rejects everything
    pub const CLOSED: RouteGate = RouteGate {
        visible: false,
        controls: false,
        focused: false,
    };

    /// Pointer motion only needs visibility and controls; every other key
    /// also needs focus
    pub fn permits(&self, key: HostKey) -> bool {
        self.visible && self.controls && (self.focused || key == HostKey::Mouse2D)
    }
}

/// Key, axis and cursor router of one context
pub struct InputRouter {
    remap: KeyRemap,
    holds: HashMap<HostKey, KeyHold>,
    input: Rc<dyn InputHost>,
    captor: Option<CaptorId>,
}

impl InputRouter {
    pub fn new(input: Rc<dyn InputHost>, remap: KeyRemap) -> Self {
        Self {
            remap,
            holds: HashMap::new(),
            input,
            captor: None,
        }
    }

    /// Current holder of `key`
    pub fn hold(&self, key: HostKey) -> Option<KeyHold> {
        self.holds.get(&key).copied()
    }

    /// Keys held by the immediate-mode layer
    pub fn api_held(&self) -> impl Iterator<Item = HostKey> + '_ {
        self.holds
            .iter()
            .filter(|(_, hold)| matches!(hold, KeyHold::Api(_)))
            .map(|(key, _)| *key)
    }

    /// Widget whose mouse capture was taken, if any
    pub fn stolen_captor(&self) -> Option<CaptorId> {
        self.captor
    }

    /// Route one key event; true if the immediate-mode layer claimed it
    pub fn route_key<R: Runtime>(
        &mut self,
        runtime: &mut R,
        gate: &RouteGate,
        key: HostKey,
        event: InputEventKind,
        uppercase: bool,
    ) -> bool {
        let remapped = self.remap.apply(key);
        let api = if gate.permits(remapped) {
            classify(remapped)
        } else {
            None
        };

        // Holds are keyed by the physical key; the remapped id lives in the hold.
        let Some(api) = api else {
            self.release_api_hold(runtime, key);
            self.track_engine(key, event);
            return false;
        };

        if self.hold(key) == Some(KeyHold::Engine) {
            // Pressed before routing was permitted; stays with the host until released.
            self.track_engine(key, event);
            return false;
        }

        let down = event.is_press_like();
        let api = if down {
            self.holds.insert(key, KeyHold::Api(api));
            api
        } else {
            match self.holds.remove(&key) {
                Some(KeyHold::Api(held)) => held,
                _ => api,
            }
        };

        let input = match api {
            ApiKey::Mouse(button) => InputEvent::MouseButton { button, down },
            ApiKey::Modifier(modifier) => InputEvent::Modifier { modifier, down },
            ApiKey::Key(im_key) => {
                let text = (down && !runtime.is_modifier_down() && runtime.want_text_input())
                    .then(|| self.char_for(remapped))
                    .flatten();
                match text {
                    Some(ch) => InputEvent::Char(apply_case(ch, uppercase)),
                    None => InputEvent::Key { key: im_key, down },
                }
            }
        };
        tracing::trace!(target: "dear-imgui-overlay", "Routed {:?} {:?} as {:?}", key, event, input);
        runtime.push_event(input);
        true
    }

    /// Route an axis event; only the mouse wheel is mapped
    pub fn route_axis<R: Runtime>(
        &mut self,
        runtime: &mut R,
        gate: &RouteGate,
        key: HostKey,
        delta: f32,
    ) -> bool {
        if key != HostKey::MouseWheelAxis || delta == 0.0 || !gate.permits(key) {
            return false;
        }
        runtime.push_event(InputEvent::MouseWheel([0.0, delta]));
        true
    }

    /// Route pointer motion, taking or restoring host mouse capture
    pub fn route_cursor<R: Runtime>(
        &mut self,
        runtime: &mut R,
        gate: &RouteGate,
        kind: ContextKind,
        geometry: &Geometry,
    ) -> bool {
        let gate_key = match kind {
            ContextKind::Editor => HostKey::Mouse2D,
            ContextKind::Gameplay => HostKey::AnyKey,
        };

        if gate.permits(gate_key) {
            if self.input.has_mouse_captor() {
                match kind {
                    ContextKind::Gameplay => {
                        if self.captor.is_none() {
                            self.captor = self.input.take_mouse_capture();
                        }
                    }
                    ContextKind::Editor => return false,
                }
            }

            if !self.input.has_mouse_captor() {
                let position = geometry.absolute_to_local(self.input.cursor_position());
                runtime.push_event(InputEvent::MousePos(position));
                return true;
            }
        }

        self.restore_captor();
        false
    }

    /// Release every API hold whose key the gate no longer permits
    pub fn release_unroutable<R: Runtime>(&mut self, runtime: &mut R, gate: &RouteGate) {
        let stale: Vec<HostKey> = self
            .api_held()
            .filter(|key| !gate.permits(self.remap.apply(*key)))
            .collect();
        for key in stale {
            self.release_api_hold(runtime, key);
        }
    }

    /// Hand mouse capture back to whoever held it before we took it
    pub fn restore_captor(&mut self) {
        if let Some(captor) = self.captor.take() {
            tracing::debug!(target: "dear-imgui-overlay", "Restoring mouse capture to {:?}", captor);
            self.input.restore_mouse_capture(captor);
        }
    }

    /// Drop an API hold, sending the matching release
    fn release_api_hold<R: Runtime>(&mut self, runtime: &mut R, key: HostKey) -> bool {
        let Some(KeyHold::Api(api)) = self.hold(key) else {
            return false;
        };
        self.holds.remove(&key);
        let release = match api {
            ApiKey::Mouse(button) => InputEvent::MouseButton { button, down: false },
            ApiKey::Modifier(modifier) => InputEvent::Modifier {
                modifier,
                down: false,
            },
            ApiKey::Key(im_key) => InputEvent::Key {
                key: im_key,
                down: false,
            },
        };
        tracing::trace!(target: "dear-imgui-overlay", "Released {:?} held by the overlay", key);
        runtime.push_event(release);
        true
    }

    fn track_engine(&mut self, key: HostKey, event: InputEventKind) {
        if event.is_press_like() {
            self.holds.insert(key, KeyHold::Engine);
        } else if self.hold(key) == Some(KeyHold::Engine) {
            self.holds.remove(&key);
        }
    }

    fn char_for(&self, key: HostKey) -> Option<char> {
        self.input.char_for_key(key).or_else(|| keypad_char(key))
    }
}

impl Drop for InputRouter {
    fn drop(&mut self) {
        self.restore_captor();
    }
}

fn apply_case(ch: char, uppercase: bool) -> char {
    let mapped: Vec<char> = if uppercase {
        ch.to_uppercase().collect()
    } else {
        ch.to_lowercase().collect()
    };
    match mapped.as_slice() {
        [single] => *single,
        _ => ch,
    }
}
