//! Page interaction observers
//!
//! Each interaction is a discrete action, so classification is immediate:
//! no smoothing and no grace period.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use violation_types::ViolationType;

/// Key press with modifier state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCombo {
    /// Key name as reported by the page ("c", "F12", "PrintScreen")
    pub key: String,
    pub ctrl: bool,
    /// Cmd on macOS
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyCombo {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Human-readable form, e.g. "Ctrl+Shift+I"
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl".to_string());
        }
        if self.meta {
            parts.push("Meta".to_string());
        }
        if self.alt {
            parts.push("Alt".to_string());
        }
        if self.shift {
            parts.push("Shift".to_string());
        }
        parts.push(self.key.clone());
        parts.join("+")
    }

    /// Classify a key combination
    pub fn classify(&self) -> Option<ViolationType> {
        let key = self.key.to_ascii_lowercase();
        let command = self.ctrl || self.meta;

        if key == "printscreen" || key == "print" {
            return Some(ViolationType::ScreenshotAttempt);
        }
        // macOS capture: Cmd+Shift+3/4/5
        if self.meta && self.shift && matches!(key.as_str(), "3" | "4" | "5") {
            return Some(ViolationType::ScreenshotAttempt);
        }
        if key == "f12" {
            return Some(ViolationType::KeyboardShortcut);
        }
        // Devtools: Ctrl+Shift+I/J/C (Cmd+Alt+I/J/C on macOS)
        if command && (self.shift || self.alt) && matches!(key.as_str(), "i" | "j" | "c") {
            return Some(ViolationType::KeyboardShortcut);
        }
        if command && matches!(key.as_str(), "c" | "v" | "x" | "a" | "s" | "p" | "u") {
            return Some(ViolationType::KeyboardShortcut);
        }

        None
    }
}

/// Page-level interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Page visibility changed
    Visibility { hidden: bool },
    Copy,
    Cut,
    Paste,
    ContextMenu,
    KeyDown(KeyCombo),
}

impl InputEvent {
    /// Map an interaction to a violation, if it is one
    pub fn classify(&self) -> Option<ViolationType> {
        match self {
            InputEvent::Visibility { hidden: true } => Some(ViolationType::TabChange),
            InputEvent::Visibility { hidden: false } => None,
            InputEvent::Copy | InputEvent::Cut => Some(ViolationType::CopyAttempt),
            InputEvent::Paste => Some(ViolationType::PasteAttempt),
            InputEvent::ContextMenu => Some(ViolationType::RightClick),
            InputEvent::KeyDown(combo) => combo.classify(),
        }
    }
}

/// A classified interaction ready for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct InputViolation {
    pub violation_type: ViolationType,
    pub details: Value,
}

/// Observer state for a session: the local tally and page metadata
#[derive(Debug, Clone, Default)]
pub struct InputObservers {
    user_agent: Option<String>,
    count: u32,
}

impl InputObservers {
    pub fn new(user_agent: Option<String>) -> Self {
        Self {
            user_agent,
            count: 0,
        }
    }

    /// Classify one interaction, counting it when it is a violation
    pub fn observe(&mut self, event: &InputEvent) -> Option<InputViolation> {
        let violation_type = event.classify()?;
        self.count += 1;
        debug!(%violation_type, count = self.count, "Input violation");

        let mut details = json!({ "userAgent": self.user_agent });
        if let InputEvent::KeyDown(combo) = event {
            details["key"] = json!(combo.label());
        }

        Some(InputViolation {
            violation_type,
            details,
        })
    }

    /// Local, advisory violation count
    pub fn count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_mapping() {
        assert_eq!(
            InputEvent::Visibility { hidden: true }.classify(),
            Some(ViolationType::TabChange)
        );
        assert_eq!(InputEvent::Visibility { hidden: false }.classify(), None);
        assert_eq!(InputEvent::Copy.classify(), Some(ViolationType::CopyAttempt));
        assert_eq!(InputEvent::Cut.classify(), Some(ViolationType::CopyAttempt));
        assert_eq!(InputEvent::Paste.classify(), Some(ViolationType::PasteAttempt));
        assert_eq!(InputEvent::ContextMenu.classify(), Some(ViolationType::RightClick));
    }

    #[test]
    fn test_key_combinations() {
        let shortcut = Some(ViolationType::KeyboardShortcut);
        let screenshot = Some(ViolationType::ScreenshotAttempt);

        assert_eq!(KeyCombo::new("c").ctrl().classify(), shortcut);
        assert_eq!(KeyCombo::new("A").meta().classify(), shortcut);
        assert_eq!(KeyCombo::new("F12").classify(), shortcut);
        assert_eq!(KeyCombo::new("I").ctrl().shift().classify(), shortcut);
        assert_eq!(KeyCombo::new("PrintScreen").classify(), screenshot);
        assert_eq!(KeyCombo::new("4").meta().shift().classify(), screenshot);

        assert_eq!(KeyCombo::new("c").classify(), None);
        assert_eq!(KeyCombo::new("Enter").ctrl().classify(), None);
        assert_eq!(KeyCombo::new("4").shift().classify(), None);
    }

    #[test]
    fn test_observe_counts_and_attaches_details() {
        let mut observers = InputObservers::new(Some("test-agent".into()));

        assert!(observers.observe(&InputEvent::Visibility { hidden: false }).is_none());
        assert_eq!(observers.count(), 0);

        let v = observers
            .observe(&InputEvent::KeyDown(KeyCombo::new("s").ctrl()))
            .unwrap();
        assert_eq!(v.violation_type, ViolationType::KeyboardShortcut);
        assert_eq!(v.details["key"], "Ctrl+s");
        assert_eq!(v.details["userAgent"], "test-agent");

        observers.observe(&InputEvent::ContextMenu);
        assert_eq!(observers.count(), 2);
    }
}
