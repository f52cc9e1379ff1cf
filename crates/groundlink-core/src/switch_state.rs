//! Latest known discrete switch/safety state.
//!
//! The store is updated by newline-delimited text events from the switch
//! controller and read once per tick by the relay loop. It is an explicitly
//! constructed instance shared through [`Arc`](std::sync::Arc) between the
//! ingestion path (writer) and the tick loop (reader); readers always get a
//! value copy of the whole [`DiscreteChannelSet`].
//!
//! # Grammar
//!
//! | Line | Effect |
//! |------|--------|
//! | `<n> Open` | `switch<n>` = `true` |
//! | `<n> Close` | `switch<n>` = `false` |
//! | `ENABLE FIRE` / `DISABLE FIRE` | launch key `true` / `false` |
//! | `ABORT Open` / `ABORT Close` | abort `true` / `false` |
//!
//! Anything else, including a switch number the stand does not have, is
//! ignored. Malformed input is expected line noise and is never an error.

use groundlink_types::{DiscreteChannel, DiscreteChannelSet};
use tokio::sync::watch;
use tracing::trace;

/// One recognised discrete event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchEvent {
    /// Channel being updated.
    pub channel: DiscreteChannel,
    /// New value. `true` for Open / ENABLE.
    pub value: bool,
}

/// Parse one event line. Returns `None` for anything outside the grammar.
pub fn parse_event(raw: &str) -> Option<SwitchEvent> {
    let line = raw.trim();
    let event = |channel, value| Some(SwitchEvent { channel, value });

    match line {
        "ENABLE FIRE" => return event(DiscreteChannel::LaunchKey, true),
        "DISABLE FIRE" => return event(DiscreteChannel::LaunchKey, false),
        "ABORT Open" => return event(DiscreteChannel::Abort, true),
        "ABORT Close" => return event(DiscreteChannel::Abort, false),
        _ => {}
    }

    let (number, action) = line.split_once(char::is_whitespace)?;
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = match action.trim_start() {
        "Open" => true,
        "Close" => false,
        _ => return None,
    };
    // Digit strings too long for u32 cannot name a switch either.
    let channel = number.parse::<u32>().ok().and_then(DiscreteChannel::switch)?;
    event(channel, value)
}

/// Shared, injected holder of the current discrete state.
#[derive(Debug)]
pub struct SwitchStateStore {
    tx: watch::Sender<DiscreteChannelSet>,
}

impl SwitchStateStore {
    /// Create a store with every channel `false`.
    pub fn new() -> Self {
        Self::with_state(DiscreteChannelSet::new())
    }

    /// Create a store starting from an explicit state.
    pub fn with_state(initial: DiscreteChannelSet) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Apply one raw event line.
    ///
    /// Returns `true` if a channel actually changed value.
    pub fn apply_event(&self, raw: &str) -> bool {
        let Some(event) = parse_event(raw) else {
            trace!(line = raw, "Ignoring unrecognised switch event");
            return false;
        };
        self.apply(event)
    }

    /// Apply an already-parsed event. Returns `true` on a value change.
    pub fn apply(&self, event: SwitchEvent) -> bool {
        let changed = self
            .tx
            .send_if_modified(|state| state.set(event.channel, event.value) != event.value);
        if changed {
            trace!(channel = %event.channel, value = event.value, "Switch state changed");
        }
        changed
    }

    /// Value copy of the current state.
    pub fn current_state(&self) -> DiscreteChannelSet {
        *self.tx.borrow()
    }

    /// Receiver notified whenever the state changes.
    pub fn subscribe(&self) -> watch::Receiver<DiscreteChannelSet> {
        self.tx.subscribe()
    }
}

impl Default for SwitchStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn open_sets_true_close_sets_false() {
        let store = SwitchStateStore::new();
        assert!(store.apply_event("3 Open"));
        assert!(store.current_state().switch3);
        assert!(store.apply_event("3 Close"));
        assert!(!store.current_state().switch3);
    }

    #[test]
    fn unknown_switch_number_is_ignored() {
        let store = SwitchStateStore::new();
        let before = store.current_state();
        assert!(!store.apply_event("99 Open"));
        assert!(!store.apply_event("0 Open"));
        assert!(!store.apply_event("99999999999999999999 Open"));
        assert_eq!(store.current_state(), before);
    }

    #[test]
    fn blank_and_garbage_are_ignored() {
        let store = SwitchStateStore::new();
        let before = store.current_state();
        for line in ["", "   ", "garbage", "3", "3 open", "Open 3", "-3 Open", "3 Opened", "FIRE"] {
            assert!(!store.apply_event(line), "line {line:?} changed state");
        }
        assert_eq!(store.current_state(), before);
    }

    #[test]
    fn launch_key_round_trips() {
        let store = SwitchStateStore::new();
        let original = store.current_state().launch_key;
        store.apply_event("ENABLE FIRE");
        assert!(store.current_state().launch_key);
        store.apply_event("DISABLE FIRE");
        assert_eq!(store.current_state().launch_key, original);
    }

    #[test]
    fn abort_open_is_true() {
        let store = SwitchStateStore::new();
        store.apply_event("ABORT Open");
        assert!(store.current_state().abort);
        store.apply_event("ABORT Close");
        assert!(!store.current_state().abort);
    }

    #[test]
    fn surrounding_whitespace_and_crlf_are_tolerated() {
        let store = SwitchStateStore::new();
        store.apply_event("  7 Open\r");
        assert!(store.current_state().switch7);
        store.apply_event("ENABLE FIRE\r\n");
        assert!(store.current_state().launch_key);
    }

    #[test]
    fn repeated_event_reports_no_change() {
        let store = SwitchStateStore::new();
        assert!(store.apply_event("10 Open"));
        assert!(!store.apply_event("10 Open"));
    }

    #[test]
    fn current_state_is_a_copy() {
        let store = SwitchStateStore::new();
        let mut copy = store.current_state();
        copy.set(DiscreteChannel::Abort, true);
        assert!(!store.current_state().abort);
    }

    #[test]
    fn parse_event_grammar() {
        assert_eq!(
            parse_event("1 Open"),
            Some(SwitchEvent {
                channel: DiscreteChannel::Switch1,
                value: true
            })
        );
        assert_eq!(
            parse_event("10 Close"),
            Some(SwitchEvent {
                channel: DiscreteChannel::Switch10,
                value: false
            })
        );
        assert_eq!(parse_event("11 Open"), None);
        assert_eq!(parse_event("ABORT open"), None);
    }

    #[tokio::test]
    async fn subscribers_see_changes_from_another_task() {
        let store = Arc::new(SwitchStateStore::new());
        let mut rx = store.subscribe();

        let writer = Arc::clone(&store);
        tokio::spawn(async move {
            writer.apply_event("2 Open");
        })
        .await
        .unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow().switch2);
        assert!(store.current_state().switch2);
    }
}
