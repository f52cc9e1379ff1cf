//! Discrete (boolean) safety and control channels.
//!
//! The set of channels is closed: a stand has ten numbered valve switches,
//! a continuity indicator, the launch-enable key and the abort line.
//! [`DiscreteChannelSet`] carries one named `bool` per channel, so an
//! unknown channel name can never be admitted into the state -- it has to
//! be rejected where text is parsed.
//!
//! Polarity: `true` means "Open" / "ENABLE" / active, `false` means
//! "Close" / "DISABLE" / inactive. Dashboard colour coding depends on this
//! mapping.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One named discrete channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiscreteChannel {
    /// Valve switch 1.
    Switch1,
    /// Valve switch 2.
    Switch2,
    /// Valve switch 3.
    Switch3,
    /// Valve switch 4.
    Switch4,
    /// Valve switch 5.
    Switch5,
    /// Valve switch 6.
    Switch6,
    /// Valve switch 7.
    Switch7,
    /// Valve switch 8.
    Switch8,
    /// Valve switch 9.
    Switch9,
    /// Valve switch 10.
    Switch10,
    /// Igniter circuit continuity (derived from an analog threshold).
    Continuity,
    /// Launch-enable key.
    LaunchKey,
    /// Abort line.
    Abort,
}

impl DiscreteChannel {
    /// Every channel, in wire order.
    pub const ALL: [Self; 13] = [
        Self::Switch1,
        Self::Switch2,
        Self::Switch3,
        Self::Switch4,
        Self::Switch5,
        Self::Switch6,
        Self::Switch7,
        Self::Switch8,
        Self::Switch9,
        Self::Switch10,
        Self::Continuity,
        Self::LaunchKey,
        Self::Abort,
    ];

    /// The numbered valve switches only.
    pub const SWITCHES: [Self; 10] = [
        Self::Switch1,
        Self::Switch2,
        Self::Switch3,
        Self::Switch4,
        Self::Switch5,
        Self::Switch6,
        Self::Switch7,
        Self::Switch8,
        Self::Switch9,
        Self::Switch10,
    ];

    /// Look up a numbered switch. Returns `None` for numbers the stand
    /// does not have (including 0).
    pub const fn switch(number: u32) -> Option<Self> {
        match number {
            1 => Some(Self::Switch1),
            2 => Some(Self::Switch2),
            3 => Some(Self::Switch3),
            4 => Some(Self::Switch4),
            5 => Some(Self::Switch5),
            6 => Some(Self::Switch6),
            7 => Some(Self::Switch7),
            8 => Some(Self::Switch8),
            9 => Some(Self::Switch9),
            10 => Some(Self::Switch10),
            _ => None,
        }
    }

    /// Name used for this channel on the wire.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Switch1 => "switch1",
            Self::Switch2 => "switch2",
            Self::Switch3 => "switch3",
            Self::Switch4 => "switch4",
            Self::Switch5 => "switch5",
            Self::Switch6 => "switch6",
            Self::Switch7 => "switch7",
            Self::Switch8 => "switch8",
            Self::Switch9 => "switch9",
            Self::Switch10 => "switch10",
            Self::Continuity => "continuity",
            Self::LaunchKey => "launchKey",
            Self::Abort => "abort",
        }
    }
}

impl core::fmt::Display for DiscreteChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Full discrete state of the stand: one value per [`DiscreteChannel`].
///
/// Every channel always has a value; a fresh set is all `false`. The type
/// is `Copy` so readers always receive a value copy, never a reference
/// into shared state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DiscreteChannelSet {
    /// Valve switch 1.
    pub switch1: bool,
    /// Valve switch 2.
    pub switch2: bool,
    /// Valve switch 3.
    pub switch3: bool,
    /// Valve switch 4.
    pub switch4: bool,
    /// Valve switch 5.
    pub switch5: bool,
    /// Valve switch 6.
    pub switch6: bool,
    /// Valve switch 7.
    pub switch7: bool,
    /// Valve switch 8.
    pub switch8: bool,
    /// Valve switch 9.
    pub switch9: bool,
    /// Valve switch 10.
    pub switch10: bool,
    /// Igniter circuit continuity.
    pub continuity: bool,
    /// Launch-enable key (`true` = ENABLE FIRE).
    pub launch_key: bool,
    /// Abort line (`true` = ABORT Open).
    pub abort: bool,
}

impl DiscreteChannelSet {
    /// A set with every channel `false`.
    pub const fn new() -> Self {
        Self {
            switch1: false,
            switch2: false,
            switch3: false,
            switch4: false,
            switch5: false,
            switch6: false,
            switch7: false,
            switch8: false,
            switch9: false,
            switch10: false,
            continuity: false,
            launch_key: false,
            abort: false,
        }
    }

    /// Read one channel.
    pub const fn get(&self, channel: DiscreteChannel) -> bool {
        match channel {
            DiscreteChannel::Switch1 => self.switch1,
            DiscreteChannel::Switch2 => self.switch2,
            DiscreteChannel::Switch3 => self.switch3,
            DiscreteChannel::Switch4 => self.switch4,
            DiscreteChannel::Switch5 => self.switch5,
            DiscreteChannel::Switch6 => self.switch6,
            DiscreteChannel::Switch7 => self.switch7,
            DiscreteChannel::Switch8 => self.switch8,
            DiscreteChannel::Switch9 => self.switch9,
            DiscreteChannel::Switch10 => self.switch10,
            DiscreteChannel::Continuity => self.continuity,
            DiscreteChannel::LaunchKey => self.launch_key,
            DiscreteChannel::Abort => self.abort,
        }
    }

    /// Write one channel. Returns the previous value.
    pub const fn set(&mut self, channel: DiscreteChannel, value: bool) -> bool {
        let slot = match channel {
            DiscreteChannel::Switch1 => &mut self.switch1,
            DiscreteChannel::Switch2 => &mut self.switch2,
            DiscreteChannel::Switch3 => &mut self.switch3,
            DiscreteChannel::Switch4 => &mut self.switch4,
            DiscreteChannel::Switch5 => &mut self.switch5,
            DiscreteChannel::Switch6 => &mut self.switch6,
            DiscreteChannel::Switch7 => &mut self.switch7,
            DiscreteChannel::Switch8 => &mut self.switch8,
            DiscreteChannel::Switch9 => &mut self.switch9,
            DiscreteChannel::Switch10 => &mut self.switch10,
            DiscreteChannel::Continuity => &mut self.continuity,
            DiscreteChannel::LaunchKey => &mut self.launch_key,
            DiscreteChannel::Abort => &mut self.abort,
        };
        core::mem::replace(slot, value)
    }

    /// Iterate over `(channel, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (DiscreteChannel, bool)> + '_ {
        DiscreteChannel::ALL
            .into_iter()
            .map(move |channel| (channel, self.get(channel)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_set_is_all_false() {
        let set = DiscreteChannelSet::new();
        assert!(set.iter().all(|(_, value)| !value));
        assert_eq!(set, DiscreteChannelSet::default());
    }

    #[test]
    fn switch_lookup_rejects_unknown_numbers() {
        assert_eq!(DiscreteChannel::switch(1), Some(DiscreteChannel::Switch1));
        assert_eq!(DiscreteChannel::switch(10), Some(DiscreteChannel::Switch10));
        assert_eq!(DiscreteChannel::switch(0), None);
        assert_eq!(DiscreteChannel::switch(11), None);
        assert_eq!(DiscreteChannel::switch(99), None);
    }

    #[test]
    fn set_returns_previous_value() {
        let mut set = DiscreteChannelSet::new();
        assert!(!set.set(DiscreteChannel::Switch3, true));
        assert!(set.set(DiscreteChannel::Switch3, false));
        assert!(!set.get(DiscreteChannel::Switch3));
    }

    #[test]
    fn structural_equality_sees_single_channel() {
        let a = DiscreteChannelSet::new();
        let mut b = a;
        b.set(DiscreteChannel::Abort, true);
        assert_ne!(a, b);
        b.set(DiscreteChannel::Abort, false);
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_with_wire_names() {
        let mut set = DiscreteChannelSet::new();
        set.set(DiscreteChannel::LaunchKey, true);
        let json = serde_json::to_value(set).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), DiscreteChannel::ALL.len());
        for channel in DiscreteChannel::ALL {
            assert!(obj.contains_key(channel.wire_name()), "missing {channel}");
        }
        assert_eq!(json["launchKey"], true);
        assert_eq!(json["switch10"], false);
    }
}
