use wreckproto::ChannelId;

use crate::catalog::ObjectDefinition;

/// The currently spawned, capturable wreck.
#[derive(Debug, Clone)]
pub struct Encounter {
    /// Monotonic spawn number. A victory claims the slot by `seq`, so a
    /// battle can only clear the exact spawn it fought.
    pub seq: u64,
    pub ship: ObjectDefinition,
    pub channel: ChannelId,
}

/// The single-slot active-encounter state: at most one unclaimed wreck per
/// community at any time. All access goes through these check-and-set
/// operations; nothing else may flip the slot.
#[derive(Debug, Default)]
pub struct EncounterSlot {
    current: Option<Encounter>,
    next_seq: u64,
}

impl EncounterSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn present(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Encounter> {
        self.current.as_ref()
    }

    /// Publish a new encounter. Refuses while the slot is occupied; the
    /// scheduler's recheck-after-jitter depends on this returning `None`
    /// rather than overwriting.
    pub fn publish(&mut self, ship: ObjectDefinition, channel: ChannelId) -> Option<&Encounter> {
        if self.current.is_some() {
            return None;
        }
        self.next_seq += 1;
        self.current = Some(Encounter {
            seq: self.next_seq,
            ship,
            channel,
        });
        self.current.as_ref()
    }

    /// Clear the slot iff it still holds spawn `seq`. Returns the captured
    /// encounter, or `None` when someone else already claimed it (or a newer
    /// spawn has replaced it).
    pub fn claim(&mut self, seq: u64) -> Option<Encounter> {
        match &self.current {
            Some(e) if e.seq == seq => self.current.take(),
            _ => None,
        }
    }
}
