use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use wreckproto::UserId;

use crate::GameError;

/// One participant's durable economic record. Created on first `register`,
/// never deleted. `selected`, once set, never changes; `owned` only grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub balance: i64,
    #[serde(default)]
    pub owned: BTreeSet<String>,
    #[serde(default)]
    pub selected: Option<String>,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub last_beg_unix: Option<i64>,
}

impl ParticipantRecord {
    pub fn new(starting_balance: i64) -> Self {
        Self {
            balance: starting_balance,
            owned: BTreeSet::new(),
            selected: None,
            wins: 0,
            losses: 0,
            last_beg_unix: None,
        }
    }
}

/// The whole-document participant store. Every successful mutation rewrites
/// the backing file before reporting success; a failed write restores the
/// pre-mutation record so the in-memory view never drifts ahead of disk.
///
/// Callers hold this behind one `tokio::sync::Mutex` so concurrent commands
/// serialize their read-transform-write-persist cycles (the whole file is
/// replaced per write, so two racing writers would otherwise drop updates).
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    by_id: BTreeMap<UserId, ParticipantRecord>,
}

impl Ledger {
    /// A missing file is an empty ledger (first run); an unreadable or
    /// malformed file is `DataUnavailable`.
    pub fn load(path: PathBuf) -> Result<Self, GameError> {
        let by_id = match std::fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s)
                .map_err(|e| GameError::DataUnavailable(format!("parse {}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(GameError::DataUnavailable(format!(
                    "read {}: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self { path, by_id })
    }

    pub fn get(&self, id: &UserId) -> Option<&ParticipantRecord> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn register(
        &mut self,
        id: &UserId,
        starting_balance: i64,
    ) -> Result<ParticipantRecord, GameError> {
        if self.by_id.contains_key(id) {
            return Err(GameError::AlreadyRegistered);
        }
        let rec = ParticipantRecord::new(starting_balance);
        self.by_id.insert(id.clone(), rec.clone());
        if let Err(e) = self.save() {
            self.by_id.remove(id);
            return Err(GameError::DataUnavailable(format!("persist ledger: {e:#}")));
        }
        Ok(rec)
    }

    /// Read-modify-write one record and persist the whole document. The
    /// transform runs against a scratch copy: a domain error from `f` leaves
    /// both memory and disk untouched, and a failed persist rolls the record
    /// back and reports the mutation as not applied.
    pub fn mutate<F>(&mut self, id: &UserId, f: F) -> Result<ParticipantRecord, GameError>
    where
        F: FnOnce(&mut ParticipantRecord) -> Result<(), GameError>,
    {
        let prev = self.by_id.get(id).cloned().ok_or(GameError::NotRegistered)?;
        let mut next = prev.clone();
        f(&mut next)?;
        self.by_id.insert(id.clone(), next.clone());
        if let Err(e) = self.save() {
            self.by_id.insert(id.clone(), prev);
            return Err(GameError::DataUnavailable(format!("persist ledger: {e:#}")));
        }
        Ok(next)
    }

    fn save(&self) -> anyhow::Result<()> {
        let s = serde_json::to_string_pretty(&self.by_id)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, s).with_context(|| format!("write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }
}
