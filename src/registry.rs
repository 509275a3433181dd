//! Team registry
//!
//! Maps team numbers to their [`HealthRecord`]. Every read and write goes
//! through one lock, so a snapshot never observes a record mid-update.

use crate::error::{RegistryError, RegistryResult};
use crate::health::HealthRecord;
use crate::tokens::TeamId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Outcome of [`TeamRegistry::insert_or_update_address`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    /// No record existed; a new one was created for this registration
    Inserted { generation: u64 },
    /// The existing record's address was replaced
    Updated,
}

impl Upsert {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Upsert::Inserted { .. })
    }
}

#[derive(Default)]
struct Inner {
    records: HashMap<TeamId, HealthRecord>,
    next_generation: u64,
}

impl Inner {
    /// Record belonging to the given registration of `team`
    fn current_mut(&mut self, team: TeamId, generation: u64) -> RegistryResult<&mut HealthRecord> {
        self.records
            .get_mut(&team)
            .filter(|r| r.generation == generation)
            .ok_or(RegistryError::NoSuchTeam(team))
    }
}

/// Concurrency-safe store of team health records
#[derive(Default)]
pub struct TeamRegistry {
    inner: RwLock<Inner>,
}

impl TeamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record for `team`, or replace only the address of the
    /// existing one. Status and message of an existing record are kept.
    pub fn insert_or_update_address(&self, team: TeamId, address: String) -> Upsert {
        let mut inner = self.inner.write();
        if let Some(record) = inner.records.get_mut(&team) {
            debug!(team = %team, address = %address, "Updating team address");
            record.address = address;
            return Upsert::Updated;
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner
            .records
            .insert(team, HealthRecord::new(address, generation));
        Upsert::Inserted { generation }
    }

    /// Full record for one team, message included
    pub fn get(&self, team: TeamId) -> Option<HealthRecord> {
        self.inner.read().records.get(&team).cloned()
    }

    /// Copy of every record, messages included
    pub fn snapshot(&self) -> HashMap<TeamId, HealthRecord> {
        self.inner.read().records.clone()
    }

    /// Every record keyed by decimal team number, with messages stripped so
    /// that listing all teams does not reveal what each team serves
    pub fn public_listing(&self) -> BTreeMap<String, HealthRecord> {
        self.inner
            .read()
            .records
            .iter()
            .map(|(team, record)| (team.to_string(), record.without_message()))
            .collect()
    }

    /// Remove the record for `team`; no-op if there is none
    pub fn remove(&self, team: TeamId) -> Option<HealthRecord> {
        self.inner.write().records.remove(&team)
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Address the monitor for this registration should poll
    pub fn address_for(&self, team: TeamId, generation: u64) -> RegistryResult<String> {
        self.inner
            .read()
            .records
            .get(&team)
            .filter(|r| r.generation == generation)
            .map(|r| r.address.clone())
            .ok_or(RegistryError::NoSuchTeam(team))
    }

    /// Record a successful poll. Fails with `NoSuchTeam` instead of creating
    /// a record if the registration is gone.
    pub fn set_status_ok(&self, team: TeamId, generation: u64, message: String) -> RegistryResult<()> {
        self.inner
            .write()
            .current_mut(team, generation)?
            .record_ok(message);
        Ok(())
    }

    /// Record a failed poll. Fails with `NoSuchTeam` instead of creating a
    /// record if the registration is gone.
    pub fn set_status_error(&self, team: TeamId, generation: u64, reason: String) -> RegistryResult<()> {
        self.inner
            .write()
            .current_mut(team, generation)?
            .record_error(reason);
        Ok(())
    }
}
