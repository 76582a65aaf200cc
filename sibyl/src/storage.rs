//! Persistence for announced events and their attestations.
//!
//! The signer itself keeps no record of what it has attested to; an oracle
//! that signs two outcomes for the same event hands out its private key to
//! anyone holding both signatures. Flows that persist announcements through a
//! [`Storage`] get that guard: [`Storage::save_attestation`] refuses a second
//! attestation for an event.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use dlc_messages::oracle_msgs::{OracleAnnouncement, OracleAttestation};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub trait Storage {
    /// Save a new announcement, returning the event id it was stored under.
    /// An unattested event may be re-announced and is overwritten; fails with
    /// [`Error::AlreadyAttested`] once an attestation is recorded, so the
    /// guard below cannot be re-armed by replaying the announcement.
    fn save_announcement(&self, announcement: OracleAnnouncement) -> Result<String, Error>;

    /// Record the attestation for a previously announced event. Fails with
    /// [`Error::AlreadyAttested`] if the event already carries one.
    fn save_attestation(
        &self,
        event_id: &str,
        attestation: OracleAttestation,
    ) -> Result<OracleEventData, Error>;

    /// Get the stored data for the given event id.
    fn get_event(&self, event_id: &str) -> Result<Option<OracleEventData>, Error>;

    /// All stored events.
    fn list_events(&self) -> Result<Vec<OracleEventData>, Error>;
}

/// Data saved for an announced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleEventData {
    pub event_id: String,
    pub announcement: OracleAnnouncement,
    pub attestation: Option<OracleAttestation>,
}

#[derive(Debug, Clone)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, OracleEventData>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn save_announcement(&self, announcement: OracleAnnouncement) -> Result<String, Error> {
        let event_id = announcement.oracle_event.event_id.clone();
        let mut data = self
            .data
            .write()
            .map_err(|_| Error::Storage("poisoned lock".to_string()))?;
        if let Some(existing) = data.get(&event_id) {
            if existing.attestation.is_some() {
                return Err(Error::AlreadyAttested(event_id));
            }
        }
        data.insert(
            event_id.clone(),
            OracleEventData {
                event_id: event_id.clone(),
                announcement,
                attestation: None,
            },
        );
        Ok(event_id)
    }

    fn save_attestation(
        &self,
        event_id: &str,
        attestation: OracleAttestation,
    ) -> Result<OracleEventData, Error> {
        let mut data = self
            .data
            .write()
            .map_err(|_| Error::Storage("poisoned lock".to_string()))?;
        let Some(event) = data.get_mut(event_id) else {
            return Err(Error::NotFound(event_id.to_string()));
        };

        if event.attestation.is_some() {
            return Err(Error::AlreadyAttested(event_id.to_string()));
        }

        event.attestation = Some(attestation);
        Ok(event.clone())
    }

    fn get_event(&self, event_id: &str) -> Result<Option<OracleEventData>, Error> {
        let data = self
            .data
            .read()
            .map_err(|_| Error::Storage("poisoned lock".to_string()))?;
        Ok(data.get(event_id).cloned())
    }

    fn list_events(&self) -> Result<Vec<OracleEventData>, Error> {
        let data = self
            .data
            .read()
            .map_err(|_| Error::Storage("poisoned lock".to_string()))?;
        Ok(data.values().cloned().collect())
    }
}
