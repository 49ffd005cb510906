//! Metadata: the mutable lifecycle record of a data product.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataSpaceError, Result};

/// Lifecycle state of a data product within one generation.
///
/// The four cycle states are set by callers. `Expired` is only reached
/// through `DataBlock::mark_expired` and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataState {
    New,
    StartBackup,
    MetadataUpdate,
    EndCycle,
    Expired,
}

impl MetadataState {
    pub const ALL: [MetadataState; 5] = [
        MetadataState::New,
        MetadataState::StartBackup,
        MetadataState::MetadataUpdate,
        MetadataState::EndCycle,
        MetadataState::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataState::New => "NEW",
            MetadataState::StartBackup => "START_BACKUP",
            MetadataState::MetadataUpdate => "METADATA_UPDATE",
            MetadataState::EndCycle => "END_CYCLE",
            MetadataState::Expired => "EXPIRED",
        }
    }

    /// Whether callers may move a Metadata into this state via `set_state`.
    pub fn is_caller_settable(&self) -> bool {
        !matches!(self, MetadataState::Expired)
    }
}

impl fmt::Display for MetadataState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataState {
    type Err = DataSpaceError;

    fn from_str(s: &str) -> Result<Self> {
        MetadataState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| DataSpaceError::InvalidMetadata(format!("invalid metadata state \"{s}\"")))
    }
}

/// Lifecycle record for one stored entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    taskmanager_id: String,
    state: MetadataState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generation_id: Option<u64>,
    generation_time: DateTime<Utc>,
    #[serde(default)]
    missed_update_count: u64,
}

impl Metadata {
    pub fn builder(taskmanager_id: impl Into<String>) -> MetadataBuilder {
        MetadataBuilder {
            taskmanager_id: taskmanager_id.into(),
            state: StateArg::Typed(MetadataState::New),
            generation_id: None,
            generation_time: None,
            missed_update_count: 0,
        }
    }

    /// Fresh `NEW` metadata for a generation, stamped now.
    pub fn new(taskmanager_id: impl Into<String>, generation_id: u64) -> Result<Self> {
        Self::builder(taskmanager_id)
            .generation_id(generation_id)
            .build()
    }

    pub fn taskmanager_id(&self) -> &str {
        &self.taskmanager_id
    }

    pub fn state(&self) -> MetadataState {
        self.state
    }

    pub fn generation_id(&self) -> Option<u64> {
        self.generation_id
    }

    pub fn generation_time(&self) -> DateTime<Utc> {
        self.generation_time
    }

    pub fn missed_update_count(&self) -> u64 {
        self.missed_update_count
    }

    pub fn is_expired(&self) -> bool {
        self.state == MetadataState::Expired
    }

    /// Move to `state`.
    ///
    /// Fails for `EXPIRED` and for any transition out of `EXPIRED`.
    pub fn set_state(&mut self, state: MetadataState) -> Result<()> {
        if self.is_expired() {
            return Err(DataSpaceError::InvalidMetadata(format!(
                "metadata is expired; cannot move to {state}"
            )));
        }
        if !state.is_caller_settable() {
            return Err(DataSpaceError::InvalidMetadata(format!(
                "{state} is not a valid Metadata state"
            )));
        }
        self.state = state;
        Ok(())
    }

    /// Parse `name` and move to that state.
    pub fn set_state_name(&mut self, name: &str) -> Result<()> {
        let state = name.parse()?;
        self.set_state(state)
    }

    pub(crate) fn expire(&mut self) {
        self.state = MetadataState::Expired;
    }

}

#[derive(Debug, Clone)]
enum StateArg {
    Typed(MetadataState),
    Named(String),
}

/// Builder for `Metadata`.
#[derive(Debug, Clone)]
pub struct MetadataBuilder {
    taskmanager_id: String,
    state: StateArg,
    generation_id: Option<u64>,
    generation_time: Option<DateTime<Utc>>,
    missed_update_count: u64,
}

impl MetadataBuilder {
    pub fn state(mut self, state: MetadataState) -> Self {
        self.state = StateArg::Typed(state);
        self
    }

    /// State given by name; validated in `build`.
    pub fn state_name(mut self, name: impl Into<String>) -> Self {
        self.state = StateArg::Named(name.into());
        self
    }

    pub fn generation_id(mut self, generation_id: u64) -> Self {
        self.generation_id = Some(generation_id);
        self
    }

    pub fn generation_time(mut self, at: DateTime<Utc>) -> Self {
        self.generation_time = Some(at);
        self
    }

    pub fn missed_update_count(mut self, count: u64) -> Self {
        self.missed_update_count = count;
        self
    }

    /// Build caller-owned metadata; `EXPIRED` is rejected.
    pub fn build(self) -> Result<Metadata> {
        let metadata = self.finish()?;
        if !metadata.state.is_caller_settable() {
            return Err(DataSpaceError::InvalidMetadata(format!(
                "{} is not a valid Metadata state",
                metadata.state
            )));
        }
        Ok(metadata)
    }

    /// Rebuild metadata already persisted, which may be `EXPIRED`.
    pub(crate) fn restore(self) -> Result<Metadata> {
        self.finish()
    }

    fn finish(self) -> Result<Metadata> {
        if self.taskmanager_id.trim().is_empty() {
            return Err(DataSpaceError::InvalidMetadata(
                "taskmanager_id must not be empty".to_string(),
            ));
        }
        let state = match self.state {
            StateArg::Typed(state) => state,
            StateArg::Named(name) => name.parse()?,
        };
        Ok(Metadata {
            taskmanager_id: self.taskmanager_id,
            state,
            generation_id: self.generation_id,
            generation_time: self.generation_time.unwrap_or_else(Utc::now),
            missed_update_count: self.missed_update_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bogus_state_name_is_rejected() {
        let err = Metadata::builder("tm-1")
            .state_name("BOGUS")
            .build()
            .expect_err("BOGUS must fail");
        assert!(matches!(err, DataSpaceError::InvalidMetadata(msg) if msg.contains("BOGUS")));
    }

    #[test]
    fn expired_cannot_be_built_by_name_or_value() {
        let err = Metadata::builder("tm-1")
            .state_name("EXPIRED")
            .build()
            .expect_err("EXPIRED by name must fail");
        assert!(matches!(err, DataSpaceError::InvalidMetadata(msg) if msg.contains("EXPIRED")));

        let err = Metadata::builder("tm-1")
            .state(MetadataState::Expired)
            .build()
            .expect_err("EXPIRED by value must fail");
        assert!(matches!(err, DataSpaceError::InvalidMetadata(_)));

        let restored = Metadata::builder("tm-1")
            .state_name("EXPIRED")
            .restore()
            .expect("stored rows may be expired");
        assert!(restored.is_expired());
    }

    #[test]
    fn new_state_defaults_generation_time_to_now() {
        let before = Utc::now();
        let metadata = Metadata::builder("tm-1")
            .state_name("NEW")
            .build()
            .expect("NEW is valid");
        let after = Utc::now();

        assert_eq!(metadata.state(), MetadataState::New);
        assert!(metadata.generation_time() >= before && metadata.generation_time() <= after);
        assert_eq!(metadata.missed_update_count(), 0);
        assert_eq!(metadata.generation_id(), None);
    }

    #[test]
    fn set_state_walks_the_cycle() {
        let mut metadata = Metadata::new("tm-1", 3).expect("metadata should build");
        for state in [
            MetadataState::StartBackup,
            MetadataState::MetadataUpdate,
            MetadataState::EndCycle,
            MetadataState::New,
        ] {
            metadata.set_state(state).expect("cycle state is settable");
            assert_eq!(metadata.state(), state);
        }
    }

    #[test]
    fn set_state_name_rejects_unknown_and_keeps_state() {
        let mut metadata = Metadata::new("tm-1", 1).expect("metadata should build");
        let err = metadata
            .set_state_name("STEADY")
            .expect_err("STEADY is not a metadata state");
        assert!(matches!(err, DataSpaceError::InvalidMetadata(_)));
        assert_eq!(metadata.state(), MetadataState::New);
    }

    #[test]
    fn expired_is_terminal_and_not_caller_settable() {
        let mut metadata = Metadata::new("tm-1", 1).expect("metadata should build");
        assert!(metadata.set_state(MetadataState::Expired).is_err());

        metadata.expire();
        assert!(metadata.is_expired());
        let err = metadata
            .set_state(MetadataState::New)
            .expect_err("expired is terminal");
        assert!(matches!(err, DataSpaceError::InvalidMetadata(_)));
    }

    #[test]
    fn state_names_round_trip_through_serde() {
        let json = serde_json::to_string(&MetadataState::StartBackup).expect("serialize");
        assert_eq!(json, "\"START_BACKUP\"");
        let state: MetadataState = serde_json::from_str("\"END_CYCLE\"").expect("deserialize");
        assert_eq!(state, MetadataState::EndCycle);
    }
}
