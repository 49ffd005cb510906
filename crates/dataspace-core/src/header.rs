//! Header: the write-once provenance record of a data product.
//!
//! A header names the task manager that produced an entry, when it was
//! created and when it stops being fresh. It is created on the first write
//! of a key and is never mutated afterwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{DataSpaceError, Result};

/// Lifetime applied when no expiration time is given (seconds).
pub const DEFAULT_DATA_LIFETIME_SECS: i64 = 1800;

/// Creator label applied when none is given.
pub const DEFAULT_CREATOR: &str = "module";

/// Provenance and expiration record for one stored entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    taskmanager_id: String,
    create_time: DateTime<Utc>,
    expiration_time: DateTime<Utc>,
    scheduled_create_time: DateTime<Utc>,
    creator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_id: Option<i64>,
}

impl Header {
    /// Attribute names a header may carry.
    pub const REQUIRED_KEYS: [&'static str; 6] = [
        "taskmanager_id",
        "create_time",
        "expiration_time",
        "scheduled_create_time",
        "creator",
        "schema_id",
    ];

    pub fn builder(taskmanager_id: impl Into<String>) -> HeaderBuilder {
        HeaderBuilder {
            taskmanager_id: taskmanager_id.into(),
            create_time: None,
            expiration_time: None,
            lifetime: None,
            scheduled_create_time: None,
            creator: None,
            schema_id: None,
        }
    }

    /// Header with every default filled in.
    pub fn new(taskmanager_id: impl Into<String>) -> Result<Self> {
        Self::builder(taskmanager_id).build()
    }

    /// Build a header from loose named fields, as a row-oriented backend
    /// would hand them back.
    ///
    /// Unknown names and mistyped values are rejected.
    pub fn from_fields(fields: &BTreeMap<String, Value>) -> Result<Self> {
        if let Some(unknown) = fields
            .keys()
            .find(|name| !Self::REQUIRED_KEYS.contains(&name.as_str()))
        {
            return Err(DataSpaceError::InvalidHeader(format!(
                "unrecognized header field `{unknown}`"
            )));
        }

        let taskmanager_id = match fields.get("taskmanager_id") {
            Some(Value::String(id)) => id.clone(),
            Some(other) => return Err(mistyped("taskmanager_id", other)),
            None => {
                return Err(DataSpaceError::InvalidHeader(
                    "missing field `taskmanager_id`".to_string(),
                ));
            }
        };

        let mut builder = Self::builder(taskmanager_id);
        if let Some(value) = fields.get("create_time") {
            builder = builder.create_time(time_field("create_time", value)?);
        }
        if let Some(value) = fields.get("expiration_time") {
            builder = builder.expiration_time(time_field("expiration_time", value)?);
        }
        if let Some(value) = fields.get("scheduled_create_time") {
            builder = builder.scheduled_create_time(time_field("scheduled_create_time", value)?);
        }
        match fields.get("creator") {
            Some(Value::String(creator)) => builder = builder.creator(creator.clone()),
            Some(other) => return Err(mistyped("creator", other)),
            None => {}
        }
        match fields.get("schema_id") {
            Some(Value::Null) | None => {}
            Some(value) => {
                let id = value.as_i64().ok_or_else(|| mistyped("schema_id", value))?;
                builder = builder.schema_id(id);
            }
        }
        builder.build()
    }

    pub fn taskmanager_id(&self) -> &str {
        &self.taskmanager_id
    }

    pub fn create_time(&self) -> DateTime<Utc> {
        self.create_time
    }

    pub fn expiration_time(&self) -> DateTime<Utc> {
        self.expiration_time
    }

    pub fn scheduled_create_time(&self) -> DateTime<Utc> {
        self.scheduled_create_time
    }

    pub fn creator(&self) -> &str {
        &self.creator
    }

    pub fn schema_id(&self) -> Option<i64> {
        self.schema_id
    }

    /// Names of the attributes this header actually carries.
    pub fn populated_keys(&self) -> Vec<&'static str> {
        let mut keys = vec![
            "taskmanager_id",
            "create_time",
            "expiration_time",
            "scheduled_create_time",
            "creator",
        ];
        if self.schema_id.is_some() {
            keys.push("schema_id");
        }
        keys
    }

    /// Whether the populated attributes are a subset of `REQUIRED_KEYS`.
    pub fn is_valid(&self) -> bool {
        self.populated_keys()
            .iter()
            .all(|key| Self::REQUIRED_KEYS.contains(key))
    }

    /// Whether the expiration time is at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time <= now
    }

    /// Copy of this header carrying a different expiration time.
    pub fn with_expiration_time(&self, expiration_time: DateTime<Utc>) -> Self {
        Self {
            expiration_time,
            ..self.clone()
        }
    }
}

/// Builder for `Header`; unset fields take the documented defaults.
#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    taskmanager_id: String,
    create_time: Option<DateTime<Utc>>,
    expiration_time: Option<DateTime<Utc>>,
    lifetime: Option<Duration>,
    scheduled_create_time: Option<DateTime<Utc>>,
    creator: Option<String>,
    schema_id: Option<i64>,
}

impl HeaderBuilder {
    pub fn create_time(mut self, at: DateTime<Utc>) -> Self {
        self.create_time = Some(at);
        self
    }

    pub fn expiration_time(mut self, at: DateTime<Utc>) -> Self {
        self.expiration_time = Some(at);
        self
    }

    /// Lifetime used to derive the expiration time when none is set.
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn scheduled_create_time(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_create_time = Some(at);
        self
    }

    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn schema_id(mut self, schema_id: i64) -> Self {
        self.schema_id = Some(schema_id);
        self
    }

    pub fn build(self) -> Result<Header> {
        if self.taskmanager_id.trim().is_empty() {
            return Err(DataSpaceError::InvalidHeader(
                "taskmanager_id must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let create_time = self.create_time.unwrap_or(now);
        let expiration_time = match self.expiration_time {
            Some(at) => at,
            None => {
                let lifetime = self
                    .lifetime
                    .unwrap_or_else(|| Duration::seconds(DEFAULT_DATA_LIFETIME_SECS));
                create_time.checked_add_signed(lifetime).ok_or_else(|| {
                    DataSpaceError::InvalidHeader(format!(
                        "create_time {create_time} plus lifetime {lifetime} is out of range"
                    ))
                })?
            }
        };
        let header = Header {
            taskmanager_id: self.taskmanager_id,
            create_time,
            expiration_time,
            scheduled_create_time: self.scheduled_create_time.unwrap_or(now),
            creator: self.creator.unwrap_or_else(|| DEFAULT_CREATOR.to_string()),
            schema_id: self.schema_id,
        };

        if !header.is_valid() {
            return Err(DataSpaceError::InvalidHeader(format!(
                "fields {:?} are not a subset of {:?}",
                header.populated_keys(),
                Header::REQUIRED_KEYS
            )));
        }
        Ok(header)
    }
}

fn mistyped(name: &str, value: &Value) -> DataSpaceError {
    DataSpaceError::InvalidHeader(format!("field `{name}` has unexpected value {value}"))
}

fn time_field(name: &str, value: &Value) -> Result<DateTime<Utc>> {
    serde_json::from_value(value.clone()).map_err(|_| mistyped(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn defaults_derive_expiration_from_create_time() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let header = Header::builder("tm-1")
            .create_time(created)
            .build()
            .expect("header should build");

        assert_eq!(header.create_time(), created);
        assert_eq!(
            header.expiration_time(),
            created + Duration::seconds(DEFAULT_DATA_LIFETIME_SECS)
        );
        assert_eq!(header.creator(), DEFAULT_CREATOR);
        assert_eq!(header.schema_id(), None);
    }

    #[test]
    fn explicit_lifetime_overrides_default() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let header = Header::builder("tm-1")
            .create_time(created)
            .lifetime(Duration::seconds(60))
            .build()
            .expect("header should build");
        assert_eq!(header.expiration_time(), created + Duration::seconds(60));
    }

    #[test]
    fn expiration_overflow_is_an_error() {
        let err = Header::builder("tm-1")
            .create_time(DateTime::<Utc>::MAX_UTC - Duration::seconds(10))
            .lifetime(Duration::minutes(1))
            .build()
            .expect_err("overflowing expiration must fail");
        assert!(matches!(err, DataSpaceError::InvalidHeader(msg) if msg.contains("out of range")));
    }

    #[test]
    fn header_without_schema_id_is_still_valid() {
        let header = Header::new("tm-1").expect("header should build");
        assert!(!header.populated_keys().contains(&"schema_id"));
        assert!(header.is_valid());

        let with_schema = Header::builder("tm-1")
            .schema_id(7)
            .build()
            .expect("header should build");
        assert!(with_schema.populated_keys().contains(&"schema_id"));
        assert!(with_schema.is_valid());
    }

    #[test]
    fn empty_taskmanager_id_is_rejected() {
        let err = Header::new("  ").expect_err("empty id must fail");
        assert!(matches!(err, DataSpaceError::InvalidHeader(_)));
    }

    #[test]
    fn from_fields_rejects_unknown_names() {
        let mut fields = BTreeMap::new();
        fields.insert("taskmanager_id".to_string(), json!("tm-1"));
        fields.insert("colour".to_string(), json!("blue"));

        let err = Header::from_fields(&fields).expect_err("unknown field must fail");
        assert!(matches!(err, DataSpaceError::InvalidHeader(msg) if msg.contains("colour")));
    }

    #[test]
    fn from_fields_accepts_partial_known_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("taskmanager_id".to_string(), json!("tm-1"));
        fields.insert("creator".to_string(), json!("source.a"));
        fields.insert("schema_id".to_string(), Value::Null);

        let header = Header::from_fields(&fields).expect("subset of fields is valid");
        assert_eq!(header.creator(), "source.a");
        assert!(header.is_valid());
    }

    #[test]
    fn from_fields_rejects_mistyped_time() {
        let mut fields = BTreeMap::new();
        fields.insert("taskmanager_id".to_string(), json!("tm-1"));
        fields.insert("create_time".to_string(), json!("yesterday"));

        let err = Header::from_fields(&fields).expect_err("bad time must fail");
        assert!(matches!(err, DataSpaceError::InvalidHeader(_)));
    }

    #[test]
    fn with_expiration_time_leaves_original_untouched() {
        let header = Header::new("tm-1").expect("header should build");
        let past = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let expired = header.with_expiration_time(past);

        assert_eq!(expired.expiration_time(), past);
        assert_eq!(expired.create_time(), header.create_time());
        assert_ne!(header.expiration_time(), past);
        assert!(expired.is_expired_at(Utc::now()));
        assert!(!header.is_expired_at(Utc::now()));
    }
}
