//! Telemetry event model
//!
//! This module defines the typed property bag that every telemetry event
//! carries: a closed `Value` union, the `PiiKind` classification attached
//! to sensitive properties, and the immutable `EventProperties` record
//! handed to sinks.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;
use super::newtypes::EventName;

/// A typed property value
///
/// Closed tagged union of the value types an event property may carry.
/// Keeping the union closed makes serialization and PII handling
/// exhaustive: a sink can match on every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
    Guid(Uuid),
}

impl Value {
    /// Returns the string content when the value is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content when the value is an `Integer`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean content when the value is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the float content when the value is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Guid(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Guid(id)
    }
}

/// PII classification of an event property
///
/// Metadata only: the classification never changes how a value is stored,
/// it instructs a downstream sink how the field must be handled under
/// privacy policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    /// Not personally identifiable
    #[default]
    None,
    /// Free-form data that may reveal user identity (workspace names, hostnames)
    GenericData,
    /// A URI that may contain user paths
    Uri,
}

impl Display for PiiKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            PiiKind::None => "none",
            PiiKind::GenericData => "generic_data",
            PiiKind::Uri => "uri",
        };
        write!(f, "{s}")
    }
}

/// An immutable, named telemetry event record
///
/// Construction fixes the event name; properties are added through the
/// consuming builder methods, which reject duplicate keys so malformed
/// events fail at the call site instead of silently dropping data.
///
/// Invariant: every key in the PII map is also present in the property
/// bag. This holds by construction because PII tags can only be attached
/// while inserting the property itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventProperties {
    name: EventName,
    properties: BTreeMap<String, Value>,
    pii_properties: BTreeMap<String, PiiKind>,
}

impl EventProperties {
    /// Creates an empty event with the given name.
    pub fn new(name: EventName) -> Self {
        Self {
            name,
            properties: BTreeMap::new(),
            pii_properties: BTreeMap::new(),
        }
    }

    /// Adds a non-PII property.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::DuplicateProperty`] when the key is already
    /// present on this event.
    pub fn with_property(
        self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, DomainError> {
        self.with_pii_property(key, value, PiiKind::None)
    }

    /// Adds a property with a PII classification.
    ///
    /// A classification of [`PiiKind::None`] records no PII entry for the
    /// key, so the PII map stays a strict subset of the property bag.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::DuplicateProperty`] when the key is already
    /// present on this event.
    pub fn with_pii_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        pii: PiiKind,
    ) -> Result<Self, DomainError> {
        let key = key.into();
        if self.properties.contains_key(&key) {
            return Err(DomainError::DuplicateProperty(key));
        }
        if pii != PiiKind::None {
            self.pii_properties.insert(key.clone(), pii);
        }
        self.properties.insert(key, value.into());
        Ok(self)
    }

    /// Inserts a context property unless the event already carries the key.
    ///
    /// Event-supplied keys take precedence over context on conflict, so
    /// this never overwrites and never fails.
    pub fn merge_context_property(&mut self, key: &str, value: Value, pii: PiiKind) {
        if self.properties.contains_key(key) {
            return;
        }
        if pii != PiiKind::None {
            self.pii_properties.insert(key.to_string(), pii);
        }
        self.properties.insert(key.to_string(), value);
    }

    /// The event name, fixed at construction.
    pub fn name(&self) -> &EventName {
        &self.name
    }

    /// Looks up a property value; `None` when the key is absent.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Looks up the PII classification recorded for a key.
    ///
    /// Returns `None` when the key carries no classification (including
    /// keys that are not present on the event at all).
    pub fn pii_kind(&self, key: &str) -> Option<PiiKind> {
        self.pii_properties.get(key).copied()
    }

    /// The full property bag.
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// The PII classification map (a subset of the property keys).
    pub fn pii_properties(&self) -> &BTreeMap<String, PiiKind> {
        &self.pii_properties
    }
}
