//! Configuration values, ordered property bags, and validation.
//!
//! Static configuration attached to a registration, plus any per-call
//! overrides, flows through [`ConfigValidator::validate`] before an
//! instance is configured. Values are JSON-flavored with an opaque escape
//! hatch for payloads that have no JSON representation (module options,
//! callables, pre-built objects).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::definition::Definition;
use crate::error::{DiError, DiResult};
use crate::metadata;

/// A single configuration value.
#[derive(Clone)]
pub enum PropertyValue {
    /// JSON-representable value
    Json(Value),
    /// Opaque payload passed through untouched; equality is by identity
    Object(Arc<dyn Any + Send + Sync>),
}

impl PropertyValue {
    /// Wraps an arbitrary payload as an opaque object value.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        PropertyValue::Object(Arc::new(value))
    }

    /// The JSON value, when this is the JSON variant.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            PropertyValue::Json(value) => Some(value),
            PropertyValue::Object(_) => None,
        }
    }

    /// Typed view of an opaque object value.
    pub fn as_object<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            PropertyValue::Object(any) => any.clone().downcast::<T>().ok(),
            PropertyValue::Json(_) => None,
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropertyValue::Json(a), PropertyValue::Json(b)) => a == b,
            (PropertyValue::Object(a), PropertyValue::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Json(value) => write!(f, "Json({})", value),
            // payloads are arbitrary; only the identity is printable
            PropertyValue::Object(any) => write!(f, "Object({:p})", Arc::as_ptr(any)),
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        PropertyValue::Json(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Json(Value::from(value))
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Json(Value::from(value))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Json(Value::from(value))
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Json(Value::from(value))
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::Json(Value::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Json(Value::from(value))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Json(Value::from(value))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Json(Value::from(value))
    }
}

/// Insertion-ordered set of named configuration values.
///
/// Order matters: validation walks declared properties in declaration
/// order, and re-setting a key replaces the value in place without moving
/// the key.
#[derive(Clone, Default)]
pub struct PropertyBag {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<PropertyValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Inserts or replaces in place.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<PropertyValue>) {
        let key = key.as_ref();
        match self.entries.iter_mut().find(|(name, _)| name == key) {
            Some(entry) => entry.1 = value.into(),
            None => self.entries.push((key.to_string(), value.into())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        let index = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// This bag with `overrides` layered on top. Overridden keys keep
    /// their original position; new keys append in override order.
    pub fn merged(&self, overrides: &PropertyBag) -> PropertyBag {
        let mut merged = self.clone();
        for (key, value) in overrides.iter() {
            merged.set(key, value.clone());
        }
        merged
    }
}

impl fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, value)| (name, value)))
            .finish()
    }
}

/// Per-call options for [`ConfigValidator::validate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    /// Drop raw keys that are not declared configurable properties.
    /// Defaults to `false`: unknown keys are retained verbatim.
    pub strip_unknown: bool,
}

/// Validates raw configuration against a definition's declared
/// configurable properties.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Walks the merged configurable set in declaration order (ancestors
    /// first). Absent properties take their default when one is declared
    /// and fail with [`DiError::MissingConfig`] when required; present
    /// properties run the schema check and store the checked value. The
    /// first failing property aborts validation, so errors are stable
    /// across runs.
    pub async fn validate(
        definition: &Arc<Definition>,
        raw: &PropertyBag,
        options: ValidateOptions,
    ) -> DiResult<ValidatedConfig> {
        let resolved = metadata::resolve(definition);
        let mut values = PropertyBag::new();

        for descriptor in &resolved.configurables {
            let checked = match raw.get(&descriptor.property).cloned() {
                Some(value) => Some(descriptor.schema.check(value).await.map_err(|reason| {
                    DiError::InvalidConfig {
                        property: descriptor.property.clone(),
                        reason,
                    }
                })?),
                None => match descriptor.schema.default_value() {
                    Some(default) => Some(default),
                    None if descriptor.schema.required() => {
                        return Err(DiError::MissingConfig {
                            property: descriptor.property.clone(),
                        });
                    }
                    None => None,
                },
            };
            if let Some(value) = checked {
                let value = match &descriptor.transform {
                    Some(transform) => transform(value),
                    None => value,
                };
                values.set(&descriptor.property, value);
            }
        }

        if !options.strip_unknown {
            for (key, value) in raw.iter() {
                let declared = resolved.configurables.iter().any(|c| c.property == key);
                if !declared {
                    values.set(key, value.clone());
                }
            }
        }

        Ok(ValidatedConfig { values })
    }
}

/// Validated configuration handed to [`Injectable::configure`](crate::Injectable::configure).
///
/// Read-only after validation; typed extraction goes through serde for
/// JSON values and downcasting for opaque objects.
#[derive(Clone, Debug)]
pub struct ValidatedConfig {
    values: PropertyBag,
}

impl ValidatedConfig {
    /// Deserializes a JSON-valued property.
    pub fn get<T: DeserializeOwned>(&self, property: &str) -> DiResult<T> {
        match self.values.get(property) {
            None => Err(DiError::MissingConfig { property: property.to_string() }),
            Some(PropertyValue::Json(value)) => {
                serde_json::from_value(value.clone()).map_err(|err| DiError::InvalidConfig {
                    property: property.to_string(),
                    reason: err.to_string(),
                })
            }
            Some(PropertyValue::Object(_)) => Err(DiError::InvalidConfig {
                property: property.to_string(),
                reason: "opaque object value cannot be deserialized".to_string(),
            }),
        }
    }

    /// Deserializes a JSON-valued property, `None` on absence or mismatch.
    pub fn try_get<T: DeserializeOwned>(&self, property: &str) -> Option<T> {
        self.get(property).ok()
    }

    /// Downcasts an opaque object property.
    pub fn object<T: Any + Send + Sync>(&self, property: &str) -> DiResult<Arc<T>> {
        match self.values.get(property) {
            None => Err(DiError::MissingConfig { property: property.to_string() }),
            Some(PropertyValue::Object(any)) => {
                any.clone().downcast::<T>().map_err(|_| DiError::InvalidConfig {
                    property: property.to_string(),
                    reason: format!("expected an opaque {} value", std::any::type_name::<T>()),
                })
            }
            Some(PropertyValue::Json(_)) => Err(DiError::InvalidConfig {
                property: property.to_string(),
                reason: "expected an opaque object value".to_string(),
            }),
        }
    }

    /// Downcasts an opaque object property, `None` on absence or mismatch.
    pub fn try_object<T: Any + Send + Sync>(&self, property: &str) -> Option<Arc<T>> {
        self.object(property).ok()
    }

    /// The raw stored value.
    pub fn raw(&self, property: &str) -> Option<&PropertyValue> {
        self.values.get(property)
    }

    pub fn contains(&self, property: &str) -> bool {
        self.values.contains(property)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
