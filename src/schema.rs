//! The schema capability consumed by configuration validation.
//!
//! The container does not define a validation language; it only requires
//! the minimal [`Schema`] contract: an (optionally asynchronous) check
//! plus introspection of the required/default flags. The [`schemas`]
//! builders cover the common cases; any external validation library can
//! participate by implementing [`Schema`].

use std::any::TypeId;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::PropertyValue;
use crate::internal::BoxFuture;

/// Validation capability for a single configurable property.
///
/// `check` receives the supplied value and returns the checked (possibly
/// coerced) value or a failure reason. Checks may suspend; schemas backed
/// by I/O are supported.
#[async_trait]
pub trait Schema: Send + Sync {
    /// Validates `value`, returning the value to store (which may differ
    /// from the input when the schema coerces) or a failure reason.
    async fn check(&self, value: PropertyValue) -> Result<PropertyValue, String>;

    /// Whether the property must be present when no default applies.
    fn required(&self) -> bool {
        true
    }

    /// Default applied when the property is absent from configuration.
    fn default_value(&self) -> Option<PropertyValue> {
        None
    }
}

type RefineFn = Arc<dyn Fn(&PropertyValue) -> Result<(), String> + Send + Sync>;
type CheckFn = Arc<dyn Fn(PropertyValue) -> BoxFuture<'static, Result<PropertyValue, String>> + Send + Sync>;

#[derive(Clone)]
enum SchemaKind {
    Any,
    String,
    Integer,
    Unsigned,
    Float,
    Boolean,
    Object { type_id: TypeId, type_name: &'static str },
}

impl SchemaKind {
    fn describe(&self) -> String {
        match self {
            SchemaKind::Any => "any value".to_string(),
            SchemaKind::String => "a string value".to_string(),
            SchemaKind::Integer => "an integer value".to_string(),
            SchemaKind::Unsigned => "an unsigned integer value".to_string(),
            SchemaKind::Float => "a numeric value".to_string(),
            SchemaKind::Boolean => "a boolean value".to_string(),
            SchemaKind::Object { type_name, .. } => format!("an opaque {} value", type_name),
        }
    }
}

/// Built-in schema with builder-style modifiers.
///
/// Obtained from the [`schemas`] constructors. A builder is itself a
/// [`Schema`]; the modifiers stack:
///
/// ```rust
/// use keystone_di::schemas;
///
/// let port = schemas::unsigned()
///     .default_value(8080)
///     .refine(|value| match value.as_json().and_then(|v| v.as_u64()) {
///         Some(p) if p > 0 && p < 65536 => Ok(()),
///         _ => Err("port out of range".to_string()),
///     });
/// ```
#[derive(Clone)]
pub struct SchemaBuilder {
    kind: SchemaKind,
    optional: bool,
    default: Option<PropertyValue>,
    refinements: Vec<RefineFn>,
    custom: Option<CheckFn>,
}

impl SchemaBuilder {
    fn of(kind: SchemaKind) -> Self {
        Self {
            kind,
            optional: false,
            default: None,
            refinements: Vec::new(),
            custom: None,
        }
    }

    /// Marks the property optional: absence is not an error, and no
    /// value is stored unless a default is declared.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Declares the default applied when the property is absent.
    /// A property with a default is never required.
    pub fn default_value(mut self, value: impl Into<PropertyValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Adds a synchronous predicate run after the kind check.
    pub fn refine<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PropertyValue) -> Result<(), String> + Send + Sync + 'static,
    {
        self.refinements.push(Arc::new(predicate));
        self
    }

    /// Replaces the final checking step with a custom asynchronous check.
    /// The check receives the value after the kind check and refinements
    /// and may coerce it.
    pub fn check_with<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(PropertyValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PropertyValue, String>> + Send + 'static,
    {
        self.custom = Some(Arc::new(move |value| Box::pin(check(value))));
        self
    }

    fn check_kind(&self, value: &PropertyValue) -> Result<(), String> {
        let ok = match (&self.kind, value) {
            (SchemaKind::Any, _) => true,
            (SchemaKind::String, PropertyValue::Json(v)) => v.is_string(),
            (SchemaKind::Integer, PropertyValue::Json(v)) => v.is_i64() || v.is_u64(),
            (SchemaKind::Unsigned, PropertyValue::Json(v)) => v.is_u64(),
            (SchemaKind::Float, PropertyValue::Json(v)) => v.is_number(),
            (SchemaKind::Boolean, PropertyValue::Json(v)) => v.is_boolean(),
            (SchemaKind::Object { type_id, .. }, PropertyValue::Object(any)) => {
                (**any).type_id() == *type_id
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("expected {}", self.kind.describe()))
        }
    }
}

#[async_trait]
impl Schema for SchemaBuilder {
    async fn check(&self, value: PropertyValue) -> Result<PropertyValue, String> {
        self.check_kind(&value)?;
        for refinement in &self.refinements {
            refinement(&value)?;
        }
        match &self.custom {
            Some(custom) => custom(value).await,
            None => Ok(value),
        }
    }

    fn required(&self) -> bool {
        !self.optional && self.default.is_none()
    }

    fn default_value(&self) -> Option<PropertyValue> {
        self.default.clone()
    }
}

/// Constructors for the built-in schemas.
pub mod schemas {
    use super::{SchemaBuilder, SchemaKind};
    use std::any::{type_name, Any, TypeId};

    /// Accepts any property value.
    pub fn any() -> SchemaBuilder {
        SchemaBuilder::of(SchemaKind::Any)
    }

    /// Accepts JSON string values.
    pub fn string() -> SchemaBuilder {
        SchemaBuilder::of(SchemaKind::String)
    }

    /// Accepts JSON integer values, signed or unsigned.
    pub fn integer() -> SchemaBuilder {
        SchemaBuilder::of(SchemaKind::Integer)
    }

    /// Accepts non-negative JSON integer values.
    pub fn unsigned() -> SchemaBuilder {
        SchemaBuilder::of(SchemaKind::Unsigned)
    }

    /// Accepts any JSON number.
    pub fn float() -> SchemaBuilder {
        SchemaBuilder::of(SchemaKind::Float)
    }

    /// Accepts JSON boolean values.
    pub fn boolean() -> SchemaBuilder {
        SchemaBuilder::of(SchemaKind::Boolean)
    }

    /// Accepts opaque object values carrying exactly a `T`.
    pub fn object<T: Any + Send + Sync>() -> SchemaBuilder {
        SchemaBuilder::of(SchemaKind::Object {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        })
    }
}
