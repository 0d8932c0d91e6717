//! Error types for the dependency injection container.

use std::fmt;

use crate::identifier::Identifier;

/// Dependency injection errors
///
/// Represents the error conditions that can occur during metadata
/// declaration, registration loading, instance resolution, or container
/// teardown.
///
/// # Examples
///
/// ```rust
/// use keystone_di::{Container, DiError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let container = Container::new();
/// match container.resolve("missing").await {
///     Err(DiError::Unresolved(id)) => assert_eq!(id.to_string(), "missing"),
///     other => panic!("unexpected: {:?}", other),
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub enum DiError {
    /// Same id loaded twice into one container
    DuplicateRegistration(Identifier),
    /// Resolution target not found anywhere up the container chain
    Unresolved(Identifier),
    /// Construction graph revisited a node already in construction
    /// (the full path, with the offending id repeated at the end)
    Circular(Vec<Identifier>),
    /// Attempt to change a locked definition's lifetime kind
    LifetimeLocked {
        /// Display name of the definition whose declaration was rejected
        definition: String,
    },
    /// Required configurable property absent from the merged configuration
    MissingConfig {
        /// Name of the missing property
        property: String,
    },
    /// Configurable property failed its schema check or typed extraction
    InvalidConfig {
        /// Name of the offending property
        property: String,
        /// Failure reported by the schema or deserializer
        reason: String,
    },
    /// Typed downcast of a resolved instance failed
    TypeMismatch(&'static str),
    /// Lifecycle hook invoked out of allowed state order, hook failure,
    /// or use of a destroyed container
    Lifecycle(String),
    /// Maximum recursion depth exceeded
    DepthExceeded(usize),
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::DuplicateRegistration(id) => {
                write!(f, "Duplicate registration: {}", id)
            }
            DiError::Unresolved(id) => write!(f, "Unresolved dependency: {}", id),
            DiError::Circular(path) => {
                let rendered: Vec<String> = path.iter().map(|id| id.to_string()).collect();
                write!(f, "Circular dependency: {}", rendered.join(" -> "))
            }
            DiError::LifetimeLocked { definition } => {
                write!(f, "Lifetime of \"{}\" is locked by an ancestor declaration", definition)
            }
            DiError::MissingConfig { property } => {
                write!(f, "Missing required configuration property: {}", property)
            }
            DiError::InvalidConfig { property, reason } => {
                write!(f, "Invalid configuration property \"{}\": {}", property, reason)
            }
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            DiError::Lifecycle(msg) => write!(f, "Lifecycle error: {}", msg),
            DiError::DepthExceeded(depth) => write!(f, "Max resolution depth {} exceeded", depth),
        }
    }
}

impl std::error::Error for DiError {}

/// Result type for DI operations
///
/// A convenience alias for `Result<T, DiError>` used throughout the crate.
pub type DiResult<T> = Result<T, DiError>;
