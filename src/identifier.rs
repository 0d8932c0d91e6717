//! Registration identifiers for container storage and lookup.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// Identifier for registrations within a container chain.
///
/// Two flavors exist, matching the two ways application code names things:
///
/// - **Name**: a plain string id. Equal iff the strings are equal, so two
///   independently authored modules using the same name collide (which is
///   sometimes what you want, shadowing a parent registration, and
///   sometimes not).
/// - **Symbol**: a process-unique id carrying a label purely for display.
///   Every call to [`Identifier::symbol`] mints a distinct identity, so
///   symbols never collide across independently authored modules.
///
/// # Examples
///
/// ```rust
/// use keystone_di::Identifier;
///
/// let a = Identifier::name("database");
/// let b = Identifier::name("database");
/// assert_eq!(a, b);
///
/// let s1 = Identifier::symbol("database");
/// let s2 = Identifier::symbol("database");
/// assert_ne!(s1, s2); // same label, distinct identities
/// ```
#[derive(Clone)]
pub enum Identifier {
    /// String-named identifier, equal by name
    Name(Arc<str>),
    /// Unique symbol with a display label, equal by allocation
    Symbol(u64, Arc<str>),
}

impl Identifier {
    /// Creates a string-named identifier.
    pub fn name(name: impl AsRef<str>) -> Self {
        Identifier::Name(Arc::from(name.as_ref()))
    }

    /// Mints a new process-unique symbol with the given display label.
    pub fn symbol(label: impl AsRef<str>) -> Self {
        Identifier::Symbol(NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed), Arc::from(label.as_ref()))
    }

    /// The human-readable label of this identifier.
    pub fn label(&self) -> &str {
        match self {
            Identifier::Name(name) => name,
            Identifier::Symbol(_, label) => label,
        }
    }

    /// Whether this identifier is a unique symbol.
    pub fn is_symbol(&self) -> bool {
        matches!(self, Identifier::Symbol(_, _))
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Identifier::Name(a), Identifier::Name(b)) => a == b,
            // Symbols compare by allocation id only; the label is display-only
            (Identifier::Symbol(a, _), Identifier::Symbol(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Identifier::Name(name) => {
                0u8.hash(state);
                name.hash(state);
            }
            Identifier::Symbol(id, _) => {
                1u8.hash(state);
                id.hash(state);
            }
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Name(name) => write!(f, "{}", name),
            Identifier::Symbol(id, label) => write!(f, "{}#{}", label, id),
        }
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Name(name) => write!(f, "Name({:?})", name),
            Identifier::Symbol(id, label) => write!(f, "Symbol({:?}#{})", label, id),
        }
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::name(name)
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::Name(Arc::from(name.as_str()))
    }
}

impl From<&Identifier> for Identifier {
    fn from(id: &Identifier) -> Self {
        id.clone()
    }
}
