//! # keystone-di
//!
//! Metadata-driven dependency injection and object-lifecycle runtime for
//! Rust, with hierarchical containers and async lifecycle hooks.
//!
//! ## Features
//!
//! - **Explicit registration metadata**: configurable properties,
//!   injection points, and lifetimes declared per definition, inherited
//!   along explicit parent links
//! - **Three lifetimes**: Singleton, Scoped, and Transient, with lockable
//!   lifetime declarations
//! - **Validated configuration**: schema-checked static config with
//!   defaults, transforms, and async checks
//! - **Async lifecycle**: container-driven `init`/`bootstrap`/`destroy`
//!   hooks with strict status transitions
//! - **Hierarchical scoping**: child containers delegate lookups to their
//!   parent and may shadow its registrations
//! - **Coalesced construction**: concurrent resolutions of one singleton
//!   or scoped id construct exactly once
//! - **Modules**: managed objects that own a child container with an
//!   ordered bootstrap sequence
//!
//! ## Quick Start
//!
//! ```rust
//! use keystone_di::{
//!     schemas, Container, Definition, DiResult, Injectable, InjectionSet, Lifetime,
//!     RegistrationSpec, ValidatedConfig,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Database {
//!     url: String,
//! }
//!
//! impl Injectable for Database {
//!     fn configure(&mut self, config: &ValidatedConfig) -> DiResult<()> {
//!         self.url = config.get("url")?;
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Default)]
//! struct UserService {
//!     db: Option<Arc<Database>>,
//! }
//!
//! impl Injectable for UserService {
//!     fn inject(&mut self, deps: &InjectionSet) -> DiResult<()> {
//!         self.db = Some(deps.get("db")?);
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> DiResult<()> {
//! // declare the definitions once, at startup
//! let database = Definition::builder("database", Database::default)
//!     .configurable("url", schemas::string())
//!     .lifetime(Lifetime::Singleton)
//!     .build()?;
//! let users = Definition::builder("user-service", UserService::default)
//!     .inject("db")
//!     .build()?;
//!
//! // bind them into a container with static configuration
//! let container = Container::new();
//! container.load([
//!     ("db", RegistrationSpec::of(&database).with("url", "postgres://localhost")),
//!     ("users", RegistrationSpec::of(&users)),
//! ])?;
//!
//! // resolution validates config, injects dependencies, and runs init
//! let service = container.get::<UserService>("users").await?;
//! assert_eq!(service.db.as_ref().unwrap().url, "postgres://localhost");
//!
//! // teardown destroys cached instances in reverse construction order
//! container.destroy().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifetimes
//!
//! - **Singleton**: one instance per owning registration, shared by the
//!   owning container and every descendant resolving through it
//! - **Scoped**: one instance per resolving container; the registration
//!   may live in an ancestor, the cache is local
//! - **Transient**: a fresh instance per resolution, weakly tracked for
//!   bookkeeping only
//!
//! ## Scoping
//!
//! ```rust
//! use keystone_di::{Container, Definition, DiResult, Injectable, Lifetime};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Config;
//! impl Injectable for Config {}
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> DiResult<()> {
//! let config = Definition::builder("config", Config::default)
//!     .lifetime(Lifetime::Singleton)
//!     .build()?;
//!
//! let root = Container::new();
//! root.load([("config", &config)])?;
//!
//! // a child without a local registration resolves the parent's singleton
//! let child = root.create_child();
//! let from_root = root.get::<Config>("config").await?;
//! let from_child = child.get::<Config>("config").await?;
//! assert!(Arc::ptr_eq(&from_root, &from_child));
//! # root.destroy().await?;
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod config;
pub mod container;
pub mod definition;
pub mod error;
pub mod identifier;
pub mod lifecycle;
pub mod lifetime;
pub mod metadata;
pub mod module;
pub mod observer;
pub mod registration;
pub mod schema;
pub mod tracker;

// Internal modules
mod internal;

// Re-export core types
pub use config::{ConfigValidator, PropertyBag, PropertyValue, ValidateOptions, ValidatedConfig};
pub use container::{Container, InitContext};
pub use definition::{Definition, DefinitionBuilder, DefinitionId};
pub use error::{DiError, DiResult};
pub use identifier::Identifier;
pub use lifecycle::{Injectable, InjectionSet, InstanceHandle, LifecycleStatus};
pub use lifetime::{Lifetime, LifetimeDeclaration};
pub use metadata::{
    declare_configurable, declare_configurable_with, declare_injection, declare_lifetime,
    lock_lifetime, ConfigurableDescriptor, InjectionDescriptor, ResolvedMetadata, TransformFn,
};
pub use module::{BootstrapItem, Module, ModuleOptions, MODULE_BACK_REFERENCE};
pub use observer::{ContainerObserver, LoggingObserver};
pub use registration::RegistrationSpec;
pub use schema::{schemas, Schema, SchemaBuilder};
pub use tracker::WeakInstanceTracker;
