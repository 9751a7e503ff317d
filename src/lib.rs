//! # plugmap
//!
//! A configurable inversion-of-control container: register named instances
//! for plugin types, resolve fully-wired object graphs at runtime.
//!
//! ## Features
//!
//! - **Named instances**: several registrations per plugin type, addressable
//!   by name, with explicit or implicit defaults
//! - **Trait support**: plugin types can be concrete types or trait objects
//! - **Lifecycles**: transient, singleton, thread-local, per-layer, and
//!   nested-container scoping per family or per instance
//! - **Profiles and nested containers**: layered overrides that share the
//!   parent's registrations and singletons
//! - **Open templates**: closed generic plugin types synthesized on demand
//! - **Circular dependency detection**: typed errors carrying the build stack
//!
//! ## Quick Start
//!
//! ```rust
//! use plugmap::{Container, Instance, Lifecycle};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::new(|registry| {
//!     registry
//!         .add(
//!             Instance::literal(Database {
//!                 connection_string: "postgres://localhost".to_string(),
//!             })
//!             .with_lifecycle(Lifecycle::Singleton),
//!         )
//!         .add(Instance::of::<UserService, _>(|ctx| {
//!             Ok(UserService {
//!                 db: ctx.get_instance::<Database>()?,
//!             })
//!         }));
//! });
//!
//! let service = container.get_instance::<UserService>().unwrap();
//! assert_eq!(service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Named Instances and Defaults
//!
//! ```rust
//! use plugmap::{Container, Instance};
//! use std::sync::Arc;
//!
//! trait Sender: Send + Sync {
//!     fn transport(&self) -> &'static str;
//! }
//!
//! struct Smtp;
//! impl Sender for Smtp {
//!     fn transport(&self) -> &'static str { "smtp" }
//! }
//! struct Sms;
//! impl Sender for Sms {
//!     fn transport(&self) -> &'static str { "sms" }
//! }
//!
//! let container = Container::new(|registry| {
//!     registry
//!         .add(Instance::of_trait::<dyn Sender, _>(|_| Ok(Arc::new(Smtp))).named("smtp"))
//!         .add(Instance::of_trait::<dyn Sender, _>(|_| Ok(Arc::new(Sms))).named("sms"))
//!         .set_default_trait::<dyn Sender>("smtp");
//! });
//!
//! assert_eq!(container.get_trait::<dyn Sender>().unwrap().transport(), "smtp");
//! assert_eq!(container.get_trait_named::<dyn Sender>("sms").unwrap().transport(), "sms");
//! ```
//!
//! ## Profiles
//!
//! ```rust
//! use plugmap::{Container, Instance};
//! use std::sync::Arc;
//!
//! trait Store: Send + Sync { fn kind(&self) -> &'static str; }
//! struct Real;
//! impl Store for Real { fn kind(&self) -> &'static str { "real" } }
//! struct Stub;
//! impl Store for Stub { fn kind(&self) -> &'static str { "stub" } }
//!
//! let container = Container::new(|registry| {
//!     registry
//!         .add(Instance::of_trait::<dyn Store, _>(|_| Ok(Arc::new(Real))).named("real"))
//!         .add(Instance::of_trait::<dyn Store, _>(|_| Ok(Arc::new(Stub))).named("stub"))
//!         .set_default_trait::<dyn Store>("real")
//!         .profile_default_trait::<dyn Store>("testing", "stub");
//! });
//!
//! let testing = container.get_profile("testing");
//! assert_eq!(container.get_trait::<dyn Store>().unwrap().kind(), "real");
//! assert_eq!(testing.get_trait::<dyn Store>().unwrap().kind(), "stub");
//! ```

pub mod container;
pub mod error;
pub mod family;
pub mod generics;
pub mod instance;
pub mod key;
pub mod lifecycle;
pub mod policies;
pub mod registry;
pub mod session;

mod cache;
mod diagnostics;
mod graph;
mod internal;
mod pipeline;

pub use container::{Container, ExplicitArgs};
pub use error::{BuildError, BuildResult};
pub use family::{MissingInstanceFn, PluginFamily};
pub use generics::{close_trait_with, close_type_with, OpenTemplate};
pub use instance::{AnyArc, BuildPlan, Instance};
pub use internal::Dispose;
pub use key::TypeKey;
pub use lifecycle::Lifecycle;
pub use policies::{InstancePolicy, LifecyclePolicy};
pub use registry::Registry;
pub use session::BuildContext;
