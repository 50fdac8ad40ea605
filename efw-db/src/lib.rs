//! # efw-db
//!
//! Named database connections for request-handling threads.
//!
//! A [`ResourceRegistry`] is built once at startup from a
//! [`ResourceConfig`] and shared by every worker. Each request owns a
//! [`ConnectionContext`] that the registry opens connections into; the
//! request closes them all when it ends.
//!
//! ## Resolution modes
//!
//! - **Web**: names are looked up in a [`NamingService`] on every open.
//!   Bare names are resolved under a fixed root (`java:comp/env` by
//!   default); names carrying the root's scheme are used as given.
//! - **Batch**: `efw.jdbc.resource[.n]` descriptors are read from
//!   configuration at startup and connected through a [`Driver`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use efw_db::{MemoryNamingService, ResourceRegistry};
//!
//! let naming = MemoryNamingService::new();
//! naming.bind("java:comp/env/jdbc/efw", Arc::new(my_data_source));
//!
//! let registry = ResourceRegistry::web(&properties, Arc::new(naming))?;
//!
//! registry.scope(|ctx| {
//!     registry.open(ctx, None)?;
//!     let db = registry.get(ctx, None).expect("just opened");
//!     // use db.downcast_mut::<MyConnection>() ...
//!     Ok::<_, efw_db::DbError>(())
//! })?;
//! ```
//!
//! Code without access to the context, such as script bindings, goes
//! through the ambient [`RequestScope`] instead.

#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod registry;
mod resolver;
mod scope;
mod source;

pub use config::{DEFAULT_NAMING_ROOT, DataSourceDescriptor, ResolutionMode, ResourceConfig};
pub use context::{ConnectionContext, Database};
pub use error::{BoxError, DbError, DbResult};
pub use registry::{Backend, ResourceRegistry};
pub use resolver::{NamingResolver, Resolver, StaticResolver};
pub use scope::RequestScope;
pub use source::{Connection, DataSource, Driver, MemoryNamingService, NamingService, StaticDataSource};
