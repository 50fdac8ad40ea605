//! Request-owned connection sets.

use crate::error::BoxError;
use crate::source::Connection;
use crate::{DbError, DbResult};
use efw_log::{debug, warn};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// An open connection together with the resource it was opened for.
pub struct Database {
    id: u64,
    name: String,
    opened_at: Instant,
    connection: Box<dyn Connection>,
}

impl Database {
    pub(crate) fn new(name: impl Into<String>, connection: Box<dyn Connection>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            opened_at: Instant::now(),
            connection,
        }
    }

    /// Process-unique id of this connection.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resource name the connection was opened for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the connection was opened.
    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// The driver connection.
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    /// The driver connection, mutably.
    pub fn connection_mut(&mut self) -> &mut dyn Connection {
        self.connection.as_mut()
    }

    /// The driver connection as its concrete type.
    pub fn downcast_ref<T: Connection>(&self) -> Option<&T> {
        let any: &dyn Any = self.connection.as_ref();
        any.downcast_ref()
    }

    /// The driver connection as its concrete type, mutably.
    pub fn downcast_mut<T: Connection>(&mut self) -> Option<&mut T> {
        let any: &mut dyn Any = self.connection.as_mut();
        any.downcast_mut()
    }

    pub(crate) fn close(mut self) -> Result<(), BoxError> {
        debug!("Closing connection {} for {}", self.id, self.name);
        self.connection.close()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("closed", &self.connection.is_closed())
            .finish()
    }
}

/// The connections opened by one request, keyed by resource name.
///
/// A context is owned by the request that created it; nothing else can
/// observe its connections. It holds at most one connection per name.
/// Whatever is still open when the context is dropped gets closed then.
#[derive(Default)]
pub struct ConnectionContext {
    databases: HashMap<String, Database>,
}

impl ConnectionContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// The connection open for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Database> {
        self.databases.get(name)
    }

    /// The connection open for `name`, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Database> {
        self.databases.get_mut(name)
    }

    /// Whether a connection is open for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.databases.contains_key(name)
    }

    /// Names with an open connection, unordered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.databases.len()
    }

    /// Whether no connection is open.
    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    /// Store `database` under its name, returning the one it replaced.
    pub(crate) fn insert(&mut self, database: Database) -> Option<Database> {
        self.databases.insert(database.name.clone(), database)
    }

    /// Close every connection and empty the context.
    ///
    /// Every connection is attempted even if an earlier one fails; the
    /// first failure is returned. Calling this on an empty context is a
    /// no-op.
    pub fn close_all(&mut self) -> DbResult<()> {
        let mut first_error = None;

        for (name, database) in self.databases.drain() {
            if let Err(source) = database.close() {
                warn!("Failed to close connection for {}: {}", name, source);
                first_error.get_or_insert(DbError::Close { name, source });
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for ConnectionContext {
    fn drop(&mut self) {
        if !self.databases.is_empty() {
            warn!(
                "Connection context dropped with {} open connection(s); closing",
                self.databases.len()
            );
            let _ = self.close_all();
        }
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.databases.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    struct TrackedConnection {
        closes: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Connection for TrackedConnection {
        fn close(&mut self) -> Result<(), BoxError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail { Err("close refused".into()) } else { Ok(()) }
        }
    }

    fn tracked(closes: &Arc<AtomicUsize>, fail: bool) -> Box<dyn Connection> {
        Box::new(TrackedConnection {
            closes: closes.clone(),
            fail,
        })
    }

    #[test]
    fn test_close_all_attempts_every_connection() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut ctx = ConnectionContext::new();
        ctx.insert(Database::new("a", tracked(&closes, true)));
        ctx.insert(Database::new("b", tracked(&closes, false)));
        ctx.insert(Database::new("c", tracked(&closes, true)));

        let err = ctx.close_all().unwrap_err();
        assert!(matches!(err, DbError::Close { .. }));
        assert_eq!(closes.load(Ordering::SeqCst), 3);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_close_all_twice_is_noop() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut ctx = ConnectionContext::new();
        ctx.insert(Database::new("a", tracked(&closes, false)));

        ctx.close_all().unwrap();
        ctx.close_all().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_closes_leftovers() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let mut ctx = ConnectionContext::new();
            ctx.insert(Database::new("a", tracked(&closes, false)));
            ctx.insert(Database::new("b", tracked(&closes, false)));
        }
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_downcast_to_driver_type() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut db = Database::new("a", tracked(&closes, false));
        assert!(db.downcast_ref::<TrackedConnection>().is_some());
        db.downcast_mut::<TrackedConnection>().unwrap().fail = true;
        assert!(db.close().is_err());
    }

    #[test]
    fn test_ids_are_unique() {
        let closes = Arc::new(AtomicUsize::new(0));
        let a = Database::new("a", tracked(&closes, false));
        let b = Database::new("a", tracked(&closes, false));
        assert_ne!(a.id(), b.id());
    }
}
