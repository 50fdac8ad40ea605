//! Ambient request scope.
//!
//! Code that cannot be handed a [`ConnectionContext`] explicitly (native
//! functions called from scripts, for example) reaches the current
//! request's context through a [`RequestScope`]. The scope is bound to the
//! thread that entered it and cannot be sent elsewhere.

use crate::context::ConnectionContext;
use crate::{DbError, DbResult};
use efw_log::trace;
use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static CURRENT: RefCell<Option<ConnectionContext>> = const { RefCell::new(None) };
}

/// Guard owning the current thread's request context.
///
/// Dropping the guard closes whatever is still open; call
/// [`finish`](Self::finish) to observe close failures instead.
pub struct RequestScope {
    _not_send: PhantomData<*const ()>,
}

impl RequestScope {
    /// Install a fresh context for this thread.
    ///
    /// Fails with [`DbError::ScopeActive`] if a scope is already active.
    pub fn enter() -> DbResult<Self> {
        CURRENT.with(|current| {
            let mut slot = current.try_borrow_mut().map_err(|_| DbError::ScopeBusy)?;
            if slot.is_some() {
                return Err(DbError::ScopeActive);
            }
            *slot = Some(ConnectionContext::new());
            trace!("Request scope entered");
            Ok(RequestScope {
                _not_send: PhantomData,
            })
        })
    }

    /// Whether a scope is active on this thread.
    pub fn is_active() -> bool {
        CURRENT.with(|current| current.try_borrow().map(|slot| slot.is_some()).unwrap_or(true))
    }

    /// Run `f` against the current thread's context.
    ///
    /// Fails with [`DbError::NoActiveScope`] outside a scope and with
    /// [`DbError::ScopeBusy`] when called from inside another `with_current`.
    pub fn with_current<T>(f: impl FnOnce(&mut ConnectionContext) -> T) -> DbResult<T> {
        CURRENT.with(|current| {
            let mut slot = current.try_borrow_mut().map_err(|_| DbError::ScopeBusy)?;
            let ctx = slot.as_mut().ok_or(DbError::NoActiveScope)?;
            Ok(f(ctx))
        })
    }

    /// Leave the scope, closing every connection and returning the first
    /// close failure.
    pub fn finish(self) -> DbResult<()> {
        match Self::take() {
            Some(mut ctx) => ctx.close_all(),
            None => Ok(()),
        }
    }

    fn take() -> Option<ConnectionContext> {
        CURRENT.with(|current| current.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        // Dropping the context closes anything left open.
        drop(Self::take());
        trace!("Request scope left");
    }
}
