//! Call-scoped statement cache.
//!
//! Parsed statements are published per thread, keyed by SQL text, so every
//! pipeline stage reuses one parse instead of re-parsing. Parse failures are
//! cached too, which keeps "at most one parse per call" true for bad SQL.
//!
//! The cache lives for the duration of a [`StatementScope`]. Dropping the
//! outermost scope clears it, on success, error or unwind alike.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    marker::PhantomData,
    sync::Arc
};

use tracing::trace;

use crate::{
    error::GuardError,
    query::{self, SqlDialect, Statement}
};

/// Entries kept per thread before eviction kicks in
const MAX_ENTRIES: usize = 256;

thread_local! {
    static STATEMENT_CACHE: RefCell<StatementCache> = RefCell::new(StatementCache::new(MAX_ENTRIES));
    static SCOPE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

type CachedParse = Result<Arc<Statement>, (String, String)>;

/// Bounded map of SQL text to parse outcome
pub struct StatementCache {
    cache:    HashMap<String, CachedParse>,
    max_size: usize
}

impl StatementCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            cache: HashMap::with_capacity(max_size.min(64)),
            max_size
        }
    }

    pub fn get(&self, sql: &str) -> Option<Result<Arc<Statement>, GuardError>> {
        self.cache.get(sql).map(|entry| match entry {
            Ok(statement) => Ok(Arc::clone(statement)),
            Err((snippet, reason)) => Err(GuardError::Parse {
                sql:    snippet.clone(),
                reason: reason.clone()
            })
        })
    }

    pub fn insert(&mut self, sql: &str, statement: Arc<Statement>) {
        self.make_room();
        self.cache.insert(sql.to_owned(), Ok(statement));
    }

    fn insert_failure(&mut self, sql: &str, err: &GuardError) {
        if let GuardError::Parse {
            sql: snippet,
            reason
        } = err
        {
            self.make_room();
            self.cache
                .insert(sql.to_owned(), Err((snippet.clone(), reason.clone())));
        }
    }

    // Simple eviction: clear half when full
    fn make_room(&mut self) {
        if self.cache.len() >= self.max_size {
            let keys: Vec<_> = self
                .cache
                .keys()
                .take(self.max_size / 2 + 1)
                .cloned()
                .collect();
            for key in keys {
                self.cache.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// RAII guard bounding the lifetime of cached statements on this thread.
///
/// Scopes nest; only the outermost one clears the cache when dropped. The
/// guard is deliberately `!Send` so it cannot leave the thread it guards.
pub struct StatementScope {
    _not_send: PhantomData<*const ()>
}

impl StatementScope {
    pub fn enter() -> Self {
        SCOPE_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self {
            _not_send: PhantomData
        }
    }
}

impl Drop for StatementScope {
    fn drop(&mut self) {
        let remaining = SCOPE_DEPTH.with(|depth| {
            let next = depth.get().saturating_sub(1);
            depth.set(next);
            next
        });
        if remaining == 0 {
            clear();
            trace!("statement cache cleared");
        }
    }
}

/// Cached statement for this SQL text on the current thread
pub fn get_cached(sql: &str) -> Option<Result<Arc<Statement>, GuardError>> {
    STATEMENT_CACHE.with(|cache| cache.borrow().get(sql))
}

/// Publish a statement for this SQL text on the current thread
pub fn cache_statement(sql: &str, statement: Arc<Statement>) {
    STATEMENT_CACHE.with(|cache| cache.borrow_mut().insert(sql, statement));
}

/// Cached parse, or parse now and publish the outcome
pub fn get_or_parse(sql: &str, dialect: SqlDialect) -> Result<Arc<Statement>, GuardError> {
    if let Some(cached) = get_cached(sql) {
        return cached;
    }
    match query::parse(sql, dialect) {
        Ok(statement) => {
            let statement = Arc::new(statement);
            cache_statement(sql, Arc::clone(&statement));
            Ok(statement)
        }
        Err(err) => {
            STATEMENT_CACHE.with(|cache| cache.borrow_mut().insert_failure(sql, &err));
            Err(err)
        }
    }
}

pub fn cached_len() -> usize {
    STATEMENT_CACHE.with(|cache| cache.borrow().len())
}

pub fn clear() {
    STATEMENT_CACHE.with(|cache| cache.borrow_mut().clear());
}
