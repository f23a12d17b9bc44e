//! Reference-counted registry owning the engine.
//!
//! Every configuration that starts the interpreter acquires a handle under a
//! key. The first acquisition initializes the engine; later ones find it
//! present and decide whether to reinitialize. Dropping the last handle of a
//! key shuts the engine down. All engine lifecycle calls happen while the
//! registry lock is held, so at most one init or shutdown runs at a time.
//!
//! An entry remembers whether its engine is live. A reinit that fails after
//! the shutdown leaves the entry held but not live; nothing shuts it down
//! again, and the next acquisition or reinit initializes it directly.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

use super::{Engine, EngineError, EngineOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterpreterKey(&'static str);

impl InterpreterKey {
    /// Key of the process-wide interpreter.
    pub const MAIN: Self = Self("main");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for InterpreterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    refs: usize,
    live: bool,
}

struct Inner<E> {
    engine: Arc<E>,
    entries: Mutex<HashMap<InterpreterKey, Entry>>,
}

pub struct InterpreterRegistry<E: Engine> {
    inner: Arc<Inner<E>>,
}

impl<E: Engine> Clone for InterpreterRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Engine> fmt::Debug for InterpreterRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpreterRegistry")
            .field("entries", &*self.lock())
            .finish()
    }
}

impl<E: Engine> InterpreterRegistry<E> {
    pub fn new(engine: E) -> Self {
        Self::from_arc(Arc::new(engine))
    }

    pub fn from_arc(engine: Arc<E>) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.inner.engine
    }

    /// Takes a reference on `key`, initializing the engine if nobody holds one.
    ///
    /// Returns the handle and whether a live engine was already present. When
    /// it was, the engine is left untouched; the caller decides whether to
    /// [`reinit`](Self::reinit) it. A held entry whose engine is down is
    /// initialized without a prior shutdown.
    pub fn acquire_or_init(
        &self,
        key: InterpreterKey,
        options: &EngineOptions,
    ) -> Result<(InterpreterHandle<E>, bool), EngineError> {
        let mut entries = self.lock();

        if let Some(entry) = entries.get_mut(&key) {
            if entry.live {
                entry.refs += 1;

                #[cfg(feature = "tracing")]
                debug!(key = %key, refs = entry.refs, "Interpreter already loaded");

                return Ok((self.handle(key), true));
            }

            self.inner.engine.init(options)?;
            entry.live = true;
            entry.refs += 1;
        } else {
            self.inner.engine.init(options)?;
            entries.insert(key, Entry { refs: 1, live: true });
        }

        #[cfg(feature = "tracing")]
        info!(
            key = %key,
            num_threads = options.num_threads,
            workers = options.workers.len(),
            "Interpreter initialized"
        );

        Ok((self.handle(key), false))
    }

    /// Shuts the engine down and initializes it again with `options`.
    ///
    /// The shutdown is skipped when the engine is already down. If the init
    /// fails the entry stays held but is marked down.
    pub fn reinit(
        &self,
        handle: &InterpreterHandle<E>,
        options: &EngineOptions,
    ) -> Result<(), EngineError> {
        let mut entries = self.lock();
        let entry = entries
            .entry(handle.key)
            .or_insert(Entry { refs: 1, live: false });

        #[cfg(feature = "tracing")]
        info!(key = %handle.key, live = entry.live, "Reloading interpreter");

        if entry.live {
            self.inner.engine.shutdown();
            entry.live = false;
        }

        self.inner.engine.init(options)?;
        entry.live = true;
        Ok(())
    }

    /// Gives a handle back. Same as dropping it.
    pub fn release(&self, handle: InterpreterHandle<E>) {
        drop(handle);
    }

    /// Number of live handles for `key`.
    pub fn references(&self, key: InterpreterKey) -> usize {
        self.lock()
            .get(&key)
            .map_or(0, |entry| entry.refs)
    }

    /// Whether the engine behind `key` is initialized.
    pub fn is_live(&self, key: InterpreterKey) -> bool {
        self.lock()
            .get(&key)
            .is_some_and(|entry| entry.live)
    }

    fn handle(&self, key: InterpreterKey) -> InterpreterHandle<E> {
        InterpreterHandle {
            key,
            registry: self.clone(),
        }
    }

    fn release_key(&self, key: InterpreterKey) {
        let mut entries = self.lock();

        let Some(entry) = entries.get_mut(&key) else {
            return;
        };

        entry.refs -= 1;
        if entry.refs > 0 {
            return;
        }

        let live = entry.live;
        entries.remove(&key);

        if live {
            self.inner.engine.shutdown();

            #[cfg(feature = "tracing")]
            info!(key = %key, "Interpreter shut down");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<InterpreterKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A reference on a registry entry. Dropping it releases the reference.
pub struct InterpreterHandle<E: Engine> {
    key: InterpreterKey,
    registry: InterpreterRegistry<E>,
}

impl<E: Engine> InterpreterHandle<E> {
    pub fn key(&self) -> InterpreterKey {
        self.key
    }

    pub fn engine(&self) -> &E {
        self.registry.engine()
    }
}

impl<E: Engine> fmt::Debug for InterpreterHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpreterHandle")
            .field("key", &self.key)
            .finish()
    }
}

impl<E: Engine> Drop for InterpreterHandle<E> {
    fn drop(&mut self) {
        self.registry.release_key(self.key);
    }
}
