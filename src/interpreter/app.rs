#[cfg(feature = "tracing")]
use tracing::info;

use super::{
    Engine, EngineError, EngineOptions, InterpreterHandle, InterpreterKey,
    InterpreterRegistry,
};
use crate::config::AppConfig;
use crate::replacer::Replacer;

/// The PHP app of one loaded configuration.
///
/// Every configuration load builds a new `PhpApp` and starts it against the
/// same registry. Starting while another configuration still holds the
/// interpreter is a reload: the engine is shut down and initialized again
/// with this app's options.
pub struct PhpApp<E: Engine> {
    config: AppConfig,
    registry: InterpreterRegistry<E>,
    handle: Option<InterpreterHandle<E>>,
}

impl<E: Engine> PhpApp<E> {
    pub fn new(config: AppConfig, registry: InterpreterRegistry<E>) -> Self {
        Self {
            config,
            registry,
            handle: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn start(&mut self) -> Result<(), EngineError> {
        let options = EngineOptions::from_config(&self.config, &Replacer::new());

        let (handle, loaded) = self
            .registry
            .acquire_or_init(InterpreterKey::MAIN, &options)?;

        if loaded {
            self.registry.reinit(&handle, &options)?;
        }

        self.handle = Some(handle);

        Ok(())
    }

    /// Marks the app stopped. The interpreter stays up until the last app
    /// holding it is dropped.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        #[cfg(feature = "tracing")]
        info!("PHP app stopped 🐘");

        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// The engine, once started.
    pub fn engine(&self) -> Option<&E> {
        self.handle
            .as_ref()
            .map(|h| h.engine())
    }
}

impl<E: Engine> std::fmt::Debug for PhpApp<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhpApp")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .finish()
    }
}
