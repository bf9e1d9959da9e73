//! Explicit context shared by the sync components.
//!
//! The composition root owns one `SyncContext` and lends it to every
//! coordinator; there is no process-wide engine instance.

use crate::clock::{Clock, SystemClock};
use crate::config::InkNoteConfig;
use crate::engine::InkEngine;
use crate::package::PackageGateway;
use std::time::Instant;

pub struct SyncContext<E: InkEngine> {
    engine: E,
    config: InkNoteConfig,
    clock: Box<dyn Clock>,
}

impl<E: InkEngine> SyncContext<E> {
    pub fn new(engine: E, config: InkNoteConfig) -> Self {
        Self::with_clock(engine, config, SystemClock)
    }

    pub fn with_clock(engine: E, config: InkNoteConfig, clock: impl Clock + 'static) -> Self {
        Self {
            engine,
            config,
            clock: Box::new(clock),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &InkNoteConfig {
        &self.config
    }

    pub fn gateway(&self) -> PackageGateway<'_, E> {
        PackageGateway::new(&self.engine)
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }
}
