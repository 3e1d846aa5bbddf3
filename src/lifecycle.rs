//! Registration lifecycle of the resources metrics collector.
//!
//! `CollectorRunner` owns an explicitly injected registry handle. `start`
//! registers the collector, `run` keeps it registered until the shutdown
//! future resolves, and `stop` unregisters it. Only the elected leader
//! should run it; the election itself is left to whoever drives the
//! runner (see [`LeaderElectionRunnable`]).

use prometheus::Registry;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::collector::ResourcesMetricsCollector;

/// Something an external coordinator starts, possibly only on the leader.
pub trait LeaderElectionRunnable {
    /// Whether this task must run on the elected leader only.
    fn needs_leader_election(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("collector descriptors are already registered")]
    AlreadyRegistered,

    #[error("failed to register collector: {0}")]
    Registry(#[source] prometheus::Error),
}

impl From<prometheus::Error> for RegistrationError {
    fn from(err: prometheus::Error) -> Self {
        match err {
            prometheus::Error::AlreadyReg => RegistrationError::AlreadyRegistered,
            other => RegistrationError::Registry(other),
        }
    }
}

/// Registration state of a [`CollectorRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Unregistered,
    Registered,
}

/// Keeps a [`ResourcesMetricsCollector`] registered for the life of the
/// process.
pub struct CollectorRunner {
    collector: ResourcesMetricsCollector,
    registry: Registry,
    registered: AtomicBool,
}

impl CollectorRunner {
    pub fn new(collector: ResourcesMetricsCollector, registry: Registry) -> Self {
        Self {
            collector,
            registry,
            registered: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> RunnerState {
        if self.registered.load(Ordering::SeqCst) {
            RunnerState::Registered
        } else {
            RunnerState::Unregistered
        }
    }

    pub fn collector(&self) -> &ResourcesMetricsCollector {
        &self.collector
    }

    /// Registers the collector. Starting an already started runner is a
    /// no-op.
    pub fn start(&self) -> Result<(), RegistrationError> {
        if self.registered.load(Ordering::SeqCst) {
            debug!("Resources metrics collector already registered");
            return Ok(());
        }

        info!("Registering resources metrics collector");
        self.registry.register(Box::new(self.collector.clone()))?;
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Unregisters the collector. Idempotent.
    pub fn stop(&self) {
        if !self.registered.swap(false, Ordering::SeqCst) {
            debug!("Resources metrics collector not registered, nothing to stop");
            return;
        }

        info!("Unregistering resources metrics collector");
        if let Err(e) = self.registry.unregister(Box::new(self.collector.clone())) {
            warn!("Failed to unregister resources metrics collector: {}", e);
        }
    }

    /// Registers the collector, waits for `shutdown`, then unregisters.
    ///
    /// Scrapes already in flight when `shutdown` resolves run to
    /// completion; later scrapes no longer see the collector.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), RegistrationError>
    where
        F: Future<Output = ()>,
    {
        self.start()?;
        shutdown.await;
        self.stop();
        Ok(())
    }
}

impl LeaderElectionRunnable for CollectorRunner {
    fn needs_leader_election(&self) -> bool {
        true
    }
}

/// Whether a runnable should be started on this instance.
pub fn should_run<R: LeaderElectionRunnable + ?Sized>(runnable: &R, is_leader: bool) -> bool {
    is_leader || !runnable.needs_leader_election()
}

/// Starts `runner` if this instance may run it.
///
/// Returns whether the collector is registered afterwards. A registration
/// failure is logged and only disables the collector.
pub fn start_if_leader(runner: &CollectorRunner, is_leader: bool) -> bool {
    if !should_run(runner, is_leader) {
        info!("Not the leader - resources metrics collector stays unregistered");
        return false;
    }

    match runner.start() {
        Ok(()) => true,
        Err(e) => {
            error!("Resources metrics collector disabled: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ReportCache;
    use std::sync::Arc;

    fn runner(registry: &Registry) -> CollectorRunner {
        let collector =
            ResourcesMetricsCollector::new(Arc::new(ReportCache::new()), Vec::new()).unwrap();
        CollectorRunner::new(collector, registry.clone())
    }

    #[test]
    fn test_start_then_stop_transitions_state() {
        let registry = Registry::new();
        let runner = runner(&registry);
        assert_eq!(runner.state(), RunnerState::Unregistered);

        runner.start().unwrap();
        assert_eq!(runner.state(), RunnerState::Registered);

        runner.stop();
        assert_eq!(runner.state(), RunnerState::Unregistered);
    }

    #[test]
    fn test_stop_twice_is_noop() {
        let registry = Registry::new();
        let runner = runner(&registry);
        runner.start().unwrap();
        runner.stop();
        runner.stop();
        assert_eq!(runner.state(), RunnerState::Unregistered);
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let registry = Registry::new();
        runner(&registry).stop();
    }

    #[test]
    fn test_start_twice_is_noop() {
        let registry = Registry::new();
        let runner = runner(&registry);
        runner.start().unwrap();
        runner.start().unwrap();
        assert_eq!(runner.state(), RunnerState::Registered);
    }

    #[test]
    fn test_conflicting_registration_fails() {
        let registry = Registry::new();
        let first = runner(&registry);
        let second = runner(&registry);

        first.start().unwrap();
        let err = second.start().unwrap_err();
        assert!(matches!(err, RegistrationError::AlreadyRegistered));
        assert_eq!(second.state(), RunnerState::Unregistered);
    }

    #[test]
    fn test_reregistration_after_stop() {
        let registry = Registry::new();
        let first = runner(&registry);
        let second = runner(&registry);

        first.start().unwrap();
        first.stop();
        second.start().unwrap();
        assert_eq!(second.state(), RunnerState::Registered);
    }

    #[test]
    fn test_leader_gating() {
        let registry = Registry::new();
        let runner = runner(&registry);
        assert!(runner.needs_leader_election());
        assert!(should_run(&runner, true));
        assert!(!should_run(&runner, false));
    }

    #[test]
    fn test_start_if_leader_skips_followers() {
        let registry = Registry::new();
        let runner = runner(&registry);
        assert!(!start_if_leader(&runner, false));
        assert_eq!(runner.state(), RunnerState::Unregistered);
        assert!(start_if_leader(&runner, true));
        assert_eq!(runner.state(), RunnerState::Registered);
    }

    #[test]
    fn test_start_if_leader_survives_registration_failure() {
        let registry = Registry::new();
        let first = runner(&registry);
        let second = runner(&registry);
        assert!(start_if_leader(&first, true));

        assert!(!start_if_leader(&second, true));
        assert_eq!(second.state(), RunnerState::Unregistered);
        // The registry keeps serving the collector that did register.
        assert_eq!(first.state(), RunnerState::Registered);
        registry.gather();
    }

    #[tokio::test]
    async fn test_run_unregisters_on_shutdown() {
        let registry = Registry::new();
        let first = runner(&registry);

        first.run(async {}).await.unwrap();
        assert_eq!(first.state(), RunnerState::Unregistered);

        // The descriptors are free again.
        let second = runner(&registry);
        second.start().unwrap();
    }
}
