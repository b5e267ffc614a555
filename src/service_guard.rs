//! Cleanup of services started during a run
//!
//! Once the wizard starts a long-running unit (the node), leaving the run
//! early must stop it again, whichever way the run ends: an error, a quit at
//! a prompt, closed input, or a signal.
//!
//! - Started units are recorded in a global registry
//! - [`ServiceGuard`] stops them on drop unless the run completed and
//!   [`ServiceGuard::release`] was called
//! - The signal thread stops them before exiting with code 1

use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, error, info, warn};

use crate::error::CancelReason;
use crate::services::{ServiceAction, ServiceManager};

/// Global registry of started units
static SERVICE_REGISTRY: OnceLock<Arc<Mutex<ServiceRegistry>>> = OnceLock::new();

/// Units to stop if the run does not complete
#[derive(Default)]
pub struct ServiceRegistry {
    units: Vec<String>,
    manager: Option<Arc<dyn ServiceManager>>,
    /// Set once stopping has begun, so signal and drop do not both stop
    cleanup_initiated: bool,
}

impl ServiceRegistry {
    pub fn global() -> Arc<Mutex<ServiceRegistry>> {
        SERVICE_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ServiceRegistry::default())))
            .clone()
    }

    /// Service manager used to stop units
    pub fn attach(&mut self, manager: Arc<dyn ServiceManager>) {
        self.manager = Some(manager);
    }

    pub fn register(&mut self, unit: &str) {
        if !self.units.iter().any(|u| u == unit) {
            self.units.push(unit.to_string());
            debug!(unit, "Registered started service");
        }
    }

    pub fn count(&self) -> usize {
        self.units.len()
    }

    /// Forget every unit without stopping it.
    pub fn release_all(&mut self) -> Vec<String> {
        std::mem::take(&mut self.units)
    }

    /// Stop every registered unit, most recently started first.
    pub fn stop_all(&mut self) {
        if self.cleanup_initiated {
            debug!("Service cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.units.is_empty() {
            debug!("No started services to stop");
            return;
        }
        let Some(manager) = self.manager.clone() else {
            warn!(units = ?self.units, "No service manager attached, cannot stop services");
            return;
        };

        info!("Stopping {} service(s) started by this run", self.units.len());
        for unit in self.units.drain(..).rev() {
            if let Err(e) = manager.run(ServiceAction::Stop, &unit) {
                error!(%unit, error = %e, "Failed to stop service");
            }
        }
    }
}

/// Scoped cleanup obligation for started services
pub struct ServiceGuard {
    registry: Arc<Mutex<ServiceRegistry>>,
    armed: bool,
}

impl ServiceGuard {
    pub fn with_registry(registry: Arc<Mutex<ServiceRegistry>>, manager: Arc<dyn ServiceManager>) -> Self {
        if let Ok(mut r) = registry.lock() {
            r.attach(manager);
        }
        Self {
            registry,
            armed: true,
        }
    }

    /// Record that `unit` was started by this run.
    pub fn started(&self, unit: &str) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.register(unit);
        }
    }

    /// The run completed: leave the services running.
    pub fn release(mut self) {
        self.armed = false;
        if let Ok(mut registry) = self.registry.lock() {
            let units = registry.release_all();
            debug!(?units, "Leaving services running");
        }
    }
}

impl Drop for ServiceGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!("ServiceGuard dropped, stopping started services");
        if let Ok(mut registry) = self.registry.lock() {
            registry.stop_all();
        }
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP that stop started
/// services and exit with code 1. Call once at startup.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };
            info!(signal = signal_name, reason = %CancelReason::Interrupted, "Received signal, cleaning up");
            println!();
            println!("Exiting the setup wizard.");

            if let Ok(mut registry) = ServiceRegistry::global().lock() {
                registry.stop_all();
            }
            std::process::exit(1);
        }
    });

    Ok(())
}
