//! Conversion service manager.
//!
//! Owns the single containerized image conversion service. The container is
//! reached only through two bind-mounted directories and an exec-style
//! command; every other component goes through [`ConversionServiceManager`].

mod docker;
mod runtime;

pub use docker::DockerCli;
pub use runtime::{BindMount, ContainerRuntime, ContainerSpec, ContainerStatus, ExecOutcome};

use crate::config::ServiceConfig;
use bitforge_av::TemplateContext;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while managing the conversion service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("Container {name} did not report running within {timeout_secs}s")]
    StartTimeout { name: String, timeout_secs: u64 },

    #[error("Conversion service has not been started")]
    NotStarted,

    #[error("Path {path} is outside the mounted directory {root}")]
    OutsideMount { path: PathBuf, root: PathBuf },

    #[error("Conversion service restarted more than {limit} times")]
    RestartLimit { limit: u32 },
}

impl ServiceError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

/// Lifecycle state of the conversion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    NotRunning,
    Starting,
    Running,
    Failed,
    Restarting,
    Stopped,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::NotRunning => "not running",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Failed => "failed",
            ServiceState::Restarting => "restarting",
            ServiceState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HostDirs {
    input: PathBuf,
    output: PathBuf,
}

struct Inner {
    state: ServiceState,
    dirs: Option<HostDirs>,
    restarts: u32,
}

/// Handle to the single conversion service instance.
pub struct ConversionServiceManager {
    runtime: Arc<dyn ContainerRuntime>,
    config: ServiceConfig,
    poll_interval: Duration,
    inner: Mutex<Inner>,
}

impl ConversionServiceManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: ServiceConfig) -> Self {
        Self {
            runtime,
            config,
            poll_interval: Duration::from_millis(250),
            inner: Mutex::new(Inner {
                state: ServiceState::NotRunning,
                dirs: None,
                restarts: 0,
            }),
        }
    }

    /// Override how often container status is polled while starting.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.container_name
    }

    pub fn state(&self) -> ServiceState {
        self.inner.lock().state
    }

    /// Restarts performed so far by this manager.
    pub fn restart_count(&self) -> u32 {
        self.inner.lock().restarts
    }

    /// Make sure a container with `input_dir` and `output_dir` mounted is running.
    ///
    /// A no-op when the service is already running with the same mounts.
    pub fn ensure_running(&self, input_dir: &Path, output_dir: &Path) -> Result<(), ServiceError> {
        let wanted = HostDirs {
            input: input_dir.to_path_buf(),
            output: output_dir.to_path_buf(),
        };

        let mut inner = self.inner.lock();
        if inner.state == ServiceState::Running && inner.dirs.as_ref() == Some(&wanted) {
            return Ok(());
        }

        let known = inner.dirs.as_ref() == Some(&wanted);
        let result = match self.runtime.status(self.name()) {
            Ok(ContainerStatus::Running) if known => Ok(()),
            Ok(ContainerStatus::Stopped) if known => {
                info!("Container {} is not running, restarting", self.name());
                inner.state = ServiceState::Restarting;
                self.runtime
                    .restart(self.name())
                    .and_then(|_| self.wait_until_running())
            }
            Ok(ContainerStatus::Missing) => {
                inner.state = ServiceState::Starting;
                self.create(&wanted)
            }
            Ok(status) => {
                // Not created by this manager, so even a stopped container is
                // replaced rather than restarted: its mounts are unknown
                info!(
                    "Replacing existing container {} ({:?})",
                    self.name(),
                    status
                );
                inner.state = ServiceState::Starting;
                self.runtime
                    .remove(self.name())
                    .and_then(|_| self.create(&wanted))
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                inner.state = ServiceState::Running;
                inner.dirs = Some(wanted);
                info!("Conversion service {} is running", self.name());
                Ok(())
            }
            Err(e) => {
                inner.state = ServiceState::Failed;
                Err(e)
            }
        }
    }

    /// Restart the service after it became unreachable.
    ///
    /// Returns only once the container reports running again.
    pub fn restart(&self) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock();
        let dirs = inner.dirs.clone().ok_or(ServiceError::NotStarted)?;

        inner.restarts += 1;
        if inner.restarts > self.config.max_restarts {
            inner.state = ServiceState::Failed;
            return Err(ServiceError::RestartLimit {
                limit: self.config.max_restarts,
            });
        }

        inner.state = ServiceState::Restarting;
        info!(
            "Restarting conversion service {} (restart {})",
            self.name(),
            inner.restarts
        );

        let result = match self.runtime.status(self.name()) {
            Ok(ContainerStatus::Missing) => self.create(&dirs),
            Ok(_) => self
                .runtime
                .restart(self.name())
                .and_then(|_| self.wait_until_running()),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                inner.state = ServiceState::Running;
                Ok(())
            }
            Err(e) => {
                inner.state = ServiceState::Failed;
                Err(e)
            }
        }
    }

    /// Convert `input` into `output` inside the container.
    ///
    /// A non-zero exit is reported as [`ExecOutcome::Exited`]; an `Err` is a
    /// problem with the request itself, such as a path outside the mounts.
    pub fn convert(&self, input: &Path, output: &Path) -> Result<ExecOutcome, ServiceError> {
        let command = {
            let inner = self.inner.lock();
            let dirs = inner.dirs.as_ref().ok_or(ServiceError::NotStarted)?;
            if inner.state != ServiceState::Running {
                return Ok(ExecOutcome::Unreachable(format!(
                    "conversion service is {}",
                    inner.state
                )));
            }

            let input = to_container_path(input, &dirs.input, &self.config.input_mount)?;
            let output = to_container_path(output, &dirs.output, &self.config.output_mount)?;
            TemplateContext::new()
                .with_paths(&input, &output)
                .substitute_all(&self.config.command)
        };

        debug!("Converting in {}: {}", self.name(), command.join(" "));
        Ok(self.runtime.exec(self.name(), &command))
    }

    /// Tear down the container. Safe to call when nothing is running.
    pub fn stop_and_remove(&self) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock();
        match self.runtime.status(self.name())? {
            ContainerStatus::Missing => {
                debug!("No container named {} to remove", self.name());
            }
            _ => {
                self.runtime.remove(self.name())?;
                info!("Removed conversion service {}", self.name());
            }
        }
        inner.state = ServiceState::Stopped;
        inner.dirs = None;
        Ok(())
    }

    fn create(&self, dirs: &HostDirs) -> Result<(), ServiceError> {
        let spec = ContainerSpec {
            name: self.config.container_name.clone(),
            image: self.config.image.clone(),
            entrypoint: self.config.entrypoint.clone(),
            args: self.config.run_args.clone(),
            mounts: vec![
                BindMount {
                    host: dirs.input.clone(),
                    container: self.config.input_mount.clone(),
                },
                BindMount {
                    host: dirs.output.clone(),
                    container: self.config.output_mount.clone(),
                },
            ],
        };
        info!("Starting conversion service {} from {}", spec.name, spec.image);
        self.runtime.create(&spec)?;
        self.wait_until_running()
    }

    fn wait_until_running(&self) -> Result<(), ServiceError> {
        let deadline = Instant::now() + self.config.start_timeout();
        loop {
            match self.runtime.status(self.name())? {
                ContainerStatus::Running => return Ok(()),
                status => debug!("Waiting for {} ({:?})", self.name(), status),
            }
            if Instant::now() >= deadline {
                warn!("Container {} did not come up", self.name());
                return Err(ServiceError::StartTimeout {
                    name: self.name().to_string(),
                    timeout_secs: self.config.start_timeout_secs,
                });
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

fn to_container_path(path: &Path, host_root: &Path, mount: &Path) -> Result<PathBuf, ServiceError> {
    path.strip_prefix(host_root)
        .map(|relative| mount.join(relative))
        .map_err(|_| ServiceError::OutsideMount {
            path: path.to_path_buf(),
            root: host_root.to_path_buf(),
        })
}
