use super::ServiceError;
use std::path::PathBuf;

/// Observed state of a named container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// No container with that name exists
    Missing,
    Running,
    /// Exists but is not running
    Stopped,
}

/// A host directory bind-mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub host: PathBuf,
    pub container: PathBuf,
}

/// Everything needed to create the conversion container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub entrypoint: Option<String>,
    pub args: Vec<String>,
    pub mounts: Vec<BindMount>,
}

/// Result of a command run inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// The command ran and exited with this code
    Exited(i32),
    /// The container could not be reached at all
    Unreachable(String),
}

impl ExecOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecOutcome::Exited(0))
    }
}

/// Low-level container operations used by the service manager.
pub trait ContainerRuntime: Send + Sync {
    fn status(&self, name: &str) -> Result<ContainerStatus, ServiceError>;

    fn create(&self, spec: &ContainerSpec) -> Result<(), ServiceError>;

    fn restart(&self, name: &str) -> Result<(), ServiceError>;

    /// Force-remove the container, stopping it first if needed.
    fn remove(&self, name: &str) -> Result<(), ServiceError>;

    /// Run a command synchronously inside the container.
    fn exec(&self, name: &str, command: &[String]) -> ExecOutcome;
}
