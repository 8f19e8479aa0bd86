//! Docker CLI backed container runtime.

use super::runtime::{ContainerRuntime, ContainerSpec, ContainerStatus, ExecOutcome};
use super::ServiceError;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, trace};

/// Line prefixes of docker client messages that mean the container itself is
/// unreachable rather than the command inside it failing.
const TRANSPORT_ERRORS: &[&str] = &[
    "Error response from daemon:",
    "Cannot connect to the Docker daemon",
    "Error: No such container",
];

/// Drives containers through the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn run(&self, args: &[&str]) -> Result<Output, ServiceError> {
        trace!("docker {}", args.join(" "));
        Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| ServiceError::runtime(format!("Failed to run docker: {}", e)))
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output, ServiceError> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::runtime(format!(
                "docker {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

impl ContainerRuntime for DockerCli {
    fn status(&self, name: &str) -> Result<ContainerStatus, ServiceError> {
        let output = self.run(&["inspect", "--format", "{{.State.Running}}", name])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_inspect(output.status.success(), &stdout, &stderr)
    }

    fn create(&self, spec: &ContainerSpec) -> Result<(), ServiceError> {
        let args = run_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run_checked(&args)?;
        debug!(
            "Created container {} ({})",
            spec.name,
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    fn restart(&self, name: &str) -> Result<(), ServiceError> {
        self.run_checked(&["restart", name])?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), ServiceError> {
        self.run_checked(&["rm", "-f", name])?;
        Ok(())
    }

    fn exec(&self, name: &str, command: &[String]) -> ExecOutcome {
        let mut args = vec!["exec", name];
        args.extend(command.iter().map(String::as_str));
        match self.run(&args) {
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    debug!("{} stderr: {}", name, stderr.trim());
                }
                classify_exec(output.status.code(), &stderr)
            }
            Err(e) => ExecOutcome::Unreachable(e.to_string()),
        }
    }
}

fn parse_inspect(success: bool, stdout: &str, stderr: &str) -> Result<ContainerStatus, ServiceError> {
    if success {
        return Ok(match stdout.trim() {
            "true" => ContainerStatus::Running,
            _ => ContainerStatus::Stopped,
        });
    }
    if stderr.contains("No such object") || stderr.contains("No such container") {
        return Ok(ContainerStatus::Missing);
    }
    Err(ServiceError::runtime(format!(
        "docker inspect failed: {}",
        stderr.trim()
    )))
}

fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];
    for mount in &spec.mounts {
        args.push("-v".to_string());
        args.push(format!(
            "{}:{}",
            mount.host.display(),
            mount.container.display()
        ));
    }
    if let Some(ref entrypoint) = spec.entrypoint {
        args.push("--entrypoint".to_string());
        args.push(entrypoint.clone());
    }
    args.push(spec.image.clone());
    args.extend(spec.args.iter().cloned());
    args
}

/// First stderr line written by the docker client itself, if any.
fn transport_error(stderr: &str) -> Option<&str> {
    stderr
        .lines()
        .map(str::trim)
        .find(|line| TRANSPORT_ERRORS.iter().any(|prefix| line.starts_with(prefix)))
}

fn classify_exec(code: Option<i32>, stderr: &str) -> ExecOutcome {
    match code {
        Some(0) => ExecOutcome::Exited(0),
        Some(code) => {
            match transport_error(stderr) {
                Some(line) => ExecOutcome::Unreachable(line.to_string()),
                None => ExecOutcome::Exited(code),
            }
        }
        // Killed by a signal
        None => ExecOutcome::Exited(-1),
    }
}
