use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Maximum number of files taken from the checkpoint per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Files handed to the worker pool at once
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Worker threads; 0 uses the number of CPUs
    #[serde(default)]
    pub workers: usize,

    /// Directory holding processed/unprocessed lists and result snapshots
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Manifest elements whose tag name ends with this marker reference files
    #[serde(default = "default_bitstream_marker")]
    pub bitstream_marker: String,
}

fn default_batch_size() -> usize {
    5000
}
fn default_chunk_size() -> usize {
    1000
}
fn default_state_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_bitstream_marker() -> String {
    "bitstream".to_string()
}

impl IngestConfig {
    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            chunk_size: default_chunk_size(),
            workers: 0,
            state_dir: default_state_dir(),
            bitstream_marker: default_bitstream_marker(),
        }
    }
}

/// The containerized image conversion service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_container_name")]
    pub container_name: String,

    #[serde(default = "default_image")]
    pub image: String,

    /// Entrypoint override used when the container is created
    #[serde(default = "default_entrypoint")]
    pub entrypoint: Option<String>,

    /// Arguments passed after the image when the container is created
    #[serde(default = "default_run_args")]
    pub run_args: Vec<String>,

    /// Conversion command run inside the container; `{input}` and `{output}`
    /// are replaced with container paths
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    #[serde(default = "default_input_mount")]
    pub input_mount: PathBuf,

    #[serde(default = "default_output_mount")]
    pub output_mount: PathBuf,

    /// Extension (without dot) of converted image derivatives
    #[serde(default = "default_derivative_extension")]
    pub derivative_extension: String,

    #[serde(default = "default_start_timeout")]
    pub start_timeout_secs: u64,

    /// Restarts tolerated within one invocation before giving up
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
}

fn default_container_name() -> String {
    "bitforge-converter".to_string()
}
fn default_image() -> String {
    "daschswiss/sipi:latest".to_string()
}
fn default_entrypoint() -> Option<String> {
    Some("/bin/sh".to_string())
}
fn default_run_args() -> Vec<String> {
    vec!["-c".to_string(), "tail -f /dev/null".to_string()]
}
fn default_command() -> Vec<String> {
    ["/sipi/sipi", "--topleft", "{input}", "{output}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_input_mount() -> PathBuf {
    PathBuf::from("/processing-input")
}
fn default_output_mount() -> PathBuf {
    PathBuf::from("/processing-output")
}
fn default_derivative_extension() -> String {
    "jpx".to_string()
}
fn default_start_timeout() -> u64 {
    30
}
fn default_max_restarts() -> u32 {
    5
}

impl ServiceConfig {
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            container_name: default_container_name(),
            image: default_image(),
            entrypoint: default_entrypoint(),
            run_args: default_run_args(),
            command: default_command(),
            input_mount: default_input_mount(),
            output_mount: default_output_mount(),
            derivative_extension: default_derivative_extension(),
            start_timeout_secs: default_start_timeout(),
            max_restarts: default_max_restarts(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub docker_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

impl ToolsConfig {
    /// Configured override for a tool, if any.
    pub fn path_for(&self, tool: bitforge_av::Tool) -> Option<&std::path::Path> {
        match tool {
            bitforge_av::Tool::Docker => self.docker_path.as_deref(),
            bitforge_av::Tool::Ffprobe => self.ffprobe_path.as_deref(),
            bitforge_av::Tool::Ffmpeg => self.ffmpeg_path.as_deref(),
        }
    }
}
