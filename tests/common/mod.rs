//! Shared test harness for integration tests.
//!
//! Provides [`Harness`], a temporary input/output/state layout with a
//! [`ConversionServiceManager`] backed by [`FakeRuntime`], which "converts"
//! images by copying them between the bind-mounted directories.

#![allow(dead_code)]

use bitforge::config::Config;
use bitforge::processor::VideoToolkit;
use bitforge::run::Pipeline;
use bitforge::service::{
    ContainerRuntime, ContainerSpec, ContainerStatus, ConversionServiceManager, ExecOutcome,
    ServiceError,
};
use bitforge_av::VideoInfo;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct FakeState {
    status: Option<ContainerStatus>,
    mounts: Vec<(PathBuf, PathBuf)>,
    creates: usize,
    restarts: usize,
    removes: usize,
}

/// In-memory container runtime.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
    /// Number of upcoming execs that report the container as unreachable
    unreachable_execs: AtomicUsize,
    /// Exit code for conversions of inputs whose name contains this marker
    failing_marker: Mutex<Option<String>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn creates(&self) -> usize {
        self.state.lock().creates
    }

    pub fn restarts(&self) -> usize {
        self.state.lock().restarts
    }

    pub fn removes(&self) -> usize {
        self.state.lock().removes
    }

    /// Make the next `n` execs fail as if the daemon went away.
    pub fn go_down_for(&self, n: usize) {
        self.unreachable_execs.store(n, Ordering::SeqCst);
    }

    /// Make conversions of inputs containing `marker` exit non-zero.
    pub fn fail_inputs_containing(&self, marker: &str) {
        *self.failing_marker.lock() = Some(marker.to_string());
    }

    fn to_host(&self, container_path: &str) -> Option<PathBuf> {
        let state = self.state.lock();
        state.mounts.iter().find_map(|(host, container)| {
            Path::new(container_path)
                .strip_prefix(container)
                .ok()
                .map(|rel| host.join(rel))
        })
    }
}

impl ContainerRuntime for FakeRuntime {
    fn status(&self, _name: &str) -> Result<ContainerStatus, ServiceError> {
        Ok(self.state.lock().status.unwrap_or(ContainerStatus::Missing))
    }

    fn create(&self, spec: &ContainerSpec) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        state.creates += 1;
        state.status = Some(ContainerStatus::Running);
        state.mounts = spec
            .mounts
            .iter()
            .map(|m| (m.host.clone(), m.container.clone()))
            .collect();
        Ok(())
    }

    fn restart(&self, _name: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        state.restarts += 1;
        state.status = Some(ContainerStatus::Running);
        Ok(())
    }

    fn remove(&self, _name: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        state.removes += 1;
        state.status = Some(ContainerStatus::Missing);
        Ok(())
    }

    fn exec(&self, _name: &str, command: &[String]) -> ExecOutcome {
        let down = self
            .unreachable_execs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if down {
            return ExecOutcome::Unreachable("Cannot connect to the Docker daemon".to_string());
        }

        let [.., input, output] = command else {
            return ExecOutcome::Exited(2);
        };
        if let Some(marker) = self.failing_marker.lock().as_deref() {
            if input.contains(marker) {
                return ExecOutcome::Exited(1);
            }
        }
        match (self.to_host(input), self.to_host(output)) {
            (Some(input), Some(output)) => match std::fs::copy(input, output) {
                Ok(_) => ExecOutcome::Exited(0),
                Err(_) => ExecOutcome::Exited(1),
            },
            _ => ExecOutcome::Exited(2),
        }
    }
}

/// Video toolkit returning fixed probe values.
pub struct FakeVideo {
    pub duration: f64,
    pub frame_count: u64,
    pub analysis_delay: Duration,
}

impl Default for FakeVideo {
    fn default() -> Self {
        Self {
            duration: 10.0,
            frame_count: 250,
            analysis_delay: Duration::ZERO,
        }
    }
}

impl VideoToolkit for FakeVideo {
    fn probe(&self, _path: &Path) -> bitforge_av::Result<VideoInfo> {
        std::thread::sleep(self.analysis_delay);
        Ok(VideoInfo {
            width: 1280,
            height: 720,
            duration: self.duration,
            frame_count: self.frame_count,
        })
    }

    fn extract_preview_frames(&self, _input: &Path, out_dir: &Path) -> bitforge_av::Result<usize> {
        std::fs::create_dir_all(out_dir)?;
        std::fs::write(out_dir.join("frame_00001.png"), b"png")?;
        Ok(1)
    }
}

/// Temporary ingestion layout.
pub struct Harness {
    _dir: TempDir,
    pub input: PathBuf,
    pub output: PathBuf,
    pub state: PathBuf,
    pub runtime: Arc<FakeRuntime>,
    pub service: Arc<ConversionServiceManager>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = dir.path().canonicalize().expect("failed to resolve temp dir");
        let input = root.join("input");
        let output = root.join("output");
        let state = root.join("state");
        for path in [&input, &output, &state] {
            std::fs::create_dir_all(path).expect("failed to create test dir");
        }

        let runtime = Arc::new(FakeRuntime::new());
        let service = Arc::new(
            ConversionServiceManager::new(runtime.clone(), Config::default().service)
                .with_poll_interval(Duration::from_millis(1)),
        );

        Self {
            _dir: dir,
            input,
            output,
            state,
            runtime,
            service,
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.ingest.state_dir = self.state.clone();
        config.ingest.workers = 2;
        config
    }

    pub fn pipeline(&self, config: Config) -> Pipeline {
        self.pipeline_with_video(config, FakeVideo::default())
    }

    pub fn pipeline_with_video(&self, config: Config, video: FakeVideo) -> Pipeline {
        Pipeline::new(
            config,
            &self.input,
            &self.output,
            self.service.clone(),
            Arc::new(video),
        )
        .expect("failed to build pipeline")
    }

    /// Write an input file, returning its absolute path.
    pub fn input_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.input.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create input subdir");
        }
        std::fs::write(&path, content).expect("failed to write input file");
        path
    }

    /// Write a manifest referencing `names` relative to the input root.
    pub fn manifest(&self, names: &[&str]) -> PathBuf {
        let mut xml = String::from("<?xml version=\"1.0\"?>\n<knora>\n");
        for (i, name) in names.iter().enumerate() {
            xml.push_str(&format!(
                "  <resource id=\"r{}\"><bitstream>{}</bitstream></resource>\n",
                i, name
            ));
        }
        xml.push_str("</knora>\n");

        let path = self.state.join("data.xml");
        std::fs::write(&path, xml).expect("failed to write manifest");
        path
    }

    pub fn read_list(&self, name: &str) -> Vec<PathBuf> {
        std::fs::read_to_string(self.state.join(name))
            .expect("failed to read checkpoint list")
            .lines()
            .map(PathBuf::from)
            .collect()
    }

    /// Every `.info` sidecar below the output root.
    pub fn sidecars(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
            for entry in std::fs::read_dir(dir).expect("failed to list output dir").flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, found);
                } else if path.extension().is_some_and(|e| e == "info") {
                    found.push(path);
                }
            }
        }
        let mut found = Vec::new();
        walk(&self.output, &mut found);
        found
    }

    pub fn snapshots(&self) -> Vec<PathBuf> {
        let mut snapshots: Vec<PathBuf> = std::fs::read_dir(&self.state)
            .expect("failed to list state dir")
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with("processing_result_"))
                    .unwrap_or(false)
            })
            .collect();
        snapshots.sort();
        snapshots
    }
}
