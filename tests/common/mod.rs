// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use discshelf::exec::{CommandOutput, CommandRunner, CommandSpec};
use discshelf::progress::{CallbackProgress, ProgressEvent};
use discshelf::{Result, Settings};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Create an empty library root with the standard directories.
///
/// Returns (TempDir, root) - keep the TempDir alive to prevent cleanup.
pub fn setup_library() -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("opl");
    for dir in ["CD", "DVD", "POPS", "ART"] {
        std::fs::create_dir_all(root.join(dir)).unwrap();
    }
    (temp_dir, root)
}

/// Write a sheet in `dir` referencing one data file per entry of `sizes`.
pub fn write_dump(dir: &Path, name: &str, sizes: &[usize]) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let mut sheet = String::new();
    for (index, size) in sizes.iter().enumerate() {
        let track = index + 1;
        let bin = if sizes.len() == 1 {
            format!("{name}.bin")
        } else {
            format!("{name} (Track {track}).bin")
        };
        std::fs::write(dir.join(&bin), vec![0u8; *size]).unwrap();
        let mode = if track == 1 { "MODE2/2352" } else { "AUDIO" };
        sheet.push_str(&format!("FILE \"{bin}\" BINARY\n  TRACK {track:02} {mode}\n    INDEX 01 00:00:00\n"));
    }
    let cue = dir.join(format!("{name}.cue"));
    std::fs::write(&cue, sheet).unwrap();
    cue
}

/// Settings that never find bundled tools and use a shell converter template.
pub fn fake_tool_settings() -> Settings {
    Settings {
        converter_command: Some("cue2pops \"{cue}\" \"{vcd}\"".to_string()),
        merge_tool: Some(PathBuf::from("/opt/tools/binmerge")),
        resource_root: Some(PathBuf::from("/nonexistent-resource-root")),
        ..Default::default()
    }
}

/// Stand-in for binmerge and the converter.
///
/// Merges write `<base>.cue` into the requested directory; conversions write
/// `output_size` bytes to `output`.
pub struct FakeTools {
    pub output: PathBuf,
    pub output_size: usize,
    pub convert_exit: i32,
    pub calls: Mutex<Vec<CommandSpec>>,
}

impl FakeTools {
    pub fn new(output: &Path, output_size: usize) -> Self {
        Self {
            output: output.to_path_buf(),
            output_size,
            convert_exit: 0,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Arguments of the merge invocation, if any
    pub fn merge_args(&self) -> Option<Vec<OsString>> {
        self.calls.lock().unwrap().iter().find_map(|spec| match spec {
            CommandSpec::Program { args, .. } => Some(args.clone()),
            CommandSpec::Shell(_) => None,
        })
    }
}

#[async_trait]
impl CommandRunner for FakeTools {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        match spec {
            CommandSpec::Program { args, .. } => {
                let outdir = PathBuf::from(&args[1]);
                let base = args[3].to_string_lossy().into_owned();
                std::fs::write(outdir.join(format!("{base}.bin")), b"merged").unwrap();
                std::fs::write(
                    outdir.join(format!("{base}.cue")),
                    format!("FILE \"{base}.bin\" BINARY\n  TRACK 01 MODE2/2352\n"),
                )
                .unwrap();
                Ok(CommandOutput {
                    code: Some(0),
                    ..Default::default()
                })
            }
            CommandSpec::Shell(_) if self.convert_exit != 0 => Ok(CommandOutput {
                code: Some(self.convert_exit),
                stdout: String::new(),
                stderr: "cue2pops: unsupported sheet".to_string(),
            }),
            CommandSpec::Shell(_) => {
                if let Some(parent) = self.output.parent() {
                    std::fs::create_dir_all(parent).unwrap();
                }
                std::fs::write(&self.output, vec![0u8; self.output_size]).unwrap();
                Ok(CommandOutput {
                    code: Some(0),
                    ..Default::default()
                })
            }
        }
    }
}

/// Progress sink that records every event.
pub fn recording_sink() -> (
    CallbackProgress<impl Fn(ProgressEvent) + Send + Sync>,
    Arc<Mutex<Vec<ProgressEvent>>>,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let sink = CallbackProgress::new(move |event| captured.lock().unwrap().push(event));
    (sink, events)
}
