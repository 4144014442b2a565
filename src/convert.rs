// src/convert.rs

//! CUE/BIN to POPS `.vcd` conversion
//!
//! A conversion job runs these stages in order:
//!
//! 1. **Merging**: multi-file sheets are consolidated (see [`crate::merge`])
//! 2. **Importing**: the converter runs while the output file's size is
//!    sampled once per second to estimate progress
//! 3. **Finalizing**: the artifact is located, falling back to the newest
//!    recently written image in the output directory when the converter
//!    picked its own file name
//! 4. **Done**: always emitted, on every exit path
//!
//! The converter is either the bundled `cue2pops` executable, invoked
//! directly, or a user-supplied shell command template with `{cue}` and
//! `{vcd}` placeholders.
//!
//! The recent-output fallback is a heuristic: two jobs writing into the same
//! directory at the same time can pick up each other's output. Callers must
//! serialise conversions per output directory.

use crate::config::{CONVERTER_CMD_ENV, Settings};
use crate::discovery;
use crate::error::{Error, Outcome, Result};
use crate::exec::{CommandRunner, CommandSpec, run_checked};
use crate::merge;
use crate::progress::{ConversionProgress, ProgressEvent, ProgressSink, Stage};
use crate::sheet;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Name of the bundled converter
pub const CONVERTER_TOOL: &str = "cue2pops";

/// Template placeholder for the input sheet
pub const CUE_PLACEHOLDER: &str = "{cue}";

/// Template placeholder for the output image
pub const VCD_PLACEHOLDER: &str = "{vcd}";

/// Interval between output-size samples
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Slack applied to the start time when looking for renamed output
const RECENT_OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Successful conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Converted {
    pub new_path: PathBuf,
}

/// State of one conversion
#[derive(Debug)]
pub struct ConversionJob {
    /// Sheet handed to the converter (the merged one after merging)
    pub input_sheet: PathBuf,
    pub output_path: PathBuf,
    /// Expected output size in bytes
    pub total_bytes: u64,
    /// Merge directory owned by the job; removed when the job is dropped
    pub merged_temp_dir: Option<TempDir>,
    pub stage: Option<Stage>,
}

/// Emits [`Stage::Done`] when dropped
struct DoneGuard<'a>(&'a dyn ProgressSink);

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.0.stage(Stage::Done);
    }
}

impl ConversionJob {
    pub fn new(input_sheet: &Path, output_path: &Path) -> Self {
        Self {
            input_sheet: input_sheet.to_path_buf(),
            output_path: output_path.to_path_buf(),
            total_bytes: 0,
            merged_temp_dir: None,
            stage: None,
        }
    }

    fn advance(&mut self, stage: Stage, sink: &dyn ProgressSink) {
        self.stage = Some(stage);
        sink.stage(stage);
    }

    /// Run every stage; the caller drops the job afterwards
    pub async fn run(
        &mut self,
        settings: &Settings,
        runner: &dyn CommandRunner,
        sink: &dyn ProgressSink,
    ) -> Result<Converted> {
        let merged = merge::merge_if_needed(&self.input_sheet, settings, runner, sink).await?;
        if merged.merged {
            self.stage = Some(Stage::Merging);
        }
        self.input_sheet = merged.sheet_path;
        self.merged_temp_dir = merged.temp_dir;

        self.total_bytes = sheet::total_referenced_size(&self.input_sheet).await?;
        let spec = select_converter(settings, &self.input_sheet, &self.output_path)?;

        if let Some(parent) = self.output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }
        let started = SystemTime::now()
            .checked_sub(RECENT_OUTPUT_GRACE)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        self.advance(Stage::Importing, sink);
        info!(
            target: "converter",
            "Converting {} -> {} ({} bytes)",
            self.input_sheet.display(),
            self.output_path.display(),
            self.total_bytes
        );
        let report = sink.wants_progress() && self.total_bytes > 0;
        run_with_polling(runner, &spec, &self.output_path, self.total_bytes, report, sink).await?;

        self.advance(Stage::Finalizing, sink);
        if report {
            sink.emit(ProgressEvent::Conversion(ConversionProgress::complete(
                self.total_bytes,
            )));
        }

        let new_path = finalize_output(&self.output_path, started).await?;
        info!(target: "converter", "Conversion finished: {}", new_path.display());
        Ok(Converted { new_path })
    }
}

/// Run the converter while sampling the output size once per second
///
/// The ticker lives inside this future, so it stops as soon as the converter
/// finishes or the future is dropped.
async fn run_with_polling(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    output_path: &Path,
    total_bytes: u64,
    report: bool,
    sink: &dyn ProgressSink,
) -> Result<()> {
    let run = run_checked(runner, spec);
    tokio::pin!(run);

    let start = tokio::time::Instant::now() + POLL_INTERVAL;
    let mut ticker = tokio::time::interval_at(start, POLL_INTERVAL);

    loop {
        tokio::select! {
            result = &mut run => {
                result?;
                return Ok(());
            }
            _ = ticker.tick(), if report => {
                // The converter may not have created the file yet
                if let Ok(meta) = tokio::fs::metadata(output_path).await {
                    sink.emit(ProgressEvent::Conversion(ConversionProgress::sample(
                        meta.len(),
                        total_bytes,
                    )));
                }
            }
        }
    }
}

/// Substitute the placeholders of a converter command template
///
/// Quoted placeholders (`"{cue}"`, `'{cue}'`) keep their quotes; bare ones
/// are wrapped in double quotes. Returns `None` unless both paths end up in
/// the command.
pub fn build_converter_command(template: &str, cue: &Path, vcd: &Path) -> Option<String> {
    let cue = cue.to_string_lossy();
    let vcd = vcd.to_string_lossy();

    let mut command = template.to_string();
    for (placeholder, value) in [(CUE_PLACEHOLDER, &cue), (VCD_PLACEHOLDER, &vcd)] {
        command = command
            .replace(&format!("\"{placeholder}\""), &format!("\"{value}\""))
            .replace(&format!("'{placeholder}'"), &format!("'{value}'"))
            .replace(placeholder, &format!("\"{value}\""));
    }

    (command.contains(&*cue) && command.contains(&*vcd)).then_some(command)
}

/// Choose how to run the converter
///
/// The bundled executable wins over a configured template.
pub fn select_converter(settings: &Settings, cue: &Path, vcd: &Path) -> Result<CommandSpec> {
    if let Some(exe) = discovery::find_bundled_tool(settings.resource_root.as_deref(), CONVERTER_TOOL) {
        debug!(target: "converter", "Using bundled converter {}", exe.display());
        return Ok(CommandSpec::program(exe, [cue.as_os_str(), vcd.as_os_str()]));
    }

    if let Some(command) = settings
        .converter_command
        .as_deref()
        .and_then(|template| build_converter_command(template, cue, vcd))
    {
        debug!(target: "converter", "Using converter command: {}", command);
        return Ok(CommandSpec::shell(command));
    }

    Err(Error::ConfigError(format!(
        "Missing converter. Bundle {} or set {CONVERTER_CMD_ENV} with {CUE_PLACEHOLDER} and {VCD_PLACEHOLDER} placeholders.",
        discovery::executable_name(CONVERTER_TOOL)
    )))
}

/// Whether a bundled converter is available
pub fn bundled_converter_available(settings: &Settings) -> bool {
    discovery::find_bundled_tool(settings.resource_root.as_deref(), CONVERTER_TOOL).is_some()
}

/// Images with the same extension as `like`, modified at or after `since`,
/// newest first
pub async fn find_recent_outputs(dir: &Path, like: &Path, since: SystemTime) -> Result<Vec<PathBuf>> {
    let extension = like.extension().map(|e| e.to_string_lossy().to_ascii_lowercase());
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches_ext = path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()) == extension;
        if !matches_ext {
            continue;
        }
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified()?;
        if modified >= since {
            candidates.push((modified, path));
        }
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(candidates.into_iter().map(|(_, path)| path).collect())
}

/// Make sure the artifact sits at `output_path`
async fn finalize_output(output_path: &Path, started: SystemTime) -> Result<PathBuf> {
    if tokio::fs::try_exists(output_path).await? {
        return Ok(output_path.to_path_buf());
    }

    let dir = output_path.parent().unwrap_or(Path::new("."));
    let recent = find_recent_outputs(dir, output_path, started).await?;
    let Some(detected) = recent.into_iter().next() else {
        return Err(Error::NotFoundError(
            "Conversion completed but no VCD output was detected in the POPS directory.".to_string(),
        ));
    };

    warn!(
        target: "converter",
        "Converter wrote {} instead of {}; renaming",
        detected.display(),
        output_path.display()
    );
    tokio::fs::rename(&detected, output_path).await.map_err(|e| {
        Error::IoError(format!(
            "Unable to rename the generated VCD to the expected filename: {e}"
        ))
    })?;
    Ok(output_path.to_path_buf())
}

/// Convert a sheet to a POPS image
///
/// Never fails with an error: the outcome carries the message instead. The
/// `Done` stage is always emitted and any merge directory is always removed.
pub async fn convert(
    sheet_path: &Path,
    output_path: &Path,
    settings: &Settings,
    runner: &dyn CommandRunner,
    sink: &dyn ProgressSink,
) -> Outcome<Converted> {
    let _done = DoneGuard(sink);
    let mut job = ConversionJob::new(sheet_path, output_path);
    let result = job.run(settings, runner, sink).await;
    if let Err(e) = &result {
        warn!(target: "converter", "Conversion of {} failed: {}", sheet_path.display(), e);
    }
    drop(job);
    result.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::progress::{CallbackProgress, SilentProgress};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Shell-template converter fake that writes a file of a given size
    struct WritesFile {
        target: PathBuf,
        size: usize,
    }

    #[async_trait]
    impl CommandRunner for WritesFile {
        async fn run(&self, _spec: &CommandSpec) -> Result<CommandOutput> {
            std::fs::write(&self.target, vec![0u8; self.size]).unwrap();
            Ok(CommandOutput {
                code: Some(0),
                ..Default::default()
            })
        }
    }

    fn template_settings() -> Settings {
        Settings {
            converter_command: Some("cue2pops {cue} {vcd}".to_string()),
            resource_root: Some(PathBuf::from("/nonexistent-resource-root")),
            ..Default::default()
        }
    }

    fn single_track(dir: &Path) -> PathBuf {
        std::fs::write(dir.join("game.bin"), vec![7u8; 4096]).unwrap();
        let cue = dir.join("game.cue");
        std::fs::write(&cue, "FILE \"game.bin\" BINARY\n  TRACK 01 MODE2/2352\n").unwrap();
        cue
    }

    #[test]
    fn test_build_converter_command_forms() {
        let cue = Path::new("/in/My Game.cue");
        let vcd = Path::new("/out/My Game.vcd");
        assert_eq!(
            build_converter_command("conv {cue} {vcd}", cue, vcd).unwrap(),
            "conv \"/in/My Game.cue\" \"/out/My Game.vcd\""
        );
        assert_eq!(
            build_converter_command("conv '{cue}' \"{vcd}\"", cue, vcd).unwrap(),
            "conv '/in/My Game.cue' \"/out/My Game.vcd\""
        );
        assert!(build_converter_command("conv {cue}", cue, vcd).is_none());
    }

    #[test]
    fn test_select_converter_requires_configuration() {
        let settings = Settings {
            resource_root: Some(PathBuf::from("/nonexistent-resource-root")),
            ..Default::default()
        };
        let err = select_converter(&settings, Path::new("a.cue"), Path::new("b.vcd")).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains(CONVERTER_CMD_ENV));

        let spec = select_converter(&template_settings(), Path::new("a.cue"), Path::new("b.vcd")).unwrap();
        assert!(matches!(spec, CommandSpec::Shell(_)));
    }

    #[test]
    fn test_bundled_converter_wins_over_template() {
        let temp = tempfile::tempdir().unwrap();
        let settings = Settings {
            resource_root: Some(temp.path().to_path_buf()),
            ..template_settings()
        };
        assert!(!bundled_converter_available(&settings));

        let dir = temp
            .path()
            .join("assets/tools")
            .join(CONVERTER_TOOL)
            .join(discovery::platform_dir());
        std::fs::create_dir_all(&dir).unwrap();
        let exe = dir.join(discovery::executable_name(CONVERTER_TOOL));
        std::fs::write(&exe, b"").unwrap();

        assert!(bundled_converter_available(&settings));
        let spec = select_converter(&settings, Path::new("a.cue"), Path::new("b.vcd")).unwrap();
        let CommandSpec::Program { program, args } = spec else {
            panic!("expected the bundled executable, got {spec:?}");
        };
        assert_eq!(program, exe);
        assert_eq!(args, ["a.cue", "b.vcd"]);
    }

    #[tokio::test]
    async fn test_convert_reports_final_progress_and_done() {
        let temp = tempfile::tempdir().unwrap();
        let cue = single_track(temp.path());
        let output = temp.path().join("POPS").join("game.vcd");
        let runner = WritesFile {
            target: output.clone(),
            size: 4096,
        };
        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        let sink = CallbackProgress::new(move |e| captured.lock().unwrap().push(e));

        let outcome = convert(&cue, &output, &template_settings(), &runner, &sink).await;
        assert!(outcome.success, "{:?}", outcome.message);
        assert_eq!(outcome.value.unwrap().new_path, output);

        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&ProgressEvent::Stage(Stage::Importing)));
        assert_eq!(events.last(), Some(&ProgressEvent::Stage(Stage::Done)));
        let last_percent = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Conversion(p) => Some(p.percent),
                _ => None,
            })
            .last();
        assert_eq!(last_percent, Some(100.0));
    }

    #[tokio::test]
    async fn test_renamed_output_is_moved_into_place() {
        let temp = tempfile::tempdir().unwrap();
        let cue = single_track(temp.path());
        let pops = temp.path().join("POPS");
        std::fs::create_dir_all(&pops).unwrap();
        let output = pops.join("expected.vcd");
        let runner = WritesFile {
            target: pops.join("converter-chose-this.VCD"),
            size: 10,
        };

        let outcome = convert(&cue, &output, &template_settings(), &runner, &SilentProgress).await;
        assert!(outcome.success, "{:?}", outcome.message);
        assert!(output.exists());
        assert!(!pops.join("converter-chose-this.VCD").exists());
    }

    #[tokio::test]
    async fn test_no_output_detected() {
        let temp = tempfile::tempdir().unwrap();
        let cue = single_track(temp.path());
        let output = temp.path().join("POPS").join("game.vcd");
        let runner = WritesFile {
            target: temp.path().join("elsewhere.bin"),
            size: 10,
        };

        let outcome = convert(&cue, &output, &template_settings(), &runner, &SilentProgress).await;
        assert!(!outcome.success);
        assert!(outcome.message.unwrap().contains("no VCD output was detected"));
    }

    #[tokio::test]
    async fn test_missing_converter_still_emits_done() {
        let temp = tempfile::tempdir().unwrap();
        let cue = single_track(temp.path());
        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        let sink = CallbackProgress::new(move |e| captured.lock().unwrap().push(e));
        let settings = Settings {
            resource_root: Some(PathBuf::from("/nonexistent-resource-root")),
            ..Default::default()
        };
        let runner = WritesFile {
            target: temp.path().join("unused.vcd"),
            size: 1,
        };

        let outcome = convert(&cue, &temp.path().join("out.vcd"), &settings, &runner, &sink).await;
        assert!(!outcome.success);
        assert_eq!(events.lock().unwrap().as_slice(), &[ProgressEvent::Stage(Stage::Done)]);
    }

    #[tokio::test]
    async fn test_recent_outputs_newest_first() {
        let temp = tempfile::tempdir().unwrap();
        let since = SystemTime::now() - Duration::from_secs(5);
        std::fs::write(temp.path().join("a.vcd"), b"a").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        std::fs::write(temp.path().join("b.vcd"), b"b").unwrap();
        std::fs::write(temp.path().join("c.iso"), b"c").unwrap();

        let found = find_recent_outputs(temp.path(), Path::new("x.vcd"), since).await.unwrap();
        assert_eq!(found, vec![temp.path().join("b.vcd"), temp.path().join("a.vcd")]);

        let none = find_recent_outputs(temp.path(), Path::new("x.vcd"), SystemTime::now() + Duration::from_secs(60))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
