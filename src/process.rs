//! The batch state machine.
//!
//! Expanded inputs arrive here together with the chosen output mode; this
//! module derives every output path, runs the batch-fatal validations
//! (collisions, overwrite policy), then processes items one at a time:
//!
//! ```text
//! probe input -> plan commands -> write to temp sibling -> execute
//!   -> atomic rename -> re-probe output
//! ```
//!
//! A failed item records its error and the batch continues — best-effort
//! semantics. The only whole-batch abort after input expansion is an output
//! path collision, which is detected before any write.
//!
//! Everything is injected: the [`Toolchain`] says *which* binaries, the
//! [`CommandRunner`] says *how* they run, so tests drive the entire machine
//! with a mock and no ImageMagick installed.

use crate::error::CliError;
use crate::exec::CommandRunner;
use crate::ops::{ConvertTarget, Operation, WriteOptions};
use crate::outpath::{
    OutPathError, OutputMode, atomic_replace, check_extension, check_overwrite, derive_out_path,
    ext_normalize, find_collisions, temp_write_path,
};
use crate::plan::{self, PlanContext, Step};
use crate::report::{self, ItemResult, ItemStatus, OptionsEcho, Summary};
use crate::toolchain::{ImageInfo, Toolchain};
use std::path::{Path, PathBuf};

/// One run's worth of validated intent.
#[derive(Debug)]
pub struct BatchRequest {
    pub operation: Operation,
    pub inputs: Vec<PathBuf>,
    /// `None` exactly for `info`.
    pub output_mode: Option<OutputMode>,
    pub options: WriteOptions,
}

/// Filesystem anchors for the run.
#[derive(Debug)]
pub struct RunEnv {
    pub repo_root: PathBuf,
    /// Present when `--json`/`--report` asked for run artifacts.
    pub run_dir: Option<PathBuf>,
    pub run_id: Option<String>,
}

pub fn run_batch(
    toolchain: &Toolchain,
    runner: &dyn CommandRunner,
    env: &RunEnv,
    request: &BatchRequest,
) -> Result<Summary, CliError> {
    let op = &request.operation;
    let opts = &request.options;

    if opts.report && !op.writes_output() {
        return Err(CliError::Usage(
            "--report is not supported for info".to_string(),
        ));
    }

    let planned: Vec<(PathBuf, Option<PathBuf>)> = if op.writes_output() {
        let mode = request
            .output_mode
            .as_ref()
            .ok_or_else(|| CliError::Usage(OutPathError::ModeUnchosen.to_string()))?;

        if matches!(mode, OutputMode::File(_)) && request.inputs.len() != 1 {
            return Err(OutPathError::SingleInputRequired.into());
        }

        if let Operation::Resize { request: resize, .. } = op {
            crate::geometry::validate_resize_request(resize)?;
        }
        preflight_alpha_flatten(toolchain, runner, op, opts, &request.inputs)?;

        let planned = plan_outputs(op, mode, &request.inputs)?;

        if !mode.is_in_place() {
            for (_, output) in &planned {
                check_overwrite(output, opts.overwrite)?;
            }
            if opts.report
                && let Some(run_dir) = &env.run_dir
            {
                check_overwrite(&run_dir.join("report.md"), opts.overwrite)?;
            }
        }

        if !opts.dry_run {
            create_output_dirs(mode)?;
        }

        planned
            .into_iter()
            .map(|(input, output)| (input, Some(output)))
            .collect()
    } else {
        request
            .inputs
            .iter()
            .map(|input| (input.clone(), None))
            .collect()
    };

    let mut items: Vec<ItemResult> = Vec::new();
    let mut commands: Vec<String> = Vec::new();

    for (input, output) in &planned {
        let input_info = toolchain.probe(runner, input);
        tracing::debug!(input = %input.display(), "processing");

        let mut item = ItemResult {
            input_path: report::display_path(input, &env.repo_root),
            output_path: output
                .as_ref()
                .map(|o| report::display_path(o, &env.repo_root)),
            status: ItemStatus::Ok,
            input_info: input_info.clone(),
            output_info: None,
            commands: Vec::new(),
            warnings: Vec::new(),
            error: None,
        };

        if let Some(output) = output {
            match run_item(toolchain, runner, op, opts, &input_info, input, output) {
                Ok(outcome) => {
                    item.commands = outcome.commands;
                    item.warnings = outcome.warnings;
                    item.output_info = outcome.output_info;
                }
                Err(failure) => {
                    tracing::warn!(
                        input = %input.display(),
                        error = %failure.message,
                        "item failed"
                    );
                    item.commands = failure.commands;
                    item.status = ItemStatus::Error;
                    item.error = Some(failure.message);
                }
            }
        }

        commands.extend(item.commands.iter().cloned());
        items.push(item);
    }

    let mut summary = Summary {
        schema_version: report::SCHEMA_VERSION,
        run_id: env.run_id.clone(),
        cwd: std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .display()
            .to_string(),
        operation: op.name().to_string(),
        backend: toolchain.backend_id().to_string(),
        report_path: None,
        dry_run: opts.dry_run,
        options: OptionsEcho {
            overwrite: opts.overwrite,
            auto_orient: op.honors_auto_orient().then_some(opts.auto_orient),
            strip_metadata: opts.strip_metadata,
            background: opts.background.clone(),
            report: opts.report,
        },
        commands,
        collisions: Vec::new(),
        skipped: Vec::new(),
        warnings: Vec::new(),
        items,
    };

    if opts.report
        && let Some(run_dir) = &env.run_dir
    {
        let report_file = run_dir.join("report.md");
        std::fs::write(&report_file, report::render_report(&summary))?;
        summary.report_path = Some(report::display_path(&report_file, &env.repo_root));
    }

    if let Some(run_dir) = &env.run_dir {
        report::write_summary(run_dir, &summary)?;
    }

    Ok(summary)
}

/// Converting to JPEG flattens alpha away; refuse up front, before any
/// item runs, unless a background was given. Only probes when it matters.
fn preflight_alpha_flatten(
    toolchain: &Toolchain,
    runner: &dyn CommandRunner,
    op: &Operation,
    opts: &WriteOptions,
    inputs: &[PathBuf],
) -> Result<(), CliError> {
    let Operation::Convert {
        to: ConvertTarget::Jpg,
        ..
    } = op
    else {
        return Ok(());
    };
    if opts.background.is_some() {
        return Ok(());
    }
    for input in inputs {
        if toolchain.probe(runner, input).has_alpha() {
            return Err(CliError::Usage(
                "alpha input cannot be converted to JPEG without a background \
                 (provide --background <color>)"
                    .to_string(),
            ));
        }
    }
    Ok(())
}

/// Derive and validate every output path; abort on collisions.
fn plan_outputs(
    op: &Operation,
    mode: &OutputMode,
    inputs: &[PathBuf],
) -> Result<Vec<(PathBuf, PathBuf)>, CliError> {
    let mut planned: Vec<(PathBuf, PathBuf)> = Vec::new();

    for input in inputs {
        let output = crate::inputs::absolutize(&derive_out_path(mode, input, op.forced_ext()));
        check_extension(op.name(), op.forced_ext(), input, &output)?;
        planned.push((input.clone(), output));
    }

    if !mode.is_in_place() {
        let colliding = find_collisions(&planned);
        if !colliding.is_empty() {
            return Err(OutPathError::Collisions(colliding).into());
        }
    }

    Ok(planned)
}

fn create_output_dirs(mode: &OutputMode) -> Result<(), CliError> {
    match mode {
        OutputMode::Dir(dir) => std::fs::create_dir_all(dir)?,
        OutputMode::File(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
        }
        OutputMode::InPlace => {}
    }
    Ok(())
}

struct ItemOutcome {
    commands: Vec<String>,
    warnings: Vec<String>,
    output_info: Option<ImageInfo>,
}

struct ItemFailure {
    /// Commands already planned, kept for the item record.
    commands: Vec<String>,
    message: String,
}

/// Process a single item end to end. Every failure is isolated to this
/// item's result.
fn run_item(
    toolchain: &Toolchain,
    runner: &dyn CommandRunner,
    op: &Operation,
    opts: &WriteOptions,
    input_info: &ImageInfo,
    input: &Path,
    output: &Path,
) -> Result<ItemOutcome, ItemFailure> {
    let out_ext = ext_normalize(output);
    // Dry-run plans against the final path so recorded commands read as the
    // real run would.
    let write_target = if opts.dry_run {
        output.to_path_buf()
    } else {
        temp_write_path(output)
    };

    let ctx = PlanContext {
        input,
        write_target: &write_target,
        out_ext: &out_ext,
        info: input_info,
        options: opts,
    };
    let plan = plan::build_plan(op, toolchain, &ctx).map_err(|e| ItemFailure {
        commands: Vec::new(),
        message: e.to_string(),
    })?;
    let commands: Vec<String> = plan.steps.iter().map(Step::display).collect();

    if opts.dry_run {
        return Ok(ItemOutcome {
            commands,
            warnings: plan.warnings,
            output_info: None,
        });
    }

    let fail = |message: String| ItemFailure {
        commands: commands.clone(),
        message,
    };

    for step in &plan.steps {
        let result = match step {
            Step::Run(cmd) => runner.run(cmd),
            Step::Pipe(producer, consumer) => runner.run_piped(producer, consumer),
        };
        let run = match result {
            Ok(run) => run,
            Err(spawn) => {
                scrub(&plan.cleanup, &write_target);
                return Err(fail(spawn.to_string()));
            }
        };
        if !run.success() {
            scrub(&plan.cleanup, &write_target);
            let stderr = run.stderr.trim();
            let message = if stderr.is_empty() {
                format!("{} failed", op.name())
            } else {
                stderr.to_string()
            };
            return Err(fail(message));
        }
    }

    for intermediate in &plan.cleanup {
        let _ = std::fs::remove_file(intermediate);
    }
    atomic_replace(&write_target, output).map_err(|e| fail(e.to_string()))?;

    Ok(ItemOutcome {
        commands,
        warnings: plan.warnings,
        output_info: Some(toolchain.probe(runner, output)),
    })
}

/// Best-effort removal of intermediates and the half-written target.
fn scrub(intermediates: &[PathBuf], write_target: &Path) {
    for path in intermediates {
        let _ = std::fs::remove_file(path);
    }
    let _ = std::fs::remove_file(write_target);
}
