use clap::{Args, Parser, Subcommand};
use imgbatch::error::CliError;
use imgbatch::exec::SystemRunner;
use imgbatch::geometry::{self, CropRect, FitMode, ResizeRequest};
use imgbatch::inputs;
use imgbatch::ops::{ConvertTarget, CropSpec, Gravity, Operation, WriteOptions};
use imgbatch::outpath::OutputMode;
use imgbatch::output;
use imgbatch::process::{BatchRequest, RunEnv, run_batch};
use imgbatch::report;
use imgbatch::toolchain::Toolchain;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "imgbatch")]
#[command(about = "Batch image transformations via ImageMagick")]
#[command(long_about = "\
Batch image transformations via ImageMagick

One invocation is one operation applied to a batch of inputs. Validation is
front-loaded: flag mistakes, geometry problems, output collisions, and
missing confirmations all surface before any external command runs or any
file changes.

Output modes (exactly one per run):

  --out FILE       single output file (single input only)
  --out-dir DIR    one output per input, input stem preserved
  --in-place       rewrite inputs where they stand (requires --yes)

Exit codes:

  0  every item succeeded
  1  at least one item failed, or no ImageMagick on PATH
  2  usage/validation error, detected before processing

Use --json for a machine-readable summary on stdout; diagnostics always go
to stderr. --json/--report also write run artifacts under
out/image-processing/runs/<run-id>/ at the repository root.")]
#[command(version)]
struct Cli {
    /// Emit the machine-readable JSON summary on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Verbose diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe inputs and report format, dimensions, and alpha
    Info(InfoArgs),
    /// Bake the EXIF orientation into pixels
    AutoOrient(PlainArgs),
    /// Convert to another container format
    Convert(ConvertArgs),
    /// Resize by scale factor, one dimension, or into a box
    Resize(ResizeArgs),
    /// Rotate clockwise by degrees
    Rotate(RotateArgs),
    /// Crop to a rectangle, size, or aspect ratio
    Crop(CropArgs),
    /// Extend the canvas to a larger box
    Pad(PadArgs),
    /// Mirror vertically
    Flip(PlainArgs),
    /// Mirror horizontally
    Flop(PlainArgs),
    /// Re-encode smaller without changing formats
    Optimize(OptimizeArgs),
}

#[derive(Args, Clone, Debug)]
struct InputArgs {
    /// Input file or directory (repeatable)
    #[arg(long = "in", value_name = "PATH", required = true)]
    inputs: Vec<PathBuf>,

    /// Recurse into input directories
    #[arg(long)]
    recursive: bool,

    /// Filter expanded directory entries by filename glob (repeatable,
    /// e.g. '*.png'); files named directly bypass the filter
    #[arg(long, value_name = "PATTERN")]
    glob: Vec<String>,
}

#[derive(Args, Clone, Debug)]
#[group(required = true, multiple = false)]
struct OutputModeArgs {
    /// Single output file path (single input only)
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Output directory for batch runs
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Rewrite inputs in place (requires --yes)
    #[arg(long)]
    in_place: bool,
}

#[derive(Args, Clone, Debug)]
struct WriteArgs {
    #[command(flatten)]
    mode: OutputModeArgs,

    /// Confirm destructive operations (required for --in-place)
    #[arg(long)]
    yes: bool,

    /// Overwrite outputs that already exist
    #[arg(long)]
    overwrite: bool,

    /// Validate and plan only; run no commands, write no files
    #[arg(long)]
    dry_run: bool,

    /// Write report.md under the run directory
    #[arg(long)]
    report: bool,

    /// Do not bake EXIF orientation into output pixels
    #[arg(long)]
    no_auto_orient: bool,

    /// Remove EXIF/XMP/ICC metadata from outputs
    #[arg(long)]
    strip_metadata: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    #[command(flatten)]
    input: InputArgs,
}

#[derive(Args, Debug)]
struct PlainArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    write: WriteArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    write: WriteArgs,

    /// Target format
    #[arg(long, value_enum)]
    to: ConvertTarget,

    /// Encoding quality for lossy targets
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: Option<u8>,

    /// Background color used to flatten alpha for JPEG targets
    #[arg(long, value_name = "COLOR")]
    background: Option<String>,
}

#[derive(Args, Debug)]
struct ResizeArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    write: WriteArgs,

    /// Scale factor (e.g. 0.5, 2)
    #[arg(long)]
    scale: Option<f64>,

    /// Target width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Target height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Target aspect ratio, paired with --width or --height
    #[arg(long, value_name = "W:H", value_parser = aspect_value)]
    aspect: Option<(u32, u32)>,

    /// Box mapping policy; required when the target is a full box
    #[arg(long, value_enum)]
    fit: Option<FitMode>,

    /// Disable the default 2x pre-upscale before box fitting
    #[arg(long)]
    no_pre_upscale: bool,

    /// Background color for contain-fit padding
    #[arg(long, value_name = "COLOR")]
    background: Option<String>,
}

#[derive(Args, Debug)]
struct RotateArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    write: WriteArgs,

    /// Degrees clockwise; negatives rotate counter-clockwise
    #[arg(long, allow_negative_numbers = true)]
    degrees: i32,

    /// Background color for the corners exposed by non-right angles
    #[arg(long, value_name = "COLOR")]
    background: Option<String>,
}

#[derive(Args, Clone, Debug)]
#[group(required = true, multiple = false)]
struct CropSpecArgs {
    /// Crop rectangle WxH+X+Y
    #[arg(long, value_name = "WxH+X+Y", value_parser = rect_value)]
    rect: Option<CropRect>,

    /// Crop size WxH, anchored at --gravity
    #[arg(long, value_name = "WxH", value_parser = size_value)]
    size: Option<(u32, u32)>,

    /// Largest crop of this ratio that fits, anchored at --gravity
    #[arg(long, value_name = "W:H", value_parser = aspect_value)]
    aspect: Option<(u32, u32)>,
}

#[derive(Args, Debug)]
struct CropArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    write: WriteArgs,

    #[command(flatten)]
    spec: CropSpecArgs,

    /// Anchor for --size and --aspect crops
    #[arg(long, value_enum, default_value = "center")]
    gravity: Gravity,
}

#[derive(Args, Debug)]
struct PadArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    write: WriteArgs,

    /// Target canvas width (>= input width)
    #[arg(long)]
    width: u32,

    /// Target canvas height (>= input height)
    #[arg(long)]
    height: u32,

    /// Where the source sits on the extended canvas
    #[arg(long, value_enum, default_value = "center")]
    gravity: Gravity,

    /// Background color for the added canvas
    #[arg(long, value_name = "COLOR")]
    background: Option<String>,
}

#[derive(Args, Debug)]
struct OptimizeArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    write: WriteArgs,

    /// Encoding quality (default: 85 for jpg, 80 for webp)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: Option<u8>,

    /// Lossless re-encode (webp only)
    #[arg(long)]
    lossless: bool,

    /// Disable progressive encoding (jpg only)
    #[arg(long)]
    no_progressive: bool,
}

fn aspect_value(value: &str) -> Result<(u32, u32), String> {
    geometry::parse_aspect(value).map_err(|e| e.to_string())
}

fn size_value(value: &str) -> Result<(u32, u32), String> {
    geometry::parse_size(value).map_err(|e| e.to_string())
}

fn rect_value(value: &str) -> Result<CropRect, String> {
    geometry::parse_rect(value).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("imgbatch: error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("imgbatch=debug")
    } else {
        EnvFilter::new("imgbatch=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let json = cli.json;
    let (operation, input_args, write_args, background) = split(cli.command);

    let toolchain = Toolchain::detect()?;
    let inputs =
        inputs::expand_inputs(&input_args.inputs, input_args.recursive, &input_args.glob)?;

    let (output_mode, options) = match write_args {
        Some(write) => {
            let mode = OutputMode::resolve(
                write.mode.out,
                write.mode.out_dir,
                write.mode.in_place,
                write.yes,
            )?;
            let options = WriteOptions {
                overwrite: write.overwrite,
                dry_run: write.dry_run,
                auto_orient: !write.no_auto_orient,
                strip_metadata: write.strip_metadata,
                background,
                report: write.report,
            };
            (Some(mode), options)
        }
        None => (None, WriteOptions::default()),
    };

    let repo_root = report::find_repo_root();
    // Dry-run writes nothing, run artifacts included.
    let (run_dir, run_id) = if (json || options.report) && !options.dry_run {
        let run_id = report::new_run_id();
        let dir = report::run_dir(&repo_root, &run_id);
        std::fs::create_dir_all(&dir)?;
        (Some(dir), Some(run_id))
    } else {
        (None, None)
    };

    let env = RunEnv {
        repo_root,
        run_dir,
        run_id,
    };
    let request = BatchRequest {
        operation,
        inputs,
        output_mode,
        options,
    };

    let runner = SystemRunner::new();
    let summary = run_batch(&toolchain, &runner, &env, &request)?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        output::print_summary(&summary);
    }

    Ok(if summary.any_item_errored() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// Tear one parsed subcommand apart into the library's request pieces.
fn split(
    command: Command,
) -> (
    Operation,
    InputArgs,
    Option<WriteArgs>,
    Option<String>,
) {
    match command {
        Command::Info(args) => (Operation::Info, args.input, None, None),
        Command::AutoOrient(args) => (Operation::AutoOrient, args.input, Some(args.write), None),
        Command::Convert(args) => (
            Operation::Convert {
                to: args.to,
                quality: args.quality,
            },
            args.input,
            Some(args.write),
            args.background,
        ),
        Command::Resize(args) => (
            Operation::Resize {
                request: ResizeRequest {
                    scale: args.scale,
                    width: args.width,
                    height: args.height,
                    aspect: args.aspect,
                    fit: args.fit,
                },
                pre_upscale: !args.no_pre_upscale,
            },
            args.input,
            Some(args.write),
            args.background,
        ),
        Command::Rotate(args) => (
            Operation::Rotate {
                degrees: args.degrees,
            },
            args.input,
            Some(args.write),
            args.background,
        ),
        Command::Crop(args) => {
            let spec = match (args.spec.rect, args.spec.size, args.spec.aspect) {
                (Some(rect), _, _) => CropSpec::Rect(rect),
                (_, Some((w, h)), _) => CropSpec::Size(w, h),
                (_, _, Some((w, h))) => CropSpec::Aspect(w, h),
                (None, None, None) => unreachable!("clap group requires one crop spec"),
            };
            (
                Operation::Crop {
                    spec,
                    gravity: args.gravity,
                },
                args.input,
                Some(args.write),
                None,
            )
        }
        Command::Pad(args) => (
            Operation::Pad {
                width: args.width,
                height: args.height,
                gravity: args.gravity,
            },
            args.input,
            Some(args.write),
            args.background,
        ),
        Command::Flip(args) => (Operation::Flip, args.input, Some(args.write), None),
        Command::Flop(args) => (Operation::Flop, args.input, Some(args.write), None),
        Command::Optimize(args) => (
            Operation::Optimize {
                quality: args.quality,
                lossless: args.lossless,
                progressive: !args.no_progressive,
            },
            args.input,
            Some(args.write),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(args)
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn resize_parses_box_and_fit() {
        let cli = parse(&[
            "imgbatch", "resize", "--in", "a.png", "--out-dir", "out", "--width", "100",
            "--height", "100", "--fit", "cover",
        ])
        .unwrap();
        let (op, ..) = split(cli.command);
        let Operation::Resize { request, .. } = op else {
            panic!("expected resize");
        };
        assert_eq!(request.width, Some(100));
        assert_eq!(request.fit, Some(FitMode::Cover));
    }

    #[test]
    fn output_modes_are_exclusive() {
        let err = parse(&[
            "imgbatch", "flip", "--in", "a.png", "--out", "b.png", "--in-place",
        ])
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn an_output_mode_is_required() {
        let err = parse(&["imgbatch", "flip", "--in", "a.png"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn info_rejects_output_flags() {
        let err = parse(&["imgbatch", "info", "--in", "a.png", "--out", "b.png"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn irrelevant_flags_are_parse_errors() {
        // --degrees belongs to rotate, not flip.
        let err = parse(&[
            "imgbatch", "flip", "--in", "a.png", "--in-place", "--yes", "--degrees", "90",
        ])
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);

        // --background belongs to operations with flattening semantics.
        let err = parse(&[
            "imgbatch", "flip", "--in", "a.png", "--in-place", "--yes", "--background", "white",
        ])
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn crop_requires_exactly_one_spec() {
        let err = parse(&["imgbatch", "crop", "--in", "a.png", "--out-dir", "out"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = parse(&[
            "imgbatch", "crop", "--in", "a.png", "--out-dir", "out", "--size", "10x10",
            "--aspect", "1:1",
        ])
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let cli = parse(&[
            "imgbatch", "crop", "--in", "a.png", "--out-dir", "out", "--aspect", "1:1",
        ])
        .unwrap();
        let (op, ..) = split(cli.command);
        assert!(matches!(
            op,
            Operation::Crop {
                spec: CropSpec::Aspect(1, 1),
                gravity: Gravity::Center,
            }
        ));
    }

    #[test]
    fn rotate_accepts_negative_degrees() {
        let cli = parse(&[
            "imgbatch", "rotate", "--in", "a.png", "--in-place", "--yes", "--degrees", "-90",
        ])
        .unwrap();
        let (op, ..) = split(cli.command);
        assert!(matches!(op, Operation::Rotate { degrees: -90 }));
    }

    #[test]
    fn quality_range_is_enforced_at_parse() {
        let err = parse(&[
            "imgbatch", "convert", "--in", "a.png", "--out-dir", "out", "--to", "jpg",
            "--quality", "101",
        ])
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn malformed_geometry_fails_at_parse() {
        let err = parse(&[
            "imgbatch", "crop", "--in", "a.png", "--out-dir", "out", "--rect", "10x10",
        ])
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("WxH+X+Y"));
    }

    #[test]
    fn optimize_flags_parse() {
        let cli = parse(&[
            "imgbatch", "optimize", "--in", "a.webp", "--in-place", "--yes", "--lossless",
            "--no-progressive",
        ])
        .unwrap();
        let (op, ..) = split(cli.command);
        assert!(matches!(
            op,
            Operation::Optimize {
                quality: None,
                lossless: true,
                progressive: false,
            }
        ));
    }
}
