//! Per-item command planning.
//!
//! Turns an [`Operation`] plus the probed input facts into the exact
//! external command lines to run. Planning is pure — no process is spawned
//! and no file is touched — which is what makes dry-run previews carry the
//! same validation coverage as a real run.
//!
//! Background rules concentrate here: any step that exposes new pixels
//! (padding, non-right-angle rotation, alpha flattening) needs a fill color
//! when the output format cannot express transparency. Alpha-capable
//! outputs default to a transparent fill; opaque outputs refuse to guess.

use crate::exec::Invocation;
use crate::geometry::{self, FitMode, GeometryError};
use crate::ops::{ConvertTarget, CropSpec, Operation, WriteOptions};
use crate::outpath::{is_opaque_format, supports_alpha, temp_intermediate_path};
use crate::toolchain::{ImageInfo, Toolchain};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("unable to read input dimensions for {0}")]
    NoDimensions(&'static str),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("{reason} (provide --background <color>)")]
    BackgroundRequired { reason: &'static str },
    #[error("invalid crop dimensions")]
    EmptyCrop,
    #[error("crop size exceeds input dimensions")]
    CropTooLarge,
    #[error("pad target must be >= input dimensions (use crop or resize)")]
    PadTooSmall,
    #[error("optimize currently supports only jpg/webp outputs")]
    UnsupportedOptimize,
}

/// One planned execution step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Run(Invocation),
    /// `producer | consumer` (the jpeg re-encode path).
    Pipe(Invocation, Invocation),
}

impl Step {
    /// Display form recorded in summaries and reports.
    pub fn display(&self) -> String {
        match self {
            Step::Run(cmd) => cmd.display(),
            Step::Pipe(producer, consumer) => {
                format!("{} | {}", producer.display(), consumer.display())
            }
        }
    }
}

/// The full plan for one item.
#[derive(Debug, Default)]
pub struct Plan {
    pub steps: Vec<Step>,
    /// Intermediate files to delete once the steps finish.
    pub cleanup: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Everything planning needs to know about one item.
pub struct PlanContext<'a> {
    pub input: &'a Path,
    /// Where the external tool writes; the caller renames it to the final
    /// path afterwards (on dry-run this is the final path itself).
    pub write_target: &'a Path,
    /// Normalized extension of the final output.
    pub out_ext: &'a str,
    pub info: &'a ImageInfo,
    pub options: &'a WriteOptions,
}

/// Build the plan for one item. `info` operations plan nothing.
pub fn build_plan(
    op: &Operation,
    toolchain: &Toolchain,
    ctx: &PlanContext<'_>,
) -> Result<Plan, PlanError> {
    match op {
        Operation::Info => Ok(Plan::default()),
        Operation::AutoOrient => Ok(single(
            edit_base(toolchain, ctx, true).arg("-auto-orient"),
            ctx,
        )),
        Operation::Convert { to, quality } => plan_convert(toolchain, ctx, *to, *quality),
        Operation::Resize {
            request,
            pre_upscale,
        } => plan_resize(toolchain, ctx, request, *pre_upscale),
        Operation::Rotate { degrees } => plan_rotate(toolchain, ctx, *degrees),
        Operation::Crop { spec, gravity } => plan_crop(toolchain, ctx, spec, gravity.as_magick()),
        Operation::Pad {
            width,
            height,
            gravity,
        } => plan_pad(toolchain, ctx, *width, *height, gravity.as_magick()),
        Operation::Flip => Ok(single(edit_base(toolchain, ctx, false).arg("-flip"), ctx)),
        Operation::Flop => Ok(single(edit_base(toolchain, ctx, false).arg("-flop"), ctx)),
        Operation::Optimize {
            quality,
            lossless,
            progressive,
        } => plan_optimize(toolchain, ctx, *quality, *lossless, *progressive),
    }
}

/// The editor invocation reading the input, with the shared auto-orient
/// toggle applied. `unconditional` skips the toggle for the `auto-orient`
/// operation itself, which adds its flag explicitly.
fn edit_base(toolchain: &Toolchain, ctx: &PlanContext<'_>, unconditional: bool) -> Invocation {
    let mut cmd = toolchain.edit_command(ctx.input);
    if !unconditional && ctx.options.auto_orient {
        cmd = cmd.arg("-auto-orient");
    }
    cmd
}

/// Finish a single-command plan: metadata strip, write target.
fn single(mut cmd: Invocation, ctx: &PlanContext<'_>) -> Plan {
    if ctx.options.strip_metadata {
        cmd = cmd.arg("-strip");
    }
    Plan {
        steps: vec![Step::Run(cmd.arg_path(ctx.write_target))],
        ..Plan::default()
    }
}

/// The fill color for steps that expose new pixels: explicit wins,
/// alpha-capable outputs default to transparent, opaque outputs refuse.
fn padding_background(
    explicit: Option<&str>,
    out_ext: &str,
    reason: &'static str,
) -> Result<Option<String>, PlanError> {
    if let Some(color) = explicit {
        return Ok(Some(color.to_string()));
    }
    if supports_alpha(out_ext) {
        return Ok(Some("none".to_string()));
    }
    if is_opaque_format(out_ext) {
        return Err(PlanError::BackgroundRequired { reason });
    }
    Ok(None)
}

fn plan_convert(
    toolchain: &Toolchain,
    ctx: &PlanContext<'_>,
    to: ConvertTarget,
    quality: Option<u8>,
) -> Result<Plan, PlanError> {
    let mut cmd = edit_base(toolchain, ctx, false);

    if to == ConvertTarget::Jpg {
        if ctx.info.has_alpha() && ctx.options.background.is_none() {
            return Err(PlanError::BackgroundRequired {
                reason: "alpha input cannot be converted to JPEG without a background",
            });
        }
        if let Some(color) = &ctx.options.background {
            cmd = cmd
                .args(["-background", color.as_str()])
                .args(["-alpha", "remove", "-alpha", "off"]);
        }
    }

    if let Some(q) = quality {
        cmd = cmd.args(["-quality", &q.to_string()]);
    }

    Ok(single(cmd, ctx))
}

fn plan_resize(
    toolchain: &Toolchain,
    ctx: &PlanContext<'_>,
    request: &geometry::ResizeRequest,
    pre_upscale: bool,
) -> Result<Plan, PlanError> {
    let source = ctx
        .info
        .dimensions()
        .ok_or(PlanError::NoDimensions("resize"))?;
    let target = geometry::compute_resize_target(source, request)?;

    let mut cmd = edit_base(toolchain, ctx, false);
    if pre_upscale {
        cmd = cmd.args(["-resize", "200%"]);
    }

    let box_arg = format!("{}x{}", target.width, target.height);
    match target.fit {
        None => {
            cmd = cmd.args(["-resize", &format!("{box_arg}!")]);
        }
        Some(FitMode::Stretch) => {
            cmd = cmd.args(["-resize", &format!("{box_arg}!")]);
        }
        Some(FitMode::Cover) => {
            cmd = cmd
                .args(["-resize", &format!("{box_arg}^")])
                .args(["-gravity", "center", "-extent", &box_arg]);
        }
        Some(FitMode::Contain) => {
            cmd = cmd.args(["-resize", &box_arg]);
            let background = padding_background(
                ctx.options.background.as_deref(),
                ctx.out_ext,
                "contain fit requires padding background for non-alpha outputs",
            )?;
            if let Some(color) = background {
                cmd = cmd.args(["-background", &color]);
            }
            cmd = cmd.args(["-gravity", "center", "-extent", &box_arg]);
        }
    }

    Ok(single(cmd, ctx))
}

fn plan_rotate(
    toolchain: &Toolchain,
    ctx: &PlanContext<'_>,
    degrees: i32,
) -> Result<Plan, PlanError> {
    let mut cmd = edit_base(toolchain, ctx, false);

    // Right-angle rotations keep the frame fully covered; anything else
    // exposes corners that need a fill.
    if degrees % 90 != 0 {
        let background = padding_background(
            ctx.options.background.as_deref(),
            ctx.out_ext,
            "non-right-angle rotation requires a background for JPEG outputs",
        )?;
        if let Some(color) = background {
            cmd = cmd.args(["-background", &color]);
        }
    }
    cmd = cmd.args(["-rotate", &degrees.to_string()]);

    Ok(single(cmd, ctx))
}

fn plan_crop(
    toolchain: &Toolchain,
    ctx: &PlanContext<'_>,
    spec: &CropSpec,
    gravity: &str,
) -> Result<Plan, PlanError> {
    let (src_w, src_h) = ctx
        .info
        .dimensions()
        .ok_or(PlanError::NoDimensions("crop"))?;

    let (width, height, x, y, anchored) = match spec {
        CropSpec::Rect(rect) => (rect.width, rect.height, rect.x, rect.y, false),
        CropSpec::Size(w, h) => (*w, *h, 0, 0, true),
        CropSpec::Aspect(aw, ah) => {
            let (w, h) = geometry::aspect_crop((src_w, src_h), (*aw, *ah));
            (w, h, 0, 0, true)
        }
    };

    if width == 0 || height == 0 {
        return Err(PlanError::EmptyCrop);
    }
    if width > src_w || height > src_h {
        return Err(PlanError::CropTooLarge);
    }

    let mut cmd = edit_base(toolchain, ctx, false);
    let rect_arg = format!("{width}x{height}+{x}+{y}");
    if anchored {
        cmd = cmd.args(["-gravity", gravity]);
    }
    cmd = cmd.args(["-crop", &rect_arg, "+repage"]);

    Ok(single(cmd, ctx))
}

fn plan_pad(
    toolchain: &Toolchain,
    ctx: &PlanContext<'_>,
    width: u32,
    height: u32,
    gravity: &str,
) -> Result<Plan, PlanError> {
    let (src_w, src_h) = ctx
        .info
        .dimensions()
        .ok_or(PlanError::NoDimensions("pad"))?;
    if width < src_w || height < src_h {
        return Err(PlanError::PadTooSmall);
    }

    let mut cmd = edit_base(toolchain, ctx, false);
    let background = padding_background(
        ctx.options.background.as_deref(),
        ctx.out_ext,
        "pad requires a background for non-alpha outputs",
    )?;
    if let Some(color) = background {
        cmd = cmd.args(["-background", &color]);
    }
    cmd = cmd.args(["-gravity", gravity, "-extent", &format!("{width}x{height}")]);

    Ok(single(cmd, ctx))
}

fn plan_optimize(
    toolchain: &Toolchain,
    ctx: &PlanContext<'_>,
    quality: Option<u8>,
    lossless: bool,
    progressive: bool,
) -> Result<Plan, PlanError> {
    match ctx.out_ext {
        "jpg" => plan_optimize_jpg(toolchain, ctx, quality.unwrap_or(85), progressive),
        "webp" => plan_optimize_webp(toolchain, ctx, quality.unwrap_or(80), lossless),
        _ => Err(PlanError::UnsupportedOptimize),
    }
}

fn plan_optimize_jpg(
    toolchain: &Toolchain,
    ctx: &PlanContext<'_>,
    quality: u8,
    progressive: bool,
) -> Result<Plan, PlanError> {
    if toolchain.has_jpeg_pair() {
        // The decode -> re-encode pipeline strips metadata implicitly and
        // avoids generation loss from the generic editor's decoder choices.
        let djpeg = toolchain
            .djpeg
            .as_ref()
            .ok_or(PlanError::UnsupportedOptimize)?;
        let cjpeg = toolchain
            .cjpeg
            .as_ref()
            .ok_or(PlanError::UnsupportedOptimize)?;

        let producer = Invocation::new(djpeg.display().to_string()).arg_path(ctx.input);
        let mut consumer = Invocation::new(cjpeg.display().to_string())
            .args(["-quality", &quality.to_string()])
            .arg("-optimize");
        if progressive {
            consumer = consumer.arg("-progressive");
        }
        consumer = consumer.arg("-outfile").arg_path(ctx.write_target);

        return Ok(Plan {
            steps: vec![Step::Pipe(producer, consumer)],
            ..Plan::default()
        });
    }

    let mut cmd = edit_base(toolchain, ctx, false).args(["-quality", &quality.to_string()]);
    if progressive {
        cmd = cmd.args(["-interlace", "Plane"]);
    }
    let mut plan = single(cmd, ctx);
    plan.warnings
        .push("cjpeg/djpeg not found; using the generic imagemagick re-encode".to_string());
    Ok(plan)
}

fn plan_optimize_webp(
    toolchain: &Toolchain,
    ctx: &PlanContext<'_>,
    quality: u8,
    lossless: bool,
) -> Result<Plan, PlanError> {
    if toolchain.has_webp_pair() {
        let dwebp = toolchain
            .dwebp
            .as_ref()
            .ok_or(PlanError::UnsupportedOptimize)?;
        let cwebp = toolchain
            .cwebp
            .as_ref()
            .ok_or(PlanError::UnsupportedOptimize)?;

        // Decode to PAM so alpha survives the handoff, then re-encode.
        let pam = temp_intermediate_path(ctx.write_target, "pam");
        let decode = Invocation::new(dwebp.display().to_string())
            .arg_path(ctx.input)
            .arg("-pam")
            .arg("-o")
            .arg_path(&pam);

        let mut encode = Invocation::new(cwebp.display().to_string());
        if lossless {
            encode = encode.arg("-lossless");
        } else {
            encode = encode.args(["-q", &quality.to_string()]);
        }
        if ctx.options.strip_metadata {
            encode = encode.args(["-metadata", "none"]);
        }
        encode = encode.arg_path(&pam).arg("-o").arg_path(ctx.write_target);

        return Ok(Plan {
            steps: vec![Step::Run(decode), Step::Run(encode)],
            cleanup: vec![pam],
            warnings: Vec::new(),
        });
    }

    let mut cmd = edit_base(toolchain, ctx, false);
    if lossless {
        cmd = cmd.args(["-define", "webp:lossless=true"]);
    } else {
        cmd = cmd.args(["-quality", &quality.to_string()]);
    }
    let mut plan = single(cmd, ctx);
    plan.warnings
        .push("cwebp/dwebp not found; using the generic imagemagick re-encode".to_string());
    Ok(plan)
}
