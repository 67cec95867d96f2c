//! # imgbatch
//!
//! Batch image transformations driven by external tools. One invocation is
//! one operation (`convert`, `resize`, `rotate`, `crop`, `pad`, `flip`,
//! `flop`, `optimize`, plus the read-only `info` and `auto-orient`) applied
//! to a batch of inputs, with per-operation validation front-loaded so
//! mistakes surface before any process runs or file changes.
//!
//! # Architecture: Validate, Plan, Execute
//!
//! ```text
//! 1. Expand    --in/--glob      ->  ordered input list
//! 2. Validate  flags + probes   ->  Operation + OutputMode (typed, exclusive)
//! 3. Plan      per item         ->  external command lines (pure)
//! 4. Execute   sequentially     ->  temp write, atomic rename, re-probe
//! 5. Report    summary object   ->  stdout (json/human), summary.json, report.md
//! ```
//!
//! Planning is pure and execution is injected, so the full pipeline —
//! including failure isolation and dry-run behavior — is testable without
//! ImageMagick installed. Dry-run stops after step 3 and reports the exact
//! commands a real run would issue.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`toolchain`] | PATH discovery of the editor and optional codecs; image probing |
//! | [`exec`] | command values, shell-quoted display, the runner seam |
//! | [`inputs`] | `--in` expansion: directories, recursion, glob filters |
//! | [`geometry`] | compact-geometry parsers and dimension math (pure) |
//! | [`ops`] | the `Operation` tagged union and shared write options |
//! | [`outpath`] | output modes, path derivation, collisions, safe writes |
//! | [`plan`] | per-item external command planning (pure) |
//! | [`process`] | the batch state machine with per-item failure isolation |
//! | [`report`] | run ids, the summary object, `summary.json`, `report.md` |
//! | [`output`] | human-readable stdout formatting |
//! | [`error`] | exit-code taxonomy: usage = 2, environment/runtime = 1 |
//!
//! # Design Decisions
//!
//! ## External Tools, Not In-Process Codecs
//!
//! Pixel work is delegated to ImageMagick (either the `magick` binary or
//! the legacy `convert` + `identify` pair), with `cjpeg`/`djpeg` and
//! `cwebp`/`dwebp` preferred for `optimize` when both halves of a pair are
//! present — the dedicated codecs preserve fidelity and strip metadata more
//! precisely than a generic re-encode. The toolchain is probed once and
//! passed in; nothing reaches for PATH mid-run.
//!
//! ## Illegal States Are Unrepresentable
//!
//! Mutually exclusive choices — the output mode, the crop source of truth —
//! are tagged unions, not independent nullable fields. The CLI layer
//! enforces exclusivity at parse time (clap groups); the library types make
//! the invalid combinations impossible to hand to the pipeline at all.
//!
//! ## Safety Over Guessing
//!
//! Flattening alpha, padding, and non-right-angle rotation all need a fill
//! color when the output format cannot express transparency. There is no
//! default guess for opaque formats: the run refuses with a usage error
//! naming `--background`. In-place rewrites require explicit confirmation,
//! existing outputs require `--overwrite`, and two inputs deriving the same
//! output path abort the whole batch before anything is written.

pub mod error;
pub mod exec;
pub mod geometry;
pub mod inputs;
pub mod ops;
pub mod outpath;
pub mod output;
pub mod plan;
pub mod process;
pub mod report;
pub mod toolchain;
