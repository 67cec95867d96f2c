//! Pure geometry: compact-string parsers and dimension math.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! Three compact encodings appear on the CLI:
//!
//! | Encoding | Shape | Used by |
//! |---|---|---|
//! | `W:H` | aspect ratio | `resize --aspect`, `crop --aspect` |
//! | `WxH` | size | `crop --size` |
//! | `WxH+X+Y` | rectangle | `crop --rect` |
//!
//! Width and height are always strictly positive; rectangle offsets may be
//! negative. All derived dimensions round half-to-even and clamp to 1px.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum GeometryError {
    #[error("invalid aspect: {0:?} (expected W:H)")]
    BadAspect(String),
    #[error("invalid size: {0:?} (expected WxH)")]
    BadSize(String),
    #[error("invalid rect geometry: {0:?} (expected WxH+X+Y)")]
    BadRect(String),
    #[error("--scale is mutually exclusive with --width/--height/--aspect/--fit")]
    ScaleConflict,
    #[error("--scale must be > 0")]
    NonPositiveScale,
    #[error("--width must be > 0")]
    NonPositiveWidth,
    #[error("--height must be > 0")]
    NonPositiveHeight,
    #[error("resize requires one of: --scale, --width, --height, or --aspect + size")]
    MissingTarget,
    #[error("--fit is only valid when a target box is fully specified")]
    FitWithoutBox,
    #[error("when using --width + --height, --fit contain|cover|stretch is required")]
    BoxNeedsFit,
    #[error("when using --aspect, you must also specify --width or --height")]
    AspectNeedsDimension,
    #[error("when using --aspect, --fit contain|cover|stretch is required")]
    AspectNeedsFit,
    #[error("--width/--height must match --aspect")]
    AspectMismatch,
}

/// Policy for mapping a source image into a fixed-size box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Preserve aspect, pad to fill the box.
    Contain,
    /// Preserve aspect, crop to fill the box.
    Cover,
    /// Ignore aspect, distort to the box.
    Stretch,
}

/// An explicit crop rectangle. Offsets may be negative (ImageMagick clips).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

/// Parse an aspect ratio written as `W:H`.
///
/// ```
/// # use imgbatch::geometry::parse_aspect;
/// assert_eq!(parse_aspect("16:9").unwrap(), (16, 9));
/// assert_eq!(parse_aspect(" 4 : 5 ").unwrap(), (4, 5));
/// assert!(parse_aspect("16x9").is_err());
/// ```
pub fn parse_aspect(value: &str) -> Result<(u32, u32), GeometryError> {
    let err = || GeometryError::BadAspect(value.to_string());
    let (w, h) = value.split_once(':').ok_or_else(err)?;
    let w: u32 = w.trim().parse().map_err(|_| err())?;
    let h: u32 = h.trim().parse().map_err(|_| err())?;
    if w == 0 || h == 0 {
        return Err(err());
    }
    Ok((w, h))
}

/// Parse a size written as `WxH`.
pub fn parse_size(value: &str) -> Result<(u32, u32), GeometryError> {
    let err = || GeometryError::BadSize(value.to_string());
    let (w, h) = value.split_once(['x', 'X']).ok_or_else(err)?;
    let w: u32 = w.trim().parse().map_err(|_| err())?;
    let h: u32 = h.trim().parse().map_err(|_| err())?;
    if w == 0 || h == 0 {
        return Err(err());
    }
    Ok((w, h))
}

/// Parse a rectangle written as `WxH+X+Y`. `X`/`Y` accept a leading minus.
pub fn parse_rect(value: &str) -> Result<CropRect, GeometryError> {
    let err = || GeometryError::BadRect(value.to_string());

    let (size, offsets) = value.split_once('+').ok_or_else(err)?;
    let (w, h) = parse_size(size).map_err(|_| err())?;

    // The remaining "X+Y" part: a '+' separates the offsets, but each offset
    // may itself start with '-'.
    let (x, y) = offsets.split_once('+').ok_or_else(err)?;
    let x: i32 = x.trim().parse().map_err(|_| err())?;
    let y: i32 = y.trim().parse().map_err(|_| err())?;

    Ok(CropRect {
        width: w,
        height: h,
        x,
        y,
    })
}

/// Round a derived dimension: half-to-even, never below 1px.
fn round_dim(value: f64) -> u32 {
    let rounded = value.round_ties_even();
    if rounded < 1.0 { 1 } else { rounded as u32 }
}

/// Raw resize flags, prior to validation against the source dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResizeRequest {
    pub scale: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub aspect: Option<(u32, u32)>,
    pub fit: Option<FitMode>,
}

/// The computed resize target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeTarget {
    pub width: u32,
    pub height: u32,
    /// `Some` when the target is a box to map into; `None` means resize to
    /// exact dimensions (scale factor or single-dimension proportional).
    pub fit: Option<FitMode>,
}

/// Compute the resize target from the request and source dimensions.
///
/// Accepted shapes, mutually exclusive:
/// - `--scale F`: both dimensions scaled, no box.
/// - `--width W` *or* `--height H`: the other dimension follows
///   proportionally, no box. `--fit` is rejected here.
/// - `--width W --height H`: explicit box, `--fit` required.
/// - `--aspect W:H` plus one dimension: box of that ratio, `--fit` required.
///   Supplying both dimensions as well is allowed only when they match the
///   ratio (within 1e-6).
pub fn compute_resize_target(
    source: (u32, u32),
    req: &ResizeRequest,
) -> Result<ResizeTarget, GeometryError> {
    let (src_w, src_h) = source;

    if let Some(scale) = req.scale {
        if req.width.is_some() || req.height.is_some() || req.aspect.is_some() || req.fit.is_some()
        {
            return Err(GeometryError::ScaleConflict);
        }
        if scale <= 0.0 {
            return Err(GeometryError::NonPositiveScale);
        }
        return Ok(ResizeTarget {
            width: round_dim(src_w as f64 * scale),
            height: round_dim(src_h as f64 * scale),
            fit: None,
        });
    }

    let Some((aspect_w, aspect_h)) = req.aspect else {
        return match (req.width, req.height) {
            (None, None) => Err(GeometryError::MissingTarget),
            (Some(w), None) => {
                if w == 0 {
                    return Err(GeometryError::NonPositiveWidth);
                }
                if req.fit.is_some() {
                    return Err(GeometryError::FitWithoutBox);
                }
                Ok(ResizeTarget {
                    width: w,
                    height: round_dim(src_h as f64 * (w as f64 / src_w as f64)),
                    fit: None,
                })
            }
            (None, Some(h)) => {
                if h == 0 {
                    return Err(GeometryError::NonPositiveHeight);
                }
                if req.fit.is_some() {
                    return Err(GeometryError::FitWithoutBox);
                }
                Ok(ResizeTarget {
                    width: round_dim(src_w as f64 * (h as f64 / src_h as f64)),
                    height: h,
                    fit: None,
                })
            }
            (Some(w), Some(h)) => {
                if w == 0 {
                    return Err(GeometryError::NonPositiveWidth);
                }
                if h == 0 {
                    return Err(GeometryError::NonPositiveHeight);
                }
                let Some(fit) = req.fit else {
                    return Err(GeometryError::BoxNeedsFit);
                };
                Ok(ResizeTarget {
                    width: w,
                    height: h,
                    fit: Some(fit),
                })
            }
        };
    };

    // Aspect given: it must pair with at least one dimension and a fit mode.
    if req.width.is_none() && req.height.is_none() {
        return Err(GeometryError::AspectNeedsDimension);
    }
    let Some(fit) = req.fit else {
        return Err(GeometryError::AspectNeedsFit);
    };

    match (req.width, req.height) {
        (Some(w), Some(h)) => {
            if w == 0 {
                return Err(GeometryError::NonPositiveWidth);
            }
            if h == 0 {
                return Err(GeometryError::NonPositiveHeight);
            }
            let ratio = w as f64 / h as f64;
            let wanted = aspect_w as f64 / aspect_h as f64;
            if (ratio - wanted).abs() > 1e-6 {
                return Err(GeometryError::AspectMismatch);
            }
            Ok(ResizeTarget {
                width: w,
                height: h,
                fit: Some(fit),
            })
        }
        (Some(w), None) => {
            if w == 0 {
                return Err(GeometryError::NonPositiveWidth);
            }
            Ok(ResizeTarget {
                width: w,
                height: round_dim(w as f64 * (aspect_h as f64 / aspect_w as f64)),
                fit: Some(fit),
            })
        }
        (None, Some(h)) => {
            if h == 0 {
                return Err(GeometryError::NonPositiveHeight);
            }
            Ok(ResizeTarget {
                width: round_dim(h as f64 * (aspect_w as f64 / aspect_h as f64)),
                height: h,
                fit: Some(fit),
            })
        }
        (None, None) => unreachable!("checked above"),
    }
}

/// Check the flag combination alone. Every rejection in
/// [`compute_resize_target`] is independent of the source dimensions, so
/// the CLI can refuse an impossible request before probing any file.
pub fn validate_resize_request(req: &ResizeRequest) -> Result<(), GeometryError> {
    compute_resize_target((1, 1), req).map(|_| ())
}

/// Largest rectangle of the given aspect ratio that fits inside the source.
///
/// The caller anchors it (center gravity for aspect crops), so only the
/// dimensions are returned.
///
/// ```
/// # use imgbatch::geometry::aspect_crop;
/// // Largest centered square inside 80x60 is 60x60.
/// assert_eq!(aspect_crop((80, 60), (1, 1)), (60, 60));
/// ```
pub fn aspect_crop(source: (u32, u32), aspect: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (aspect_w, aspect_h) = aspect;

    let target = aspect_w as f64 / aspect_h as f64;
    let original = src_w as f64 / src_h as f64;

    if original > target {
        // Source is wider than the target ratio: full height, trimmed width.
        (round_dim(src_h as f64 * target), src_h)
    } else {
        // Source is taller (or equal): full width, trimmed height.
        (src_w, round_dim(src_w as f64 / target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Parser tests
    // =========================================================================

    #[test]
    fn aspect_parses_plain_and_padded() {
        assert_eq!(parse_aspect("16:9").unwrap(), (16, 9));
        assert_eq!(parse_aspect(" 1 : 1 ").unwrap(), (1, 1));
    }

    #[test]
    fn aspect_rejects_zero_and_garbage() {
        assert!(parse_aspect("0:1").is_err());
        assert!(parse_aspect("1:0").is_err());
        assert!(parse_aspect("16x9").is_err());
        assert!(parse_aspect("16:").is_err());
        assert!(parse_aspect("-4:5").is_err());
    }

    #[test]
    fn size_parses_wxh() {
        assert_eq!(parse_size("640x480").unwrap(), (640, 480));
        assert_eq!(parse_size("640X480").unwrap(), (640, 480));
    }

    #[test]
    fn size_rejects_zero_dimensions() {
        assert!(parse_size("0x480").is_err());
        assert!(parse_size("640x0").is_err());
        assert!(parse_size("640").is_err());
    }

    #[test]
    fn rect_parses_positive_offsets() {
        let r = parse_rect("100x50+10+20").unwrap();
        assert_eq!((r.width, r.height, r.x, r.y), (100, 50, 10, 20));
    }

    #[test]
    fn rect_parses_negative_offsets() {
        let r = parse_rect("100x50+-10+-20").unwrap();
        assert_eq!((r.x, r.y), (-10, -20));
    }

    #[test]
    fn rect_rejects_missing_offsets() {
        assert!(parse_rect("100x50").is_err());
        assert!(parse_rect("100x50+10").is_err());
        assert!(parse_rect("0x50+1+1").is_err());
    }

    // =========================================================================
    // compute_resize_target tests
    // =========================================================================

    fn req(f: impl FnOnce(&mut ResizeRequest)) -> ResizeRequest {
        let mut r = ResizeRequest::default();
        f(&mut r);
        r
    }

    #[test]
    fn scale_doubles_both_dimensions() {
        let t = compute_resize_target((80, 60), &req(|r| r.scale = Some(2.0))).unwrap();
        assert_eq!((t.width, t.height, t.fit), (160, 120, None));
    }

    #[test]
    fn scale_clamps_to_one_pixel() {
        let t = compute_resize_target((80, 60), &req(|r| r.scale = Some(0.001))).unwrap();
        assert_eq!((t.width, t.height), (1, 1));
    }

    #[test]
    fn scale_conflicts_with_other_flags() {
        let r = req(|r| {
            r.scale = Some(2.0);
            r.width = Some(100);
        });
        assert_eq!(
            compute_resize_target((80, 60), &r),
            Err(GeometryError::ScaleConflict)
        );
    }

    #[test]
    fn scale_must_be_positive() {
        assert_eq!(
            compute_resize_target((80, 60), &req(|r| r.scale = Some(0.0))),
            Err(GeometryError::NonPositiveScale)
        );
    }

    #[test]
    fn width_only_scales_height_proportionally() {
        let t = compute_resize_target((80, 60), &req(|r| r.width = Some(40))).unwrap();
        assert_eq!((t.width, t.height, t.fit), (40, 30, None));
    }

    #[test]
    fn height_only_scales_width_proportionally() {
        let t = compute_resize_target((80, 60), &req(|r| r.height = Some(30))).unwrap();
        assert_eq!((t.width, t.height, t.fit), (40, 30, None));
    }

    #[test]
    fn single_dimension_rejects_fit() {
        let r = req(|r| {
            r.width = Some(40);
            r.fit = Some(FitMode::Contain);
        });
        assert_eq!(
            compute_resize_target((80, 60), &r),
            Err(GeometryError::FitWithoutBox)
        );
    }

    #[test]
    fn full_box_requires_fit() {
        let r = req(|r| {
            r.width = Some(100);
            r.height = Some(100);
        });
        assert_eq!(
            compute_resize_target((80, 60), &r),
            Err(GeometryError::BoxNeedsFit)
        );
    }

    #[test]
    fn full_box_with_fit() {
        let r = req(|r| {
            r.width = Some(100);
            r.height = Some(100);
            r.fit = Some(FitMode::Cover);
        });
        let t = compute_resize_target((80, 60), &r).unwrap();
        assert_eq!((t.width, t.height, t.fit), (100, 100, Some(FitMode::Cover)));
    }

    #[test]
    fn no_flags_is_an_error() {
        assert_eq!(
            compute_resize_target((80, 60), &ResizeRequest::default()),
            Err(GeometryError::MissingTarget)
        );
    }

    #[test]
    fn aspect_needs_a_dimension() {
        let r = req(|r| r.aspect = Some((16, 9)));
        assert_eq!(
            compute_resize_target((80, 60), &r),
            Err(GeometryError::AspectNeedsDimension)
        );
    }

    #[test]
    fn aspect_needs_fit() {
        let r = req(|r| {
            r.aspect = Some((16, 9));
            r.width = Some(160);
        });
        assert_eq!(
            compute_resize_target((80, 60), &r),
            Err(GeometryError::AspectNeedsFit)
        );
    }

    #[test]
    fn aspect_plus_width_derives_height() {
        let r = req(|r| {
            r.aspect = Some((16, 9));
            r.width = Some(160);
            r.fit = Some(FitMode::Contain);
        });
        let t = compute_resize_target((80, 60), &r).unwrap();
        assert_eq!((t.width, t.height), (160, 90));
        assert_eq!(t.fit, Some(FitMode::Contain));
    }

    #[test]
    fn aspect_plus_height_derives_width() {
        let r = req(|r| {
            r.aspect = Some((16, 9));
            r.height = Some(90);
            r.fit = Some(FitMode::Stretch);
        });
        let t = compute_resize_target((80, 60), &r).unwrap();
        assert_eq!((t.width, t.height), (160, 90));
    }

    #[test]
    fn aspect_with_matching_box_is_accepted() {
        let r = req(|r| {
            r.aspect = Some((4, 3));
            r.width = Some(400);
            r.height = Some(300);
            r.fit = Some(FitMode::Cover);
        });
        let t = compute_resize_target((80, 60), &r).unwrap();
        assert_eq!((t.width, t.height), (400, 300));
    }

    #[test]
    fn aspect_with_mismatching_box_is_rejected() {
        let r = req(|r| {
            r.aspect = Some((4, 3));
            r.width = Some(400);
            r.height = Some(301);
            r.fit = Some(FitMode::Cover);
        });
        assert_eq!(
            compute_resize_target((80, 60), &r),
            Err(GeometryError::AspectMismatch)
        );
    }

    #[test]
    fn rounding_is_half_to_even() {
        // 5 * 0.5 = 2.5 rounds to 2 (even), not 3.
        let t = compute_resize_target((5, 5), &req(|r| r.scale = Some(0.5))).unwrap();
        assert_eq!((t.width, t.height), (2, 2));
        // 7 * 0.5 = 3.5 rounds to 4 (even).
        let t = compute_resize_target((7, 7), &req(|r| r.scale = Some(0.5))).unwrap();
        assert_eq!((t.width, t.height), (4, 4));
    }

    #[test]
    fn validation_alone_catches_combination_errors() {
        let r = req(|r| {
            r.scale = Some(2.0);
            r.fit = Some(FitMode::Cover);
        });
        assert_eq!(
            validate_resize_request(&r),
            Err(GeometryError::ScaleConflict)
        );
        assert!(validate_resize_request(&req(|r| r.scale = Some(2.0))).is_ok());
        assert!(validate_resize_request(&req(|r| r.width = Some(40))).is_ok());
    }

    // =========================================================================
    // aspect_crop tests
    // =========================================================================

    #[test]
    fn square_crop_of_landscape() {
        assert_eq!(aspect_crop((80, 60), (1, 1)), (60, 60));
    }

    #[test]
    fn square_crop_of_portrait() {
        assert_eq!(aspect_crop((60, 80), (1, 1)), (60, 60));
    }

    #[test]
    fn wide_crop_of_landscape() {
        // 16:9 inside 1920x1440: full width, height 1080.
        assert_eq!(aspect_crop((1920, 1440), (16, 9)), (1920, 1080));
    }

    #[test]
    fn tall_crop_of_landscape() {
        // 9:16 inside 1920x1080: full height, width 608 (1080 * 9/16 = 607.5
        // rounds to even).
        assert_eq!(aspect_crop((1920, 1080), (9, 16)), (608, 1080));
    }

    #[test]
    fn matching_ratio_is_identity() {
        assert_eq!(aspect_crop((800, 600), (4, 3)), (800, 600));
    }
}
