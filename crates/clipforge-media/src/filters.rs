//! Transcoder filter construction for the supported crop modes.

use clipforge_models::{CropKeyframe, CropMode, CropPlan};

/// A built video filter, routed to `-vf` or `-filter_complex`.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoFilter {
    Simple(String),
    Complex(String),
}

/// Build the filter mapping a source into the `out_w`×`out_h` vertical
/// frame for the given crop mode.
///
/// `plan` is required for smart reframe and ignored otherwise.
pub fn build_crop_filter(
    mode: CropMode,
    plan: Option<&CropPlan>,
    out_w: u32,
    out_h: u32,
) -> VideoFilter {
    match mode {
        CropMode::Center => VideoFilter::Simple(format!(
            "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
            w = out_w,
            h = out_h
        )),
        CropMode::Letterbox => VideoFilter::Simple(format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = out_w,
            h = out_h
        )),
        CropMode::BlurPad => VideoFilter::Complex(format!(
            "[0:v]split=2[bg][fg];\
             [bg]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},boxblur=20:5[bgb];\
             [fg]scale={w}:{h}:force_original_aspect_ratio=decrease[fgs];\
             [bgb][fgs]overlay=(W-w)/2:(H-h)/2",
            w = out_w,
            h = out_h
        )),
        CropMode::SmartReframe => {
            let x_expr = match plan {
                Some(CropPlan::Static { x_frac }) => static_x_expr(*x_frac),
                Some(CropPlan::Dynamic { keyframes }) => dynamic_x_expr(keyframes),
                None => static_x_expr(0.5),
            };
            VideoFilter::Simple(format!(
                "crop=ih*9/16:ih:{}:0,scale={}:{}",
                x_expr, out_w, out_h
            ))
        }
    }
}

/// Fixed crop-x expression, clamped inside the frame.
fn static_x_expr(x_frac: f64) -> String {
    format!("min(max({:.4}*iw\\,0)\\,iw-ih*9/16)", x_frac)
}

/// Piecewise-linear crop-x between keyframes, as a nested `if` chain over
/// the frame time `t`.
fn dynamic_x_expr(keyframes: &[CropKeyframe]) -> String {
    match keyframes {
        [] => static_x_expr(0.5),
        [only] => static_x_expr(only.x_frac),
        _ => {
            // Innermost expression: hold the last keyframe's position
            let last = keyframes.last().expect("non-empty");
            let mut expr = format!("{:.4}*iw", last.x_frac);

            for pair in keyframes.windows(2).rev() {
                let (a, b) = (&pair[0], &pair[1]);
                let span = (b.time_s - a.time_s).max(0.001);
                let lerp = format!(
                    "{a:.4}*iw+({b:.4}-{a:.4})*iw*(t-{t0:.3})/{span:.3}",
                    a = a.x_frac,
                    b = b.x_frac,
                    t0 = a.time_s,
                    span = span
                );
                expr = format!("if(lt(t\\,{:.3})\\,{}\\,{})", b.time_s, lerp, expr);
            }

            // Times before the first keyframe hold its position
            let first = keyframes.first().expect("non-empty");
            expr = format!(
                "if(lt(t\\,{:.3})\\,{:.4}*iw\\,{})",
                first.time_s, first.x_frac, expr
            );
            format!("min(max({}\\,0)\\,iw-ih*9/16)", expr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_filter() {
        let VideoFilter::Simple(f) = build_crop_filter(CropMode::Center, None, 1080, 1920) else {
            panic!("center is a simple filter");
        };
        assert!(f.contains("force_original_aspect_ratio=increase"));
        assert!(f.contains("crop=1080:1920"));
    }

    #[test]
    fn test_letterbox_pads() {
        let VideoFilter::Simple(f) = build_crop_filter(CropMode::Letterbox, None, 720, 1280)
        else {
            panic!("letterbox is a simple filter");
        };
        assert!(f.contains("pad=720:1280"));
        assert!(f.contains("decrease"));
    }

    #[test]
    fn test_blur_pad_is_complex() {
        let filter = build_crop_filter(CropMode::BlurPad, None, 1080, 1920);
        let VideoFilter::Complex(f) = filter else {
            panic!("blur_pad needs filter_complex");
        };
        assert!(f.contains("boxblur"));
        assert!(f.contains("overlay"));
    }

    #[test]
    fn test_smart_reframe_static() {
        let plan = CropPlan::Static { x_frac: 0.25 };
        let VideoFilter::Simple(f) =
            build_crop_filter(CropMode::SmartReframe, Some(&plan), 1080, 1920)
        else {
            panic!("smart reframe is a simple filter");
        };
        assert!(f.contains("crop=ih*9/16:ih:"));
        assert!(f.contains("0.2500*iw"));
    }

    #[test]
    fn test_smart_reframe_dynamic_lerps_between_keyframes() {
        let plan = CropPlan::Dynamic {
            keyframes: vec![
                CropKeyframe { time_s: 0.0, x_frac: 0.1 },
                CropKeyframe { time_s: 2.0, x_frac: 0.5 },
                CropKeyframe { time_s: 4.0, x_frac: 0.3 },
            ],
        };
        let VideoFilter::Simple(f) =
            build_crop_filter(CropMode::SmartReframe, Some(&plan), 1080, 1920)
        else {
            panic!("smart reframe is a simple filter");
        };

        // One if() per keyframe interval plus the before-first hold
        assert_eq!(f.matches("if(lt(t").count(), 3);
        assert!(f.contains("0.1000*iw"));
        assert!(f.contains("0.5000"));
        // Clamped inside the frame
        assert!(f.starts_with("crop=ih*9/16:ih:min(max("));
    }

    #[test]
    fn test_smart_reframe_missing_plan_centers() {
        let VideoFilter::Simple(f) =
            build_crop_filter(CropMode::SmartReframe, None, 1080, 1920)
        else {
            panic!();
        };
        assert!(f.contains("0.5000*iw"));
    }
}
