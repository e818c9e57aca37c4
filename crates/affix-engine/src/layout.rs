//! Canvas planning: how big the output is and where each image lands.
//!
//! [`plan`] runs once on natural (unscaled) sizes so the caller can show a
//! proposed size. [`arrange`] rebuilds the geometry at the chosen
//! [`RenderScale`] and yields one destination [`Slot`] per image.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlanError;
use crate::geometry::{Dimensions, RenderScale, ScalePolicy, Spacing, StackAxis};

/// Agreed natural output size before a render scale is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasPlan {
    pub width: u32,
    pub height: u32,
    pub axis: StackAxis,
    pub policy: ScalePolicy,
    /// Cross-axis extent every image is scaled to (spacing excluded).
    pub cross_extent: u32,
}

impl CanvasPlan {
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Preview width at `scale`, truncated.
    pub fn width_at(&self, scale: RenderScale) -> u32 {
        scale.apply(self.width)
    }

    /// Preview height at `scale`, truncated.
    pub fn height_at(&self, scale: RenderScale) -> u32 {
        scale.apply(self.height)
    }
}

/// Destination rectangle of one image on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub x: u32,
    pub y: u32,
    pub size: Dimensions,
}

/// Canvas size and per-image placement at a concrete render scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrangement {
    pub canvas: Dimensions,
    pub slots: Vec<Slot>,
}

/// Plan the natural output canvas for `sizes` stacked along `axis`.
pub fn plan(
    sizes: &[Dimensions],
    axis: StackAxis,
    policy: ScalePolicy,
    spacing: Spacing,
) -> Result<CanvasPlan, PlanError> {
    if sizes.is_empty() {
        return Err(PlanError::DegenerateImage(0));
    }
    if let Some(index) = sizes.iter().position(Dimensions::is_degenerate) {
        return Err(PlanError::DegenerateImage(index));
    }

    let crosses = sizes.iter().map(|s| s.cross(axis));
    let extreme = match policy {
        ScalePolicy::ScaleToLargest => crosses.max(),
        ScalePolicy::ScaleToSmallest => crosses.min(),
    }
    .unwrap_or(0);

    let along_sum: u64 = sizes
        .iter()
        .map(|&size| u64::from(scaled_along(size, axis, extreme)))
        .sum();
    let along = along_sum + u64::from(spacing.along(axis)) * (sizes.len() as u64 + 1);
    let cross = u64::from(extreme) + u64::from(spacing.cross(axis)) * 2;

    let canvas = to_dimensions(axis, along, cross)?;
    debug!(
        count = sizes.len(),
        ?axis,
        ?policy,
        extreme,
        width = canvas.width,
        height = canvas.height,
        "Planned natural canvas"
    );

    Ok(CanvasPlan {
        width: canvas.width,
        height: canvas.height,
        axis,
        policy,
        cross_extent: extreme,
    })
}

/// Place every image on the canvas at `scale`.
///
/// The canvas is always the preview size, `plan.width_at(scale)` by
/// `plan.height_at(scale)`. Slot edges are the natural layout's edges
/// multiplied by `scale` and truncated, so slots never overlap and never
/// leave the canvas; any rounding shows up as one-pixel variation in the gaps.
pub fn arrange(
    sizes: &[Dimensions],
    plan: &CanvasPlan,
    scale: RenderScale,
    spacing: Spacing,
) -> Result<Arrangement, PlanError> {
    if let Some(index) = sizes.iter().position(Dimensions::is_degenerate) {
        return Err(PlanError::DegenerateImage(index));
    }

    let axis = plan.axis;
    let canvas = Dimensions::new(
        plan.width_at(scale).max(1),
        plan.height_at(scale).max(1),
    );

    let gap_cross = spacing.cross(axis);
    let cross_end = gap_cross
        .checked_add(plan.cross_extent)
        .ok_or(PlanError::Overflow)?;
    let cross_start = scale.apply(gap_cross);
    let cross = (scale.apply(cross_end) - cross_start).max(1);

    let gap_along = u64::from(spacing.along(axis));
    let mut slots = Vec::with_capacity(sizes.len());
    let mut cursor: u64 = 0;
    for &size in sizes {
        let start = cursor + gap_along;
        let end = start + u64::from(scaled_along(size, axis, plan.cross_extent));
        let start_at = scale.apply(u32::try_from(start).map_err(|_| PlanError::Overflow)?);
        let end_at = scale.apply(u32::try_from(end).map_err(|_| PlanError::Overflow)?);
        let (x, y) = match axis {
            StackAxis::Horizontal => (start_at, cross_start),
            StackAxis::Vertical => (cross_start, start_at),
        };
        slots.push(Slot {
            x,
            y,
            size: Dimensions::from_axes(axis, (end_at - start_at).max(1), cross),
        });
        cursor = end;
    }

    debug!(
        scale = scale.get(),
        width = canvas.width,
        height = canvas.height,
        "Arranged canvas"
    );

    Ok(Arrangement { canvas, slots })
}

/// Along-axis extent of `native` once its cross extent is forced to `cross`.
///
/// Aspect ratio is preserved; the result is rounded and never below 1.
pub fn scaled_along(native: Dimensions, axis: StackAxis, cross: u32) -> u32 {
    let native_cross = native.cross(axis);
    if native_cross == 0 {
        return 1;
    }
    let ratio = f64::from(native.along(axis)) / f64::from(native_cross);
    let along = (f64::from(cross) * ratio).round();
    if along >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        (along as u32).max(1)
    }
}

fn to_dimensions(axis: StackAxis, along: u64, cross: u64) -> Result<Dimensions, PlanError> {
    let along = u32::try_from(along).map_err(|_| PlanError::Overflow)?;
    let cross = u32::try_from(cross).map_err(|_| PlanError::Overflow)?;
    if along == 0 || cross == 0 {
        return Err(PlanError::ZeroExtent);
    }
    Ok(Dimensions::from_axes(axis, along, cross))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(list: &[(u32, u32)]) -> Vec<Dimensions> {
        list.iter().map(|&(w, h)| Dimensions::new(w, h)).collect()
    }

    #[test]
    fn horizontal_scale_to_largest() {
        let plan = plan(
            &sizes(&[(100, 200), (300, 200)]),
            StackAxis::Horizontal,
            ScalePolicy::ScaleToLargest,
            Spacing::new(10, 5),
        )
        .unwrap();
        assert_eq!((plan.width, plan.height), (430, 210));
        assert_eq!(plan.cross_extent, 200);
    }

    #[test]
    fn policies_coincide_for_equal_heights() {
        let plan = plan(
            &sizes(&[(100, 200), (300, 200)]),
            StackAxis::Horizontal,
            ScalePolicy::ScaleToSmallest,
            Spacing::new(10, 5),
        )
        .unwrap();
        assert_eq!((plan.width, plan.height), (430, 210));
    }

    #[test]
    fn horizontal_scale_to_smallest_shrinks_taller_image() {
        let plan = plan(
            &sizes(&[(100, 100), (300, 200)]),
            StackAxis::Horizontal,
            ScalePolicy::ScaleToSmallest,
            Spacing::new(10, 5),
        )
        .unwrap();
        assert_eq!((plan.width, plan.height), (280, 110));
    }

    #[test]
    fn vertical_scale_to_largest_widens_narrow_image() {
        // 100x50 is widened to 400x200.
        let plan = plan(
            &sizes(&[(100, 50), (400, 300)]),
            StackAxis::Vertical,
            ScalePolicy::ScaleToLargest,
            Spacing::new(4, 6),
        )
        .unwrap();
        assert_eq!(plan.width, 400 + 8);
        assert_eq!(plan.height, 200 + 300 + 18);
    }

    #[test]
    fn zero_width_probe_is_degenerate() {
        let err = plan(
            &sizes(&[(100, 100), (0, 150)]),
            StackAxis::Horizontal,
            ScalePolicy::ScaleToLargest,
            Spacing::default(),
        )
        .unwrap_err();
        assert_eq!(err, PlanError::DegenerateImage(1));
    }

    #[test]
    fn empty_input_is_degenerate() {
        let err = plan(
            &[],
            StackAxis::Vertical,
            ScalePolicy::ScaleToLargest,
            Spacing::default(),
        )
        .unwrap_err();
        assert_eq!(err, PlanError::DegenerateImage(0));
    }

    #[test]
    fn oversized_canvas_overflows() {
        let err = plan(
            &sizes(&[(u32::MAX, 10), (u32::MAX, 10)]),
            StackAxis::Horizontal,
            ScalePolicy::ScaleToLargest,
            Spacing::default(),
        )
        .unwrap_err();
        assert_eq!(err, PlanError::Overflow);
    }

    #[test]
    fn plan_is_deterministic() {
        let input = sizes(&[(640, 480), (1024, 768), (333, 999)]);
        let first = plan(
            &input,
            StackAxis::Vertical,
            ScalePolicy::ScaleToSmallest,
            Spacing::new(3, 7),
        );
        for _ in 0..10 {
            let again = plan(
                &input,
                StackAxis::Vertical,
                ScalePolicy::ScaleToSmallest,
                Spacing::new(3, 7),
            );
            assert_eq!(again, first);
        }
    }

    #[test]
    fn sum_invariant_holds_along_stack_axis() {
        let input = sizes(&[(640, 480), (1024, 768), (333, 999), (17, 23)]);
        for axis in [StackAxis::Horizontal, StackAxis::Vertical] {
            for policy in [ScalePolicy::ScaleToLargest, ScalePolicy::ScaleToSmallest] {
                let spacing = Spacing::new(11, 13);
                let plan = plan(&input, axis, policy, spacing).unwrap();
                let sum: u32 = input
                    .iter()
                    .map(|&s| scaled_along(s, axis, plan.cross_extent))
                    .sum();
                let expected = sum + spacing.along(axis) * (input.len() as u32 + 1);
                assert_eq!(plan.dimensions().along(axis), expected);
            }
        }
    }

    #[test]
    fn arrange_at_full_scale_matches_plan() {
        let input = sizes(&[(640, 480), (1024, 768), (333, 999)]);
        for axis in [StackAxis::Horizontal, StackAxis::Vertical] {
            for policy in [ScalePolicy::ScaleToLargest, ScalePolicy::ScaleToSmallest] {
                let spacing = Spacing::new(9, 4);
                let plan = plan(&input, axis, policy, spacing).unwrap();
                let arrangement = arrange(&input, &plan, RenderScale::FULL, spacing).unwrap();
                assert_eq!(arrangement.canvas, plan.dimensions());
            }
        }
    }

    #[test]
    fn arrange_places_images_with_leading_gap() {
        let input = sizes(&[(100, 200), (300, 200)]);
        let spacing = Spacing::new(10, 5);
        let plan = plan(
            &input,
            StackAxis::Horizontal,
            ScalePolicy::ScaleToLargest,
            spacing,
        )
        .unwrap();
        let arrangement = arrange(&input, &plan, RenderScale::FULL, spacing).unwrap();
        assert_eq!(
            arrangement.slots,
            vec![
                Slot {
                    x: 10,
                    y: 5,
                    size: Dimensions::new(100, 200)
                },
                Slot {
                    x: 120,
                    y: 5,
                    size: Dimensions::new(300, 200)
                },
            ]
        );
    }

    #[test]
    fn cross_extent_invariant_at_scale() {
        let input = sizes(&[(120, 90), (400, 300), (50, 75)]);
        let scale = RenderScale::new(0.5).unwrap();
        for policy in [ScalePolicy::ScaleToLargest, ScalePolicy::ScaleToSmallest] {
            let plan = plan(&input, StackAxis::Horizontal, policy, Spacing::default()).unwrap();
            let arrangement = arrange(&input, &plan, scale, Spacing::default()).unwrap();
            let expected = match policy {
                ScalePolicy::ScaleToLargest => 300 / 2,
                ScalePolicy::ScaleToSmallest => 75 / 2,
            };
            for slot in &arrangement.slots {
                assert_eq!(slot.size.height, expected);
            }
        }
    }

    #[test]
    fn arranged_slots_track_scaled_natural_sizes() {
        let input = sizes(&[(640, 480), (1024, 768), (333, 999), (17, 23), (4000, 3)]);
        for axis in [StackAxis::Horizontal, StackAxis::Vertical] {
            let plan = plan(&input, axis, ScalePolicy::ScaleToLargest, Spacing::new(2, 2)).unwrap();
            for raw in [0.1, 0.33, 0.75, 1.0] {
                let scale = RenderScale::new(raw).unwrap();
                let arrangement = arrange(&input, &plan, scale, Spacing::new(2, 2)).unwrap();
                let exact_cross = f64::from(plan.cross_extent) * scale.get();
                for (native, slot) in input.iter().zip(&arrangement.slots) {
                    let natural = scaled_along(*native, axis, plan.cross_extent);
                    let exact = f64::from(natural) * scale.get();
                    let drawn = f64::from(slot.size.along(axis));
                    assert!(
                        (drawn - exact).abs() <= 1.0,
                        "{native} drawn at {} (exact {exact})",
                        slot.size
                    );
                    assert!((f64::from(slot.size.cross(axis)) - exact_cross).abs() <= 1.0);
                }
            }
        }
    }

    #[test]
    fn arranged_canvas_is_the_preview_size() {
        let input = sizes(&[(640, 480), (1024, 768), (333, 999)]);
        let spacing = Spacing::new(15, 8);
        for axis in [StackAxis::Horizontal, StackAxis::Vertical] {
            let plan = plan(&input, axis, ScalePolicy::ScaleToSmallest, spacing).unwrap();
            for raw in [0.1, 0.27, 0.5, 0.77, 0.99] {
                let scale = RenderScale::new(raw).unwrap();
                let arrangement = arrange(&input, &plan, scale, spacing).unwrap();
                assert_eq!(
                    arrangement.canvas,
                    Dimensions::new(plan.width_at(scale), plan.height_at(scale))
                );

                let mut previous_end = 0;
                for slot in &arrangement.slots {
                    let (start, cross_start) = match axis {
                        StackAxis::Horizontal => (slot.x, slot.y),
                        StackAxis::Vertical => (slot.y, slot.x),
                    };
                    assert!(start >= previous_end, "slots overlap at {raw}");
                    previous_end = start + slot.size.along(axis);
                    assert!(cross_start + slot.size.cross(axis) <= arrangement.canvas.cross(axis));
                }
                assert!(previous_end <= arrangement.canvas.along(axis));
            }
        }
    }

    #[test]
    fn half_scale_matches_preview_for_mixed_heights() {
        let input = sizes(&[(100, 100), (300, 200)]);
        let spacing = Spacing::new(10, 5);
        let plan = plan(
            &input,
            StackAxis::Horizontal,
            ScalePolicy::ScaleToSmallest,
            spacing,
        )
        .unwrap();
        let scale = RenderScale::new(0.5).unwrap();
        let arrangement = arrange(&input, &plan, scale, spacing).unwrap();
        assert_eq!(arrangement.canvas, Dimensions::new(140, 55));
        assert_eq!(
            arrangement.slots,
            vec![
                Slot {
                    x: 5,
                    y: 2,
                    size: Dimensions::new(50, 50)
                },
                Slot {
                    x: 60,
                    y: 2,
                    size: Dimensions::new(75, 50)
                },
            ]
        );
    }

    #[test]
    fn preview_size_truncates() {
        let plan = CanvasPlan {
            width: 431,
            height: 211,
            axis: StackAxis::Horizontal,
            policy: ScalePolicy::ScaleToLargest,
            cross_extent: 201,
        };
        let scale = RenderScale::new(0.5).unwrap();
        assert_eq!((plan.width_at(scale), plan.height_at(scale)), (215, 105));
    }
}
