//! CPU hit-testing against the projected point batch. Shares the projection
//! and pixel-size math with the rasterizer so a hit test agrees with what is
//! on screen.

use acmap_core::style::Shape;

use crate::batch::PointBatch;
use crate::projection::{MapProjector, MarkerPlacement, ViewportMetrics, place_marker};

const TRIANGLE_VERTICES: [[f32; 2]; 3] = [[0.0, 1.0], [0.866, -0.5], [-0.866, -0.5]];

/// Returns the topmost visible point under the cursor (NDC), if any. Ties
/// resolve to the highest draw index. Read-only.
pub fn pick_at(
    batch: &PointBatch,
    projector: &MapProjector,
    metrics: &ViewportMetrics,
    cursor_ndc: [f32; 2],
) -> Option<usize> {
    let cursor_px = metrics.ndc_to_pixels(cursor_ndc);
    let mut hit = None;
    for slot in 0..batch.len() {
        if !batch.visible(slot) {
            continue;
        }
        let Some(placement) = place_marker(projector, batch.position(slot)) else {
            continue;
        };
        let (center, shape_code) = match placement {
            MarkerPlacement::OnScreen(ndc) => (ndc, batch.shape_code(slot)),
            // Edge-parked arrowheads are picked as their drawn shape.
            MarkerPlacement::Clamped { ndc, .. } => (ndc, Shape::Arrowhead.as_code()),
        };
        let center_px = metrics.ndc_to_pixels(center);
        let radius = metrics.effective_pixel_size(batch.size(slot)).pixels * 0.5;
        if radius <= 0.0 {
            continue;
        }
        let aspect = batch.aspect(slot).max(f32::EPSILON);
        // Local frame is y-up, matching the shader's shape frame.
        let local = [
            (cursor_px[0] - center_px[0]) / radius / aspect,
            (center_px[1] - cursor_px[1]) / radius,
        ];
        if shape_hit(shape_code, local) {
            hit = Some(slot);
        }
    }
    hit
}

/// Marquee selection: every visible point whose radius-expanded bounding box
/// overlaps the rectangle spanned by the two NDC corners. Order undefined.
pub fn pick_in_rect(
    batch: &PointBatch,
    projector: &MapProjector,
    metrics: &ViewportMetrics,
    corner_a: [f32; 2],
    corner_b: [f32; 2],
) -> Vec<usize> {
    let a = metrics.ndc_to_pixels(corner_a);
    let b = metrics.ndc_to_pixels(corner_b);
    let min = [a[0].min(b[0]), a[1].min(b[1])];
    let max = [a[0].max(b[0]), a[1].max(b[1])];

    let mut hits = Vec::new();
    for slot in 0..batch.len() {
        if !batch.visible(slot) {
            continue;
        }
        let Some(placement) = place_marker(projector, batch.position(slot)) else {
            continue;
        };
        let center = match placement {
            MarkerPlacement::OnScreen(ndc) => ndc,
            MarkerPlacement::Clamped { ndc, .. } => ndc,
        };
        let center_px = metrics.ndc_to_pixels(center);
        let radius = metrics.effective_pixel_size(batch.size(slot)).pixels * 0.5;
        let rx = radius * batch.aspect(slot).max(f32::EPSILON);
        let overlaps = center_px[0] + rx >= min[0]
            && center_px[0] - rx <= max[0]
            && center_px[1] + radius >= min[1]
            && center_px[1] - radius <= max[1];
        if overlaps {
            hits.push(slot);
        }
    }
    hits
}

/// Shape-specific boundary test in the marker's unit frame. The egg family
/// is picked as a circle of its radius constant; the exact implicit curves
/// stay shader-side.
fn shape_hit(shape_code: f32, local: [f32; 2]) -> bool {
    let code = shape_code as i32;
    let [x, y] = local;
    match code {
        1 => x.abs() <= 1.0 && y.abs() <= 1.0,
        2 | 5 => triangle_hit(local),
        3 | 4 => x * x + y * y <= 1.0,
        _ => x * x + y * y <= 1.0,
    }
}

/// Barycentric containment for the unit triangle (all weights non-negative).
fn triangle_hit(p: [f32; 2]) -> bool {
    let [a, b, c] = TRIANGLE_VERTICES;
    let denom = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    if denom.abs() <= f32::EPSILON {
        return false;
    }
    let w0 = ((b[1] - c[1]) * (p[0] - c[0]) + (c[0] - b[0]) * (p[1] - c[1])) / denom;
    let w1 = ((c[1] - a[1]) * (p[0] - c[0]) + (a[0] - c[0]) * (p[1] - c[1])) / denom;
    let w2 = 1.0 - w0 - w1;
    w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0
}

#[cfg(test)]
mod picking_tests {
    use super::*;
    use acmap_core::style::Shape;
    use winit::dpi::PhysicalSize;

    fn setup(positions: &[[f64; 3]]) -> (PointBatch, MapProjector, ViewportMetrics) {
        let mut batch = PointBatch::allocate(positions.len());
        for (i, &pos) in positions.iter().enumerate() {
            batch.set_position(i, pos[0], pos[1], pos[2]);
            batch.set_size(i, 10.0);
            batch.set_visible(i, true);
        }
        let projector = MapProjector::ortho([0.0, 0.0], 10.0, 1.0);
        let metrics = ViewportMetrics::new(PhysicalSize::new(600, 600), 1.0);
        (batch, projector, metrics)
    }

    #[test]
    fn picking_a_points_center_hits_it() {
        let (batch, projector, metrics) = setup(&[[2.0, -3.0, 0.0]]);
        let ndc = projector.project([2.0, -3.0, 0.0]).expect("projection");
        assert_eq!(pick_at(&batch, &projector, &metrics, ndc), Some(0));
    }

    #[test]
    fn topmost_draw_index_wins_ties() {
        let (batch, projector, metrics) = setup(&[[0.0; 3], [0.0; 3], [0.0; 3]]);
        assert_eq!(pick_at(&batch, &projector, &metrics, [0.0, 0.0]), Some(2));
    }

    #[test]
    fn invisible_points_are_never_picked() {
        let (mut batch, projector, metrics) = setup(&[[0.0; 3], [0.0; 3]]);
        batch.set_visible(1, false);
        assert_eq!(pick_at(&batch, &projector, &metrics, [0.0, 0.0]), Some(0));
        batch.set_visible(0, false);
        assert_eq!(pick_at(&batch, &projector, &metrics, [0.0, 0.0]), None);
    }

    #[test]
    fn misses_outside_the_radius() {
        let (batch, projector, metrics) = setup(&[[0.0; 3]]);
        // 10px point on a 600px viewport: anything a few pixels out misses.
        assert_eq!(pick_at(&batch, &projector, &metrics, [0.1, 0.1]), None);
    }

    #[test]
    fn box_points_accept_their_corners() {
        let (mut batch, projector, metrics) = setup(&[[0.0; 3]]);
        batch.set_shape(0, Shape::Box);
        // A corner of the box is outside the inscribed circle.
        let corner_px = [300.0 + 4.5, 300.0 + 4.5];
        let corner = metrics.pixels_to_ndc(corner_px);
        assert_eq!(pick_at(&batch, &projector, &metrics, corner), Some(0));
        batch.set_shape(0, Shape::Circle);
        assert_eq!(pick_at(&batch, &projector, &metrics, corner), None);
    }

    #[test]
    fn triangle_hits_use_barycentric_containment() {
        let (mut batch, projector, metrics) = setup(&[[0.0; 3]]);
        batch.set_shape(0, Shape::Triangle);
        // Just inside the bottom edge.
        let inside = metrics.pixels_to_ndc([300.0, 300.0 + 2.0]);
        assert_eq!(pick_at(&batch, &projector, &metrics, inside), Some(0));
        // Top corner region, outside the slanted edges.
        let outside = metrics.pixels_to_ndc([300.0 + 4.0, 300.0 - 4.0]);
        assert_eq!(pick_at(&batch, &projector, &metrics, outside), None);
    }

    #[test]
    fn marquee_returns_every_overlapping_point() {
        let (batch, projector, metrics) = setup(&[
            [0.0, 0.0, 0.0],
            [2.0, 2.0, 0.0],
            [-8.0, -8.0, 0.0],
        ]);
        let mut hits = pick_in_rect(&batch, &projector, &metrics, [-0.05, -0.05], [0.3, 0.3]);
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn marquee_skips_invisible_points() {
        let (mut batch, projector, metrics) = setup(&[[0.0; 3], [1.0, 1.0, 0.0]]);
        batch.set_visible(0, false);
        let hits = pick_in_rect(&batch, &projector, &metrics, [-0.5, -0.5], [0.5, 0.5]);
        assert_eq!(hits, vec![1]);
    }
}
