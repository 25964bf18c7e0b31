use glam::{Mat4, Vec4};
use winit::dpi::PhysicalSize;

/// Viewport height at which a point's base size maps 1:1 to pixels.
pub const REFERENCE_VIEWPORT_HEIGHT: f32 = 600.0;

/// NDC margin inside which off-screen points are parked as arrowheads.
pub const EDGE_MARGIN: f32 = 0.04;

pub const DEFAULT_GLOBAL_SCALE: f32 = 1.0;
pub const DEFAULT_MAX_POINT_SIZE: f32 = 64.0;

/// World-to-NDC projection handed in by the scene/camera collaborator. The
/// point engine never looks inside the matrix; it only projects through it.
#[derive(Debug, Clone)]
pub struct MapProjector {
    view_projection: Mat4,
    /// Camera roll in radians, added to arrowhead rotations by the shader.
    scene_rotation: f32,
}

impl MapProjector {
    pub fn new(view_projection: Mat4, scene_rotation: f32) -> Self {
        Self {
            view_projection,
            scene_rotation,
        }
    }

    /// Orthographic projector framing a square region of the map plane,
    /// the default camera for 2D maps.
    pub fn ortho(center: [f32; 2], half_extent: f32, aspect_ratio: f32) -> Self {
        let half_w = half_extent * aspect_ratio.max(f32::EPSILON);
        let projection = Mat4::orthographic_rh(
            center[0] - half_w,
            center[0] + half_w,
            center[1] - half_extent,
            center[1] + half_extent,
            -10.0,
            10.0,
        );
        Self::new(projection, 0.0)
    }

    pub fn scene_rotation(&self) -> f32 {
        self.scene_rotation
    }

    /// Projects a world position to normalized device coordinates. Positions
    /// behind the camera or with non-finite results are rejected; positions
    /// outside [-1, 1] are returned as-is so callers can clamp them.
    pub fn project(&self, position: [f64; 3]) -> Option<[f32; 2]> {
        let clip = self.view_projection
            * Vec4::new(position[0] as f32, position[1] as f32, position[2] as f32, 1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if !ndc.x.is_finite() || !ndc.y.is_finite() {
            return None;
        }
        Some([ndc.x, ndc.y])
    }
}

/// Screen-space placement of one marker: either at its projected position or
/// parked at the viewport edge as an inward-pointing arrowhead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerPlacement {
    OnScreen([f32; 2]),
    Clamped { ndc: [f32; 2], rotation: f32 },
}

/// Clamps an out-of-frustum projection to the viewport edge. The returned
/// rotation is the screen-space angle toward the plot center, minus the
/// scene rotation the shader adds back for arrowheads.
pub fn place_marker(projector: &MapProjector, position: [f64; 3]) -> Option<MarkerPlacement> {
    let ndc = projector.project(position)?;
    let limit = 1.0 - EDGE_MARGIN;
    if ndc[0].abs() <= limit && ndc[1].abs() <= limit {
        return Some(MarkerPlacement::OnScreen(ndc));
    }
    let clamped = [ndc[0].clamp(-limit, limit), ndc[1].clamp(-limit, limit)];
    let rotation = (-clamped[1]).atan2(-clamped[0]) - projector.scene_rotation();
    Some(MarkerPlacement::Clamped {
        ndc: clamped,
        rotation,
    })
}

/// Pixel-space size of one drawn point, after the max-size rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSize {
    pub pixels: f32,
    /// Set when the raw size exceeded the maximum and was halved, flipping
    /// the rasterizer into centered sampling.
    pub halved: bool,
}

/// Viewport metrics shared by the vertex shader and the picking engine. The
/// two must agree exactly, so the formula lives here and the WGSL mirrors it.
#[derive(Debug, Clone, Copy)]
pub struct ViewportMetrics {
    pub size: PhysicalSize<u32>,
    pub pixel_ratio: f32,
    pub global_scale: f32,
    pub max_point_size: f32,
}

impl ViewportMetrics {
    pub fn new(size: PhysicalSize<u32>, pixel_ratio: f32) -> Self {
        Self {
            size,
            pixel_ratio,
            global_scale: DEFAULT_GLOBAL_SCALE,
            max_point_size: DEFAULT_MAX_POINT_SIZE,
        }
    }

    pub fn height_factor(&self) -> f32 {
        self.size.height.max(1) as f32 / REFERENCE_VIEWPORT_HEIGHT
    }

    /// On-screen size of a point. Sizes past the maximum are halved, not
    /// clamped: the discontinuity is intentional, matching the sprite-size
    /// fallback the map format was authored against.
    pub fn effective_pixel_size(&self, base_size: f32) -> PixelSize {
        let raw = base_size * self.global_scale * self.height_factor() * self.pixel_ratio;
        if raw > self.max_point_size {
            PixelSize {
                pixels: raw * 0.5,
                halved: true,
            }
        } else {
            PixelSize {
                pixels: raw,
                halved: false,
            }
        }
    }

    pub fn ndc_to_pixels(&self, ndc: [f32; 2]) -> [f32; 2] {
        let width = self.size.width.max(1) as f32;
        let height = self.size.height.max(1) as f32;
        [
            (ndc[0] + 1.0) * 0.5 * width,
            (1.0 - ndc[1]) * 0.5 * height,
        ]
    }

    pub fn pixels_to_ndc(&self, pixels: [f32; 2]) -> [f32; 2] {
        let width = self.size.width.max(1) as f32;
        let height = self.size.height.max(1) as f32;
        [
            pixels[0] / width * 2.0 - 1.0,
            1.0 - pixels[1] / height * 2.0,
        ]
    }
}

#[cfg(test)]
mod projector_tests {
    use super::*;

    #[test]
    fn ortho_projector_centers_the_frame() {
        let projector = MapProjector::ortho([0.0, 0.0], 10.0, 1.0);
        assert_eq!(projector.project([0.0, 0.0, 0.0]), Some([0.0, 0.0]));
        let right = projector.project([10.0, 0.0, 0.0]).expect("projection");
        assert!((right[0] - 1.0).abs() < 1e-6);
        assert!(right[1].abs() < 1e-6);
    }

    #[test]
    fn on_screen_points_are_not_clamped() {
        let projector = MapProjector::ortho([0.0, 0.0], 10.0, 1.0);
        match place_marker(&projector, [1.0, 2.0, 0.0]).expect("placement") {
            MarkerPlacement::OnScreen(ndc) => {
                assert!((ndc[0] - 0.1).abs() < 1e-6);
                assert!((ndc[1] - 0.2).abs() < 1e-6);
            }
            other => panic!("expected on-screen placement, got {other:?}"),
        }
    }

    #[test]
    fn far_points_park_at_the_edge_pointing_inward() {
        let projector = MapProjector::ortho([0.0, 0.0], 10.0, 1.0);
        match place_marker(&projector, [50.0, 0.0, 0.0]).expect("placement") {
            MarkerPlacement::Clamped { ndc, rotation } => {
                assert!((ndc[0] - (1.0 - EDGE_MARGIN)).abs() < 1e-6);
                // The arrow sits on the right edge and points back along -x.
                assert!((rotation.abs() - std::f32::consts::PI).abs() < 1e-4);
            }
            other => panic!("expected clamped placement, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod metrics_tests {
    use super::*;

    fn metrics() -> ViewportMetrics {
        ViewportMetrics::new(PhysicalSize::new(800, 600), 1.0)
    }

    #[test]
    fn base_size_maps_straight_to_pixels_at_reference_height() {
        let size = metrics().effective_pixel_size(10.0);
        assert_eq!(size.pixels, 10.0);
        assert!(!size.halved);
    }

    #[test]
    fn oversized_points_are_halved_not_clamped() {
        let m = metrics();
        let just_under = m.effective_pixel_size(64.0);
        assert_eq!(just_under.pixels, 64.0);
        assert!(!just_under.halved);

        let over = m.effective_pixel_size(65.0);
        assert_eq!(over.pixels, 32.5);
        assert!(over.halved);
    }

    #[test]
    fn ndc_pixel_round_trip() {
        let m = metrics();
        let px = m.ndc_to_pixels([0.0, 0.0]);
        assert_eq!(px, [400.0, 300.0]);
        let ndc = m.pixels_to_ndc(px);
        assert!(ndc[0].abs() < 1e-6 && ndc[1].abs() < 1e-6);
        assert_eq!(m.ndc_to_pixels([-1.0, 1.0]), [0.0, 0.0]);
    }
}
