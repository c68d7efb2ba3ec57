use crate::config::SurfaceBox;

use super::params::{ShaderParams, TextureSlot};

const NEAR: f32 = 0.1;

/// Window size in device-independent pixels plus the fixed camera distance.
///
/// Field of view is chosen so that one world unit at `z = 0` covers exactly
/// one pixel of the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub width: f32,
    pub height: f32,
    camera_distance: f32,
    surface: SurfaceBox,
}

impl ViewportState {
    pub fn new(camera_distance: f32, surface: SurfaceBox) -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            camera_distance,
            surface,
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
    }

    pub fn fov_degrees(&self) -> f32 {
        (2.0 * (self.height / 2.0 / self.camera_distance).atan()).to_degrees()
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    fn far(&self) -> f32 {
        (2.0 * self.camera_distance).max(1000.0)
    }

    /// Perspective times view for a camera at `(0, 0, camera_distance)` looking
    /// down `-z`, column-major, wgpu depth range.
    pub fn view_proj(&self) -> [[f32; 4]; 4] {
        let f = 1.0 / (self.fov_degrees().to_radians() / 2.0).tan();
        let far = self.far();
        let d = self.camera_distance;
        let depth = far / (NEAR - far);
        [
            [f / self.aspect(), 0.0, 0.0, 0.0],
            [0.0, f, 0.0, 0.0],
            [0.0, 0.0, depth, -1.0],
            [0.0, 0.0, (NEAR * far - far * d) / (NEAR - far), d],
        ]
    }

    /// Element box in pixels: `(left, top, width, height)`.
    pub fn element_box(&self) -> [f32; 4] {
        [
            self.surface.left * self.width,
            self.surface.top * self.height,
            self.surface.width * self.width,
            self.surface.height * self.height,
        ]
    }

    /// Centre of the element box in camera space (y up, origin mid-window).
    pub fn element_center(&self) -> [f32; 2] {
        let [left, top, w, h] = self.element_box();
        [
            left - self.width / 2.0 + w / 2.0,
            self.height / 2.0 - top - h / 2.0,
        ]
    }

    /// Writes geometry, cover scales and projection for the current size.
    pub fn apply(&self, params: &mut ShaderParams, image_aspects: &[f32]) {
        let [_, _, w, h] = self.element_box();
        let box_aspect = if h > 0.0 { w / h } else { 1.0 };
        let cover_for = |slot: TextureSlot| match slot.index().and_then(|i| image_aspects.get(i)) {
            Some(&aspect) => cover_scale(box_aspect, aspect),
            None => [1.0, 1.0],
        };
        params.geometry.width = w;
        params.geometry.height = h;
        params.geometry.center = self.element_center();
        params.geometry.cover_a = cover_for(params.texture_a);
        params.geometry.cover_b = cover_for(params.texture_b);
        params.view_proj = self.view_proj();
    }
}

/// UV scale that crops an image of `image_aspect` to fill a box of
/// `box_aspect` without stretching.
pub fn cover_scale(box_aspect: f32, image_aspect: f32) -> [f32; 2] {
    if !(box_aspect > 0.0) || !(image_aspect > 0.0) {
        return [1.0, 1.0];
    }
    if image_aspect > box_aspect {
        [box_aspect / image_aspect, 1.0]
    } else {
        [1.0, image_aspect / box_aspect]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> SurfaceBox {
        SurfaceBox {
            left: 0.0,
            top: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }

    fn transform(m: &[[f32; 4]; 4], p: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (col, v) in m.iter().zip(p) {
            for row in 0..4 {
                out[row] += col[row] * v;
            }
        }
        out
    }

    #[test]
    fn fov_matches_height_at_camera_distance() {
        let mut vp = ViewportState::new(800.0, full());
        vp.resize(1600.0, 1600.0);
        assert!((vp.fov_degrees() - 90.0).abs() < 1e-3);
        assert!((vp.aspect() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn projection_maps_pixels_one_to_one() {
        let mut vp = ViewportState::new(800.0, full());
        vp.resize(1280.0, 720.0);
        let m = vp.view_proj();
        let clip = transform(&m, [640.0, 360.0, 0.0, 1.0]);
        assert!((clip[0] / clip[3] - 1.0).abs() < 1e-4);
        assert!((clip[1] / clip[3] - 1.0).abs() < 1e-4);
        let depth = clip[2] / clip[3];
        assert!((0.0..1.0).contains(&depth));
    }

    #[test]
    fn element_center_follows_box() {
        let mut vp = ViewportState::new(
            800.0,
            SurfaceBox {
                left: 0.25,
                top: 0.1,
                width: 0.5,
                height: 0.5,
            },
        );
        vp.resize(1000.0, 800.0);
        assert_eq!(vp.element_box(), [250.0, 80.0, 500.0, 400.0]);
        assert_eq!(vp.element_center(), [0.0, 120.0]);
    }

    #[test]
    fn cover_crops_the_long_side() {
        assert_eq!(cover_scale(1.0, 2.0), [0.5, 1.0]);
        assert_eq!(cover_scale(2.0, 1.0), [1.0, 0.5]);
        assert_eq!(cover_scale(1.5, 1.5), [1.0, 1.0]);
        assert_eq!(cover_scale(0.0, 1.5), [1.0, 1.0]);
    }

    #[test]
    fn blank_slots_are_unscaled() {
        let mut vp = ViewportState::new(800.0, full());
        vp.resize(400.0, 400.0);
        let mut params = ShaderParams::default();
        params.bind(TextureSlot::Blank, TextureSlot::Image(0));
        vp.apply(&mut params, &[2.0]);
        assert_eq!(params.geometry.cover_a, [1.0, 1.0]);
        assert_eq!(params.geometry.cover_b, [0.5, 1.0]);
    }
}
