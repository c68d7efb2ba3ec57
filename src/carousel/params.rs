use palette::LinSrgba;

/// Which texture a shader slot samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureSlot {
    /// Nothing bound yet; the GPU side samples a transparent texel.
    #[default]
    Blank,
    Image(usize),
}

impl TextureSlot {
    pub fn index(self) -> Option<usize> {
        match self {
            Self::Blank => None,
            Self::Image(index) => Some(index),
        }
    }
}

/// Element box and cover-fit factors for both bound textures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub width: f32,
    pub height: f32,
    /// Box centre in camera space.
    pub center: [f32; 2],
    pub cover_a: [f32; 2],
    pub cover_b: [f32; 2],
}

impl Default for SurfaceGeometry {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            center: [0.0, 0.0],
            cover_a: [1.0, 1.0],
            cover_b: [1.0, 1.0],
        }
    }
}

/// Uniform bag handed to the GPU program every frame.
///
/// Only the transition controller and the render loop write `progress`,
/// `elapsed`, `direction` and the texture slots; viewport updates only touch
/// `geometry` and `view_proj`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderParams {
    pub elapsed: f32,
    pub progress: f32,
    pub direction: f32,
    pub texture_a: TextureSlot,
    pub texture_b: TextureSlot,
    pub reveal_active: bool,
    pub geometry: SurfaceGeometry,
    pub view_proj: [[f32; 4]; 4],
    pub background: LinSrgba,
}

impl Default for ShaderParams {
    fn default() -> Self {
        Self {
            elapsed: 0.0,
            progress: 0.0,
            direction: 1.0,
            texture_a: TextureSlot::Blank,
            texture_b: TextureSlot::Blank,
            reveal_active: false,
            geometry: SurfaceGeometry::default(),
            view_proj: IDENTITY,
            background: LinSrgba::new(1.0, 1.0, 1.0, 1.0),
        }
    }
}

const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

impl ShaderParams {
    /// Advances `progress` without ever moving it backwards inside a ramp.
    pub fn raise_progress(&mut self, value: f32) {
        let value = value.clamp(0.0, 1.0);
        if value > self.progress {
            self.progress = value;
        }
    }

    /// Unconditional write, used at transition boundaries and by the debug panel.
    pub fn reset_progress(&mut self, value: f32) {
        self.progress = value.clamp(0.0, 1.0);
    }

    pub fn bind(&mut self, a: TextureSlot, b: TextureSlot) {
        self.texture_a = a;
        self.texture_b = b;
    }
}

/// GPU mirror of [`ShaderParams`]; layout must match `CarouselUniforms` in
/// `carousel.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CarouselUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// center.xy, size.xy
    pub surface: [f32; 4],
    /// cover_a.xy, cover_b.xy
    pub cover: [f32; 4],
    /// time, progress, direction, reveal
    pub params: [f32; 4],
}

impl From<&ShaderParams> for CarouselUniforms {
    fn from(p: &ShaderParams) -> Self {
        let g = &p.geometry;
        Self {
            view_proj: p.view_proj,
            surface: [g.center[0], g.center[1], g.width, g.height],
            cover: [g.cover_a[0], g.cover_a[1], g.cover_b[0], g.cover_b[1]],
            params: [
                p.elapsed,
                p.progress,
                p.direction,
                if p.reveal_active { 1.0 } else { 0.0 },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<CarouselUniforms>(), 112);
    }

    #[test]
    fn progress_only_rises_until_reset() {
        let mut params = ShaderParams::default();
        params.raise_progress(0.4);
        params.raise_progress(0.2);
        assert_eq!(params.progress, 0.4);
        params.raise_progress(1.7);
        assert_eq!(params.progress, 1.0);
        params.reset_progress(0.0);
        assert_eq!(params.progress, 0.0);
    }

    #[test]
    fn uniforms_mirror_params() {
        let mut params = ShaderParams::default();
        params.elapsed = 2.5;
        params.progress = 0.25;
        params.direction = -1.0;
        params.reveal_active = true;
        params.geometry.width = 300.0;
        params.geometry.height = 200.0;
        let u = CarouselUniforms::from(&params);
        assert_eq!(u.params, [2.5, 0.25, -1.0, 1.0]);
        assert_eq!(u.surface, [0.0, 0.0, 300.0, 200.0]);
    }
}
