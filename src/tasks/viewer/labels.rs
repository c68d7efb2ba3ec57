use std::path::PathBuf;

use fontdb::{Database, Family, Query};
use glyphon::{
    Attrs, Buffer, Cache, Color, FamilyOwned, FontSystem, Metrics, Resolution, Shaping,
    SwashCache, TextArea, TextAtlas, TextBounds, TextRenderer, Viewport,
};
use palette::{LinSrgba, Srgba};
use tracing::warn;
use winit::dpi::PhysicalSize;

use crate::carousel::LabelSet;

struct Word {
    buffer: Buffer,
    width: f32,
}

/// Caption renderer: every word is its own `glyphon` buffer so it can slide
/// vertically inside a clipped line box.
pub struct LabelRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    _cache: Cache,
    viewport: Viewport,
    atlas: TextAtlas,
    text_renderer: TextRenderer,
    font_system: FontSystem,
    swash_cache: SwashCache,
    font_family: FamilyOwned,
    color: Color,
    words: Vec<Vec<Word>>,
    size: PhysicalSize<u32>,
    font_px: f32,
    line_height: f32,
}

impl LabelRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        labels: &LabelSet,
        image_count: usize,
        font: Option<&str>,
        color: LinSrgba,
    ) -> Self {
        let mut font_system = FontSystem::new();
        initialize_font_database(font_system.db_mut());
        let font_family = resolve_font_family(&font_system, font);

        let cache = Cache::new(device);
        let viewport = Viewport::new(device, &cache);
        let mut atlas = TextAtlas::new(device, queue, &cache, format);
        let text_renderer =
            TextRenderer::new(&mut atlas, device, wgpu::MultisampleState::default(), None);

        let metrics = Metrics::new(32.0, 38.4);
        let words = (0..image_count)
            .map(|index| {
                labels
                    .get(index)
                    .map(|label| {
                        label
                            .words
                            .iter()
                            .map(|_| Word {
                                buffer: Buffer::new(&mut font_system, metrics),
                                width: 0.0,
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();

        let mut renderer = Self {
            device: device.clone(),
            queue: queue.clone(),
            _cache: cache,
            viewport,
            atlas,
            text_renderer,
            font_system,
            swash_cache: SwashCache::new(),
            font_family,
            color: to_text_color(color),
            words,
            size: PhysicalSize::new(0, 0),
            font_px: 32.0,
            line_height: 38.4,
        };
        renderer.shape(labels);
        renderer
    }

    /// Re-derives the font size from the surface and reshapes every word.
    pub fn resize(&mut self, size: PhysicalSize<u32>, labels: &LabelSet) {
        self.size = size;
        self.font_px = caption_font_px(size);
        self.line_height = (self.font_px * 1.2).ceil();
        self.shape(labels);
    }

    fn shape(&mut self, labels: &LabelSet) {
        let metrics = Metrics::new(self.font_px, self.line_height);
        let attrs = Attrs::new().family(self.font_family.as_family());
        for (index, words) in self.words.iter_mut().enumerate() {
            let Some(label) = labels.get(index) else {
                continue;
            };
            for (word, text) in words.iter_mut().zip(&label.words) {
                word.buffer
                    .set_metrics_and_size(&mut self.font_system, metrics, None, None);
                word.buffer
                    .set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);
                word.buffer.shape_until_scroll(&mut self.font_system, false);
                word.width = word
                    .buffer
                    .layout_runs()
                    .map(|run| run.line_w)
                    .fold(0.0, f32::max);
            }
        }
    }

    /// Lays out every visible caption centred under `anchor` (`x`, `top` in
    /// physical pixels) and uploads the glyphs.
    pub fn prepare(&mut self, labels: &LabelSet, anchor: (f32, f32)) {
        if self.size.width == 0 || self.size.height == 0 {
            return;
        }
        self.viewport.update(
            &self.queue,
            Resolution {
                width: self.size.width,
                height: self.size.height,
            },
        );

        let space = self.font_px * 0.3;
        let line_top = anchor.1;
        let line_bottom = line_top + self.line_height;
        let mut areas = Vec::new();
        for (index, label) in labels.visible() {
            let Some(words) = self.words.get(index) else {
                continue;
            };
            let total: f32 = words.iter().map(|w| w.width).sum::<f32>()
                + space * words.len().saturating_sub(1) as f32;
            let mut left = anchor.0 - total / 2.0;
            for (word, offset) in words.iter().zip(&label.offsets) {
                areas.push(TextArea {
                    buffer: &word.buffer,
                    left,
                    top: line_top + offset * self.line_height,
                    scale: 1.0,
                    bounds: TextBounds {
                        left: 0,
                        top: line_top.floor() as i32,
                        right: self.size.width as i32,
                        bottom: line_bottom.ceil() as i32,
                    },
                    default_color: self.color,
                    custom_glyphs: &[],
                });
                left += word.width + space;
            }
        }

        if let Err(err) = self.text_renderer.prepare(
            &self.device,
            &self.queue,
            &mut self.font_system,
            &mut self.atlas,
            &self.viewport,
            areas,
            &mut self.swash_cache,
        ) {
            warn!(error = %err, "label_prepare_failed");
        }
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        if let Err(err) = self.text_renderer.render(&self.atlas, &self.viewport, pass) {
            warn!(error = %err, "label_draw_failed");
        }
    }

    pub fn trim(&mut self) {
        self.atlas.trim();
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }
}

fn caption_font_px(size: PhysicalSize<u32>) -> f32 {
    let min_dim = size.width.min(size.height) as f32;
    (min_dim * 0.045).clamp(16.0, 96.0).round()
}

fn initialize_font_database(db: &mut Database) {
    db.load_system_fonts();
    let bundled_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts");
    if bundled_path.exists() {
        db.load_fonts_dir(&bundled_path);
    }
}

fn resolve_font_family(font_system: &FontSystem, requested: Option<&str>) -> FamilyOwned {
    let db = font_system.db();
    if let Some(name) = requested.map(str::trim).filter(|name| !name.is_empty()) {
        if font_available(db, name) {
            return FamilyOwned::Name(name.into());
        }
        warn!(font = %name, "label_font_missing");
    }
    FamilyOwned::SansSerif
}

fn font_available(db: &Database, name: &str) -> bool {
    let query = Query {
        families: &[Family::Name(name)],
        ..Default::default()
    };
    db.query(&query).is_some()
}

fn to_text_color(color: LinSrgba) -> Color {
    let srgb: Srgba<f32> = Srgba::from_linear(color);
    let srgb_u8: Srgba<u8> = srgb.into_format();
    Color::rgba(srgb_u8.red, srgb_u8.green, srgb_u8.blue, srgb_u8.alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_size_tracks_the_short_side() {
        assert_eq!(caption_font_px(PhysicalSize::new(1920, 1080)), 49.0);
        assert_eq!(caption_font_px(PhysicalSize::new(200, 100)), 16.0);
        assert_eq!(caption_font_px(PhysicalSize::new(8000, 8000)), 96.0);
    }
}
