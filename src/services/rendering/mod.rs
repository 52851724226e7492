use crate::core::config::RenderingConfig;
use crate::core::errors::{RenderError, RenderResult};
use crate::core::types::RenderGroup;
use cosmic_text::{
    Attrs, Buffer, Color as CosmicColor, Family, FontSystem, Metrics, Shaping, SwashCache,
};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use tracing::{debug, info};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const GLYPH_COLOR: CosmicColor = CosmicColor::rgba(0, 0, 0, 255);

/// Glyph canvas renderer using cosmic-text
/// Draws one render group per canvas: white background, black glyphs, one
/// fixed-width cell per character. Rendering is fully synchronous (sync locks,
/// no suspension points) so it can run inline on the dispatch path.
pub struct GlyphRenderer {
    font_system: Mutex<FontSystem>,
    swash_cache: Mutex<SwashCache>,
}

impl GlyphRenderer {
    pub fn new() -> Self {
        info!("Initializing GlyphRenderer (custom fonts only, no system scan)");

        let font_system = Self::create_font_system();
        let swash_cache = SwashCache::new();

        info!("✓ Renderer initialized");

        Self {
            font_system: Mutex::new(font_system),
            swash_cache: Mutex::new(swash_cache),
        }
    }

    /// Create FontSystem with only custom fonts from fonts/ (if present)
    /// This skips system font scanning for faster, reproducible startup.
    /// Site fonts arrive later through `load_site_font`.
    fn create_font_system() -> FontSystem {
        use cosmic_text::fontdb;

        // Empty font database (no system fonts)
        let mut db = fontdb::Database::new();

        // Optional generic fallbacks so degraded rendering still draws shapes
        if let Ok(entries) = std::fs::read_dir("fonts") {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_font = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_lowercase().as_str(), "ttf" | "otf" | "ttc"))
                    .unwrap_or(false);
                if !is_font {
                    continue;
                }
                if let Ok(font_data) = std::fs::read(&path) {
                    db.load_font_data(font_data);
                    debug!("✓ Fallback font: {}", path.display());
                }
            }
        }

        FontSystem::new_with_locale_and_db("en-US".to_string(), db)
    }

    /// Load a downloaded site font into the font database.
    /// Returns the number of faces the data contributed; 0 means the bytes
    /// were not parseable as a font and rendering will degrade.
    pub fn load_site_font(&self, font_data: Vec<u8>) -> usize {
        let mut font_system = self.font_system.lock();
        let before = font_system.db().faces().count();
        font_system.db_mut().load_font_data(font_data);
        let added = font_system.db().faces().count() - before;

        if added > 0 {
            info!("✓ Site font loaded ({} face(s))", added);
        } else {
            debug!("site font bytes contributed no usable faces");
        }
        added
    }

    /// Total faces currently available for shaping
    pub fn faces_loaded(&self) -> usize {
        self.font_system.lock().db().faces().count()
    }

    /// Canvas size for a group of `char_count` glyphs:
    /// width = 2*side_padding + n*font_size + (n-1)*char_margin,
    /// height = ceil(font_size * 1.5)
    pub fn canvas_dimensions(char_count: usize, config: &RenderingConfig) -> (u32, u32) {
        let n = char_count as u32;
        let width = 2 * config.side_padding + n * config.font_size
            + n.saturating_sub(1) * config.char_margin;
        let height = (config.font_size as f32 * 1.5).ceil() as u32;
        (width, height)
    }

    /// Render one group onto a fresh canvas. Each glyph is drawn in its own
    /// `font_size`-wide cell, centered horizontally in the cell and
    /// vertically in the canvas. Glyphs with no face available leave their
    /// cell blank - degraded rendering is the caller's concern, not an error
    /// the renderer can see.
    pub fn render_group(
        &self,
        group: &RenderGroup,
        config: &RenderingConfig,
    ) -> RenderResult<RgbaImage> {
        if group.is_empty() {
            return Err(RenderError::EmptyGroup);
        }

        let (width, height) = Self::canvas_dimensions(group.len(), config);
        let mut canvas = RgbaImage::from_pixel(width, height, WHITE);

        // cosmic-text aborts when asked to shape against an empty font
        // database; the degraded form of that case is a blank canvas
        if self.faces_loaded() == 0 {
            debug!(group = group.index, "no faces loaded, canvas left blank");
            return Ok(canvas);
        }

        let font_size = config.font_size as f32;
        let line_height = font_size * 1.2;
        let cell_top = ((height as f32 - line_height) / 2.0).round() as i32;
        let advance = (config.font_size + config.char_margin) as i32;

        for (i, &ch) in group.chars.iter().enumerate() {
            let cell_left = config.side_padding as i32 + i as i32 * advance;
            self.draw_glyph(
                &mut canvas,
                ch,
                &config.font_family,
                font_size,
                line_height,
                cell_left,
                cell_top,
            );
        }

        debug!(
            group = group.index,
            chars = group.len(),
            width,
            height,
            "group rendered"
        );
        Ok(canvas)
    }

    /// Shape and draw a single glyph centered in its cell
    #[allow(clippy::too_many_arguments)]
    fn draw_glyph(
        &self,
        canvas: &mut RgbaImage,
        ch: char,
        font_family: &str,
        font_size: f32,
        line_height: f32,
        cell_left: i32,
        cell_top: i32,
    ) {
        let text = ch.to_string();
        let metrics = Metrics::new(font_size, line_height);

        let mut font_system = self.font_system.lock();
        let mut buffer = Buffer::new(&mut font_system, metrics);

        let attrs = Attrs::new().family(Family::Name(font_family));
        buffer.set_text(&mut font_system, &text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut font_system, false);

        // Visual glyph width, so the glyph centers in its fixed-width cell
        let glyph_width = buffer
            .layout_runs()
            .flat_map(|run| run.glyphs.iter())
            .map(|g| g.x + g.w)
            .fold(0.0f32, f32::max);
        let x_offset = cell_left + (((font_size - glyph_width) / 2.0).max(0.0)).round() as i32;

        let mut swash_cache = self.swash_cache.lock();
        buffer.draw(
            &mut font_system,
            &mut swash_cache,
            GLYPH_COLOR,
            |px_x, px_y, _w, _h, pixel_color| {
                let img_x = x_offset + px_x;
                let img_y = cell_top + px_y;

                if img_x >= 0
                    && img_x < canvas.width() as i32
                    && img_y >= 0
                    && img_y < canvas.height() as i32
                {
                    let existing = canvas.get_pixel(img_x as u32, img_y as u32);

                    // Alpha blend over the white background
                    let alpha = pixel_color.a() as f32 / 255.0;
                    let inv_alpha = 1.0 - alpha;

                    let blended = Rgba([
                        ((pixel_color.r() as f32 * alpha) + (existing[0] as f32 * inv_alpha)) as u8,
                        ((pixel_color.g() as f32 * alpha) + (existing[1] as f32 * inv_alpha)) as u8,
                        ((pixel_color.b() as f32 * alpha) + (existing[2] as f32 * inv_alpha)) as u8,
                        existing[3].max(pixel_color.a()),
                    ]);

                    canvas.put_pixel(img_x as u32, img_y as u32, blended);
                }
            },
        );
    }
}

impl Default for GlyphRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RenderingConfig {
        RenderingConfig {
            font_size: 40,
            char_margin: 10,
            side_padding: 10,
            font_family: "jjwxcfont".to_string(),
        }
    }

    fn group_of(chars: &[char]) -> RenderGroup {
        RenderGroup::new(0, chars.to_vec())
    }

    #[test]
    fn test_canvas_dimension_formulas() {
        let config = test_config();
        // width = 2*10 + n*40 + (n-1)*10, height = ceil(40 * 1.5)
        assert_eq!(GlyphRenderer::canvas_dimensions(1, &config), (60, 60));
        assert_eq!(GlyphRenderer::canvas_dimensions(2, &config), (110, 60));
        assert_eq!(GlyphRenderer::canvas_dimensions(3, &config), (160, 60));
        assert_eq!(GlyphRenderer::canvas_dimensions(4, &config), (210, 60));
    }

    #[test]
    fn test_canvas_height_ceils_fractional_sizes() {
        let mut config = test_config();
        config.font_size = 25; // 25 * 1.5 = 37.5 -> 38
        let (_, height) = GlyphRenderer::canvas_dimensions(2, &config);
        assert_eq!(height, 38);
    }

    #[test]
    fn test_render_rejects_empty_group() {
        let renderer = GlyphRenderer::new();
        let result = renderer.render_group(&group_of(&[]), &test_config());
        assert!(matches!(result, Err(RenderError::EmptyGroup)));
    }

    #[test]
    fn test_render_without_fonts_yields_white_canvas() {
        // A fresh renderer holds zero faces (no fonts/ directory in the
        // repo); rendering must not reach the shaper and the canvas
        // geometry and background must still hold
        let renderer = GlyphRenderer::new();
        assert_eq!(renderer.faces_loaded(), 0);

        let canvas = renderer
            .render_group(&group_of(&['\u{E001}', '\u{E002}', '\u{E003}']), &test_config())
            .unwrap();

        assert_eq!(canvas.width(), 160);
        assert_eq!(canvas.height(), 60);
        assert!(canvas.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn test_load_site_font_rejects_garbage_bytes() {
        let renderer = GlyphRenderer::new();
        let added = renderer.load_site_font(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(added, 0);
    }
}
