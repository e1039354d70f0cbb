use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size, Blend};

/// DejaVu Sans; license in `assets/DejaVuSans-LICENSE.txt`.
static EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// TrueType face used for chart labels.
#[derive(Clone)]
pub struct ChartFont {
    font: FontArc,
}

impl std::fmt::Debug for ChartFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChartFont")
    }
}

impl ChartFont {
    pub fn embedded() -> Result<Self> {
        let font = FontArc::try_from_slice(EMBEDDED_FONT)
            .context("embedded chart font is not a usable TrueType face")?;
        Ok(Self { font })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("cannot read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .with_context(|| format!("{} is not a usable font", path.display()))?;
        Ok(Self { font })
    }

    /// The `configured` face when it loads, the embedded one otherwise.
    pub fn load(configured: Option<&str>) -> Result<Self> {
        if let Some(path) = configured {
            match Self::from_path(Path::new(path)) {
                Ok(font) => {
                    tracing::info!("[ChartFont::load] using {}", path);
                    return Ok(font);
                }
                Err(e) => tracing::warn!("[ChartFont::load] {:#}, using the embedded font", e),
            }
        }
        Self::embedded()
    }

    /// Width and height in pixels of `text` drawn at `height` px.
    pub fn measure(&self, text: &str, height: u32) -> (u32, u32) {
        text_size(PxScale::from(height as f32), &self.font, text)
    }

    pub fn draw(&self, canvas: &mut Blend<RgbaImage>, color: Rgba<u8>, x: i32, y: i32, height: u32, text: &str) {
        draw_text_mut(canvas, color, x, y, PxScale::from(height as f32), &self.font, text);
    }
}
