use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::catalog::ClassCatalog;
use crate::error::{DetectError, Result};
use crate::models::Detection;

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_PADDING: i32 = 3;
/// Labels never start closer than this to the top of the image.
const LABEL_TOP_MARGIN: i32 = 10;

/// Load the first usable font from a few well-known system locations.
pub fn load_system_font() -> Option<FontVec> {
    let font_paths = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/System/Library/Fonts/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];

    for path in &font_paths {
        if let Ok(font) = load_font(path) {
            debug!("Loaded label font from {}", path);
            return Some(font);
        }
    }

    debug!("No system font found, labels will be drawn without text");
    None
}

pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontVec> {
    let data = std::fs::read(path.as_ref())?;
    FontVec::try_from_vec(data).map_err(|e| {
        DetectError::InvalidConfig(format!("invalid font {}: {}", path.as_ref().display(), e))
    })
}

/// Draws detection boxes and labels onto a copy of an image.
pub struct Renderer {
    catalog: Arc<ClassCatalog>,
    font: Option<FontVec>,
    pub font_size: f32,
    pub thickness: u32,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("classes", &self.catalog.len())
            .field("has_font", &self.font.is_some())
            .field("font_size", &self.font_size)
            .field("thickness", &self.thickness)
            .finish()
    }
}

impl Renderer {
    pub fn new(catalog: Arc<ClassCatalog>) -> Self {
        Self {
            catalog,
            font: None,
            font_size: 16.0,
            thickness: 2,
        }
    }

    pub fn with_font(mut self, font: Option<FontVec>) -> Self {
        self.font = font;
        self
    }

    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.thickness = thickness.max(1);
        self
    }

    /// Render `detections` in order. The input image is never modified.
    pub fn render(&self, img: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut output = img.clone();
        if detections.is_empty() {
            return output;
        }

        for detection in detections {
            self.draw_detection(&mut output, detection);
        }

        debug!("Rendered {} detections", detections.len());
        output
    }

    fn draw_detection(&self, img: &mut RgbImage, detection: &Detection) {
        let (img_w, img_h) = (img.width() as i32, img.height() as i32);
        if img_w == 0 || img_h == 0 {
            return;
        }

        let color = Rgb(self.catalog.color(detection.class_id));

        let x1 = (detection.bbox.x1 as i32).clamp(0, img_w - 1);
        let y1 = (detection.bbox.y1 as i32).clamp(0, img_h - 1);
        let x2 = (detection.bbox.x2 as i32).clamp(x1, img_w - 1);
        let y2 = (detection.bbox.y2 as i32).clamp(y1, img_h - 1);

        for t in 0..self.thickness as i32 {
            let w = x2 - x1 + 1 - 2 * t;
            let h = y2 - y1 + 1 - 2 * t;
            if w <= 0 || h <= 0 {
                break;
            }
            draw_hollow_rect_mut(img, Rect::at(x1 + t, y1 + t).of_size(w as u32, h as u32), color);
        }

        let label = format!(
            "{}: {:.2}",
            self.catalog.name(detection.class_id),
            detection.confidence
        );

        let (text_w, text_h) = match &self.font {
            Some(font) => {
                let (w, h) = text_size(self.font_size, font, &label);
                (w as i32, h as i32)
            }
            None => (
                (label.len() as f32 * self.font_size * 0.5) as i32,
                self.font_size as i32,
            ),
        };

        let label_w = text_w + 2 * LABEL_PADDING;
        let label_h = text_h + 2 * LABEL_PADDING;

        // Above the box unless that would crowd the top edge; then inside it.
        let label_y = if y1 - label_h > LABEL_TOP_MARGIN {
            y1 - label_h
        } else {
            y1
        };

        let rect_w = label_w.min(img_w - x1);
        let rect_h = label_h.min(img_h - label_y);
        if rect_w <= 0 || rect_h <= 0 {
            return;
        }

        draw_filled_rect_mut(
            img,
            Rect::at(x1, label_y).of_size(rect_w as u32, rect_h as u32),
            color,
        );

        if let Some(font) = &self.font {
            draw_text_mut(
                img,
                TEXT_COLOR,
                x1 + LABEL_PADDING,
                label_y + LABEL_PADDING,
                self.font_size,
                font,
                &label,
            );
        }
    }
}
