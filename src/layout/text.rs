//! Text faces, word wrap and automatic font sizing.
//!
//! ## Faces
//!
//! | Face | Source | Cell at size `s` |
//! |------|--------|------------------|
//! | Spleen (built in) | 6×12 face below 24 px, 12×24 face from 24 px | `s/2` × `s`, nearest-neighbour scaled |
//! | TrueType/OpenType | font file given by path | proportional, glyphs thresholded at 50 % coverage |
//!
//! ## Sizing
//!
//! [`fit_text`] walks sizes downward from the preferred size (or the box
//! height) to [`MIN_FONT_SIZE`] and returns the first size whose wrapped
//! lines fit the box. Lines are separated by [`LINE_GAP`] dots.

use ab_glyph::{Font, FontArc, ScaleFont, point};
use serde::Serialize;
use spleen_font::{FONT_6X12, FONT_12X24, PSF2Font};

use crate::raster::{Bitmap, Canvas};

/// Smallest font size tried by the auto-sizer (px)
pub const MIN_FONT_SIZE: usize = 6;

/// Vertical gap between wrapped lines (dots)
pub const LINE_GAP: usize = 2;

/// Coverage above which a TrueType pixel is inked
const COVERAGE_THRESHOLD: f32 = 0.5;

/// Name that selects the built-in face explicitly
pub const BUILTIN_FACE: &str = "spleen";

/// Size from which the 12×24 Spleen face replaces the 6×12 one (px)
const SPLEEN_LARGE_FROM: usize = 24;

/// One built-in bitmap face and the sizes it is drawn at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontInfo {
    /// Name accepted by [`Typeface::load`]
    pub name: &'static str,
    pub variant: &'static str,
    pub cell_width: usize,
    pub cell_height: usize,
    pub min_size: usize,
    /// Unbounded when `None`
    pub max_size: Option<usize>,
}

/// A text face at any pixel size.
#[derive(Clone)]
pub enum Typeface {
    Spleen,
    TrueType(FontArc),
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Typeface::Spleen => write!(f, "Spleen"),
            Typeface::TrueType(_) => write!(f, "TrueType"),
        }
    }
}

impl Typeface {
    /// Built-in faces, smallest first.
    ///
    /// Any other name given to [`Typeface::load`] is a TrueType/OpenType
    /// file path.
    pub fn available() -> Vec<FontInfo> {
        vec![
            FontInfo {
                name: BUILTIN_FACE,
                variant: "6x12",
                cell_width: 6,
                cell_height: 12,
                min_size: MIN_FONT_SIZE,
                max_size: Some(SPLEEN_LARGE_FROM - 1),
            },
            FontInfo {
                name: BUILTIN_FACE,
                variant: "12x24",
                cell_width: 12,
                cell_height: 24,
                min_size: SPLEEN_LARGE_FROM,
                max_size: None,
            },
        ]
    }

    /// Resolve a font name: `None` or `"spleen"` is the built-in face,
    /// anything else is read as a font file path.
    ///
    /// A file that cannot be read or parsed falls back to the built-in face.
    pub fn load(name: Option<&str>) -> Self {
        let Some(path) = name.filter(|n| !n.is_empty() && *n != BUILTIN_FACE) else {
            return Typeface::Spleen;
        };

        let loaded = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| FontArc::try_from_vec(bytes).map_err(|e| e.to_string()));
        match loaded {
            Ok(font) => Typeface::TrueType(font),
            Err(e) => {
                log::warn!("Cannot load font {}: {}; using built-in face", path, e);
                Typeface::Spleen
            }
        }
    }

    /// Height of one line at `size`.
    pub fn line_height(&self, size: usize) -> usize {
        match self {
            Typeface::Spleen => size,
            Typeface::TrueType(font) => {
                let scaled = font.as_scaled(size as f32);
                (scaled.ascent() - scaled.descent()).ceil().max(1.0) as usize
            }
        }
    }

    /// Width of `text` rendered on one line at `size`.
    pub fn measure(&self, text: &str, size: usize) -> usize {
        match self {
            Typeface::Spleen => text.chars().count() * spleen_cell_width(size),
            Typeface::TrueType(font) => {
                let scaled = font.as_scaled(size as f32);
                let width: f32 = text
                    .chars()
                    .map(|ch| scaled.h_advance(font.glyph_id(ch)))
                    .sum();
                width.ceil() as usize
            }
        }
    }

    /// Draw one line with its top-left corner at (x, y).
    pub fn draw(&self, canvas: &mut Canvas, text: &str, x: usize, y: usize, size: usize) {
        match self {
            Typeface::Spleen => draw_spleen(canvas, text, x, y, size),
            Typeface::TrueType(font) => draw_truetype(font, canvas, text, x, y, size),
        }
    }
}

fn spleen_cell_width(size: usize) -> usize {
    (size / 2).max(1)
}

fn draw_spleen(canvas: &mut Canvas, text: &str, x: usize, y: usize, size: usize) {
    let cell_w = spleen_cell_width(size);
    let (data, src_w, src_h) = if size >= SPLEEN_LARGE_FROM {
        (FONT_12X24, 12, 24)
    } else {
        (FONT_6X12, 6, 12)
    };
    let mut face = PSF2Font::new(data).ok();

    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i * cell_w;
        let mut src = vec![false; src_w * src_h];
        let mut found = false;

        if let Some(face) = face.as_mut() {
            let utf8 = ch.to_string();
            if let Some(glyph) = face.glyph_for_utf8(utf8.as_bytes()) {
                found = true;
                for (row_y, row) in glyph.enumerate() {
                    for (col_x, on) in row.enumerate() {
                        if row_y < src_h && col_x < src_w {
                            src[row_y * src_w + col_x] = on;
                        }
                    }
                }
            }
        }

        if !found {
            draw_box(canvas, origin_x, y, cell_w, size);
            continue;
        }

        for dy in 0..size {
            for dx in 0..cell_w {
                let sx = dx * src_w / cell_w;
                let sy = dy * src_h / size;
                if src[sy * src_w + sx] {
                    canvas.set(origin_x + dx, y + dy, true);
                }
            }
        }
    }
}

/// Outline drawn for characters the face does not cover.
fn draw_box(canvas: &mut Canvas, x: usize, y: usize, w: usize, h: usize) {
    canvas.fill_rect(x, y, w, 1);
    canvas.fill_rect(x, y + h.saturating_sub(1), w, 1);
    canvas.fill_rect(x, y, 1, h);
    canvas.fill_rect(x + w.saturating_sub(1), y, 1, h);
}

fn draw_truetype(font: &FontArc, canvas: &mut Canvas, text: &str, x: usize, y: usize, size: usize) {
    let px = size as f32;
    let scaled = font.as_scaled(px);
    let baseline = y as f32 + scaled.ascent();
    let mut caret = x as f32;

    for ch in text.chars() {
        let id = font.glyph_id(ch);
        let glyph = id.with_scale_and_position(px, point(caret, baseline));
        caret += scaled.h_advance(id);

        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            if coverage < COVERAGE_THRESHOLD {
                return;
            }
            let cx = gx as i32 + bounds.min.x as i32;
            let cy = gy as i32 + bounds.min.y as i32;
            if cx >= 0 && cy >= 0 {
                canvas.set(cx as usize, cy as usize, true);
            }
        });
    }
}

// ============================================================================
// WRAPPING AND SIZING
// ============================================================================

/// Break `text` into lines no wider than `max_width`.
///
/// Explicit newlines start a new paragraph. Paragraphs break on spaces;
/// a word wider than the limit is split between characters. Without a limit
/// only explicit newlines break.
pub fn wrap(text: &str, max_width: Option<usize>, measure: impl Fn(&str) -> usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let Some(max) = max_width else {
            lines.push(paragraph.to_string());
            continue;
        };
        if measure(paragraph) <= max {
            lines.push(paragraph.to_string());
            continue;
        }

        let mut current = String::new();
        for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if measure(&candidate) <= max {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= max {
                current = word.to_string();
                continue;
            }

            for ch in word.chars() {
                let mut test = current.clone();
                test.push(ch);
                if measure(&test) <= max || current.is_empty() {
                    current = test;
                } else {
                    lines.push(std::mem::replace(&mut current, ch.to_string()));
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// A text field sized and wrapped for its box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub size: usize,
    pub lines: Vec<String>,
    pub width: usize,
    pub height: usize,
}

/// Total height of `count` lines.
pub fn block_height(line_height: usize, count: usize) -> usize {
    line_height * count + LINE_GAP * count.saturating_sub(1)
}

/// Largest size (at most `preferred`, or the box height) at which `text`
/// fits a `box_height`-tall box, wrapping to `box_width` when given.
///
/// Returns `None` when even [`MIN_FONT_SIZE`] does not fit.
pub fn fit_text(
    face: &Typeface,
    text: &str,
    box_width: Option<usize>,
    box_height: usize,
    preferred: Option<usize>,
) -> Option<TextBlock> {
    let start = preferred.unwrap_or(box_height);

    (MIN_FONT_SIZE..=start).rev().find_map(|size| {
        let lines = wrap(text, box_width, |s| face.measure(s, size));
        let height = block_height(face.line_height(size), lines.len());
        let width = lines.iter().map(|l| face.measure(l, size)).max().unwrap_or(0);
        let fits = height <= box_height && box_width.is_none_or(|w| width <= w);
        fits.then_some(TextBlock {
            size,
            lines,
            width,
            height,
        })
    })
}

/// Draw a sized block, each line centred horizontally.
pub fn render_block(face: &Typeface, block: &TextBlock) -> Bitmap {
    let width = block.width.max(1);
    let mut canvas = Canvas::new(width, block.height.max(1));
    let line_h = face.line_height(block.size);

    for (i, line) in block.lines.iter().enumerate() {
        let line_w = face.measure(line, block.size);
        let x = (width - line_w.min(width)) / 2;
        face.draw(&mut canvas, line, x, i * (line_h + LINE_GAP), block.size);
    }
    canvas.freeze()
}

// ============================================================================
// TESTS
// ============================================================================
