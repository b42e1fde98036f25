//! # Label Layout
//!
//! Turns a [`LabelSpec`] plus one data row into the 1-bit [`Bitmap`] the
//! raster converter consumes.
//!
//! ## Pipeline
//!
//! ```text
//! LabelSpec + DataRow + FieldMapping
//!        │ resolve()
//!        ▼
//!   ResolvedRow  ──render_label()──▶  Bitmap (height = printable pins)
//! ```
//!
//! ## Placeholders
//!
//! Field values may contain `{{column}}` tokens. Each token naming a column
//! of the row is replaced by that row's value; unknown tokens stay as typed.
//! A [`FieldMapping`] entry replaces a field's whole value with a column.
//!
//! ## Geometry
//!
//! The bitmap is as tall as the tape's printable pins. Fields sit inside a
//! margin on every side:
//!
//! ```text
//!  ┌──────────────────────────────────┐  ▲
//!  │ margin                           │  │
//!  │      ┌──── field 0 ────┐         │  │
//!  │      └─────────────────┘         │  printable pins
//!  │        spacing                   │  │
//!  │      ┌──── field 1 ────┐         │  │
//!  │      └─────────────────┘         │  │
//!  └──────────────────────────────────┘  ▼
//!  ◀──────────── label length ────────▶
//! ```
//!
//! In vertical flow (default) each field gets an equal share of the content
//! height and is centred horizontally. In horizontal flow fields sit side by
//! side, each vertically centred.

pub mod barcode;
pub mod text;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::printer::{PrinterModel, TapeWidth};
use crate::raster::{Bitmap, Canvas};

pub use barcode::{Barcoders, Symbol, SymbolSource};
pub use text::{FontInfo, MIN_FONT_SIZE, Typeface};

/// Preferred bar width for 1D barcodes (dots per module)
const BAR_MODULE_DOTS: usize = 2;

/// Quiet zone around QR codes (modules)
const QR_QUIET_MODULES: usize = 1;

/// Content height below which the vertical margin is ignored
const MIN_CONTENT_HEIGHT: usize = 4;

/// Largest accepted margin or field spacing (dots)
pub const MAX_GAP_DOTS: usize = 1024;

/// Longest accepted fixed label length (mm)
pub const MAX_LENGTH_MM: f32 = 1000.0;

// ============================================================================
// LABEL TYPES
// ============================================================================

/// What a field renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Qr,
    Code128,
    Code39,
    Ean13,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Qr => "qr",
            FieldKind::Code128 => "code128",
            FieldKind::Code39 => "code39",
            FieldKind::Ean13 => "ean13",
        };
        f.write_str(name)
    }
}

/// How fields are arranged on the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldFlow {
    #[default]
    Vertical,
    Horizontal,
}

/// One field of a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(default)]
    pub kind: FieldKind,
    /// Literal text or a template with `{{column}}` tokens
    pub value: String,
    /// Font override (path to a TrueType file, or `"spleen"`)
    #[serde(default)]
    pub font: Option<String>,
    /// Preferred font size in dots; auto-sized when unset
    #[serde(default)]
    pub size: Option<usize>,
}

impl FieldSpec {
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(FieldKind::Text, value)
    }

    pub fn new(kind: FieldKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            font: None,
            size: None,
        }
    }
}

/// A label template.
///
/// ```
/// use ptlabel::layout::{FieldKind, LabelSpec};
///
/// let spec: LabelSpec = serde_json::from_str(r#"{
///     "tape_width_mm": 12,
///     "fields": [
///         {"value": "{{name}}"},
///         {"kind": "code128", "value": "{{sku}}"}
///     ]
/// }"#).unwrap();
/// assert_eq!(spec.fields[1].kind, FieldKind::Code128);
/// assert_eq!(spec.margin, 8);
/// spec.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub fields: Vec<FieldSpec>,
    #[serde(rename = "tape_width_mm", default)]
    pub tape: TapeWidth,
    /// Blank border on every side (dots)
    #[serde(default = "default_margin")]
    pub margin: usize,
    /// Gap between fields (dots)
    #[serde(default = "default_spacing")]
    pub spacing: usize,
    /// Default font for text fields
    #[serde(default)]
    pub font: Option<String>,
    /// Default preferred font size
    #[serde(default)]
    pub font_size: Option<usize>,
    /// Fixed label length; sized to content when unset
    #[serde(default)]
    pub length_mm: Option<f32>,
    #[serde(default)]
    pub flow: FieldFlow,
}

fn default_margin() -> usize {
    8
}

fn default_spacing() -> usize {
    6
}

impl LabelSpec {
    pub fn new(tape: TapeWidth, fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            tape,
            margin: default_margin(),
            spacing: default_spacing(),
            font: None,
            font_size: None,
            length_mm: None,
            flow: FieldFlow::default(),
        }
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.fields.is_empty() {
            return Err(RenderError::EmptyLabel);
        }
        if self.margin > MAX_GAP_DOTS {
            return Err(RenderError::InvalidSpec(format!(
                "margin {} exceeds {} dots",
                self.margin, MAX_GAP_DOTS
            )));
        }
        if self.spacing > MAX_GAP_DOTS {
            return Err(RenderError::InvalidSpec(format!(
                "spacing {} exceeds {} dots",
                self.spacing, MAX_GAP_DOTS
            )));
        }
        if let Some(mm) = self.length_mm {
            if !(mm.is_finite() && mm > 0.0) {
                return Err(RenderError::InvalidSpec(format!(
                    "label length {}mm is not positive",
                    mm
                )));
            }
            if mm > MAX_LENGTH_MM {
                return Err(RenderError::InvalidSpec(format!(
                    "label length {}mm exceeds {}mm",
                    mm, MAX_LENGTH_MM
                )));
            }
        }
        Ok(())
    }

    /// Fixed label length in dots, if any.
    pub fn length_dots(&self) -> Option<usize> {
        self.length_mm.map(|mm| PrinterModel::default().mm_to_dots(mm))
    }
}

// ============================================================================
// ROW RESOLUTION
// ============================================================================

/// One data row: column name to value.
pub type DataRow = BTreeMap<String, String>;

/// Field index to column name; the column replaces the field's whole value.
pub type FieldMapping = BTreeMap<usize, String>;

/// Concrete values for every field of a spec, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRow {
    values: Vec<String>,
}

impl ResolvedRow {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, field: usize) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }
}

/// Substitute one row into the spec's field templates.
pub fn resolve(spec: &LabelSpec, row: &DataRow, mapping: &FieldMapping) -> ResolvedRow {
    let values = spec
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            match mapping.get(&i).and_then(|column| row.get(column)) {
                Some(value) => value.clone(),
                None => substitute(&field.value, row),
            }
        })
        .collect();
    ResolvedRow { values }
}

/// Replace `{{column}}` tokens with row values, leaving unknown tokens intact.
pub fn substitute(template: &str, row: &DataRow) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = after[..end].trim();
        match row.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

// ============================================================================
// RENDERING
// ============================================================================

/// Render with the default symbol source.
pub fn render(spec: &LabelSpec, row: &ResolvedRow) -> Result<Bitmap, RenderError> {
    render_label(spec, row, &Barcoders)
}

/// Lay out every field and compose the label bitmap.
pub fn render_label(
    spec: &LabelSpec,
    row: &ResolvedRow,
    symbols: &dyn SymbolSource,
) -> Result<Bitmap, RenderError> {
    spec.validate()?;

    let pins = spec.tape.printable_pins();
    let margins = spec
        .margin
        .checked_mul(2)
        .ok_or_else(|| overflow("margin"))?;
    let (top, content_h) = match pins.checked_sub(margins) {
        Some(h) if h >= MIN_CONTENT_HEIGHT => (spec.margin, h),
        _ => (0, pins),
    };
    let fixed_len = spec.length_dots();
    let n = spec.fields.len();
    let gaps = spec
        .spacing
        .checked_mul(n - 1)
        .ok_or_else(|| overflow("field spacing"))?;

    let inner_w = fixed_len.map(|len| len.saturating_sub(margins));
    let parts = match spec.flow {
        FieldFlow::Vertical => {
            let share = content_h.checked_sub(gaps).map(|h| h / n).unwrap_or(0);
            spec.fields
                .iter()
                .enumerate()
                .map(|(i, field)| render_field(spec, i, field, row, inner_w, share, symbols))
                .collect::<Result<Vec<_>, _>>()?
        }
        FieldFlow::Horizontal => {
            let each_w = inner_w.map(|w| w.saturating_sub(gaps) / n);
            spec.fields
                .iter()
                .enumerate()
                .map(|(i, field)| render_field(spec, i, field, row, each_w, content_h, symbols))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let content_w = match spec.flow {
        FieldFlow::Vertical => parts.iter().map(Bitmap::width).max().unwrap_or(0),
        FieldFlow::Horizontal => parts
            .iter()
            .try_fold(gaps, |acc, part| acc.checked_add(part.width()))
            .ok_or_else(|| overflow("label width"))?,
    };
    let natural_w = content_w
        .checked_add(margins)
        .ok_or_else(|| overflow("label width"))?;
    let width = match fixed_len {
        Some(len) if natural_w > len => {
            return Err(RenderError::DoesNotFit {
                field: 0,
                reason: format!("content needs {} dots, label is {}", natural_w, len),
            });
        }
        Some(len) => len,
        None => natural_w.max(1),
    };

    let mut canvas = Canvas::new(width, pins);
    match spec.flow {
        FieldFlow::Vertical => {
            let share = content_h.saturating_sub(gaps) / n;
            for (i, part) in parts.iter().enumerate() {
                let x = (width - part.width()) / 2;
                let y = top + i * (share + spec.spacing) + (share - part.height()) / 2;
                canvas.blit(part, x, y);
            }
        }
        FieldFlow::Horizontal => {
            let mut x = (width - content_w) / 2;
            for part in &parts {
                let y = top + (content_h - part.height()) / 2;
                canvas.blit(part, x, y);
                x += part.width() + spec.spacing;
            }
        }
    }

    Ok(canvas.freeze())
}

fn overflow(what: &str) -> RenderError {
    RenderError::InvalidSpec(format!("{} is out of range", what))
}

fn render_field(
    spec: &LabelSpec,
    index: usize,
    field: &FieldSpec,
    row: &ResolvedRow,
    max_w: Option<usize>,
    box_h: usize,
    symbols: &dyn SymbolSource,
) -> Result<Bitmap, RenderError> {
    let value = row.get(index).unwrap_or(&field.value);

    if field.kind == FieldKind::Text {
        let face = Typeface::load(field.font.as_deref().or(spec.font.as_deref()));
        let preferred = field.size.or(spec.font_size);
        let block = text::fit_text(&face, value, max_w, box_h, preferred).ok_or_else(|| {
            RenderError::DoesNotFit {
                field: index,
                reason: format!(
                    "text does not fit {} dots high even at {} px",
                    box_h, MIN_FONT_SIZE
                ),
            }
        })?;
        log::debug!("Field {} text at {} px, {} line(s)", index, block.size, block.lines.len());
        return Ok(text::render_block(&face, &block));
    }

    let symbol = symbols.encode(field.kind, value)?;
    match symbol {
        Symbol::Linear(bars) => draw_bars(index, &bars, max_w, box_h),
        Symbol::Matrix { size, modules } => draw_matrix(index, size, &modules, max_w, box_h),
    }
}

/// Scale a 1D pattern: integer module width, full box height.
fn draw_bars(
    field: usize,
    bars: &[bool],
    max_w: Option<usize>,
    box_h: usize,
) -> Result<Bitmap, RenderError> {
    let limit = max_w.unwrap_or(usize::MAX);
    let module = (1..=BAR_MODULE_DOTS)
        .rev()
        .find(|m| bars.len() * m <= limit)
        .ok_or_else(|| RenderError::DoesNotFit {
            field,
            reason: format!("{} bar modules wider than {} dots", bars.len(), limit),
        })?;
    if box_h == 0 {
        return Err(RenderError::DoesNotFit {
            field,
            reason: "no height left for barcode".to_string(),
        });
    }

    let mut canvas = Canvas::new(bars.len() * module, box_h);
    for (i, _) in bars.iter().enumerate().filter(|(_, dark)| **dark) {
        canvas.fill_rect(i * module, 0, module, box_h);
    }
    Ok(canvas.freeze())
}

/// Scale a matrix symbol at the largest integer module size, with quiet zone.
fn draw_matrix(
    field: usize,
    size: usize,
    modules: &[bool],
    max_w: Option<usize>,
    box_h: usize,
) -> Result<Bitmap, RenderError> {
    let total = size + 2 * QR_QUIET_MODULES;
    let side_limit = max_w.map_or(box_h, |w| w.min(box_h));
    let module = side_limit / total;
    if module == 0 {
        return Err(RenderError::DoesNotFit {
            field,
            reason: format!("{}-module QR code needs at least {} dots", total, total),
        });
    }

    let side = total * module;
    let mut canvas = Canvas::new(side, side);
    for y in 0..size {
        for x in 0..size {
            if modules[y * size + x] {
                canvas.fill_rect(
                    (x + QR_QUIET_MODULES) * module,
                    (y + QR_QUIET_MODULES) * module,
                    module,
                    module,
                );
            }
        }
    }
    Ok(canvas.freeze())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(pairs: &[(&str, &str)]) -> DataRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_tokens() {
        let r = row(&[("name", "Ada"), ("id", "42")]);
        assert_eq!(substitute("Hi {{name}} #{{ id }}", &r), "Hi Ada #42");
        assert_eq!(substitute("{{missing}} stays", &r), "{{missing}} stays");
        assert_eq!(substitute("open {{name", &r), "open {{name");
        assert_eq!(substitute("plain", &r), "plain");
    }

    #[test]
    fn test_resolve_with_mapping() {
        let spec = LabelSpec::new(
            TapeWidth::Mm12,
            vec![
                FieldSpec::text("Asset"),
                FieldSpec::text("{{name}}"),
                FieldSpec::text("fixed"),
            ],
        );
        let mut mapping = FieldMapping::new();
        mapping.insert(0, "tag".to_string());
        mapping.insert(2, "absent".to_string());

        let resolved = resolve(&spec, &row(&[("tag", "T-1"), ("name", "Ada")]), &mapping);
        assert_eq!(resolved.values(), &["T-1", "Ada", "fixed"]);
    }

    #[test]
    fn test_unmapped_literal_is_stable_across_rows() {
        let spec = LabelSpec::new(TapeWidth::Mm12, vec![FieldSpec::text("CONST")]);
        let a = resolve(&spec, &row(&[("x", "1")]), &FieldMapping::new());
        let b = resolve(&spec, &row(&[("x", "2")]), &FieldMapping::new());
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_spec_rejected() {
        let spec = LabelSpec::new(TapeWidth::Mm12, vec![]);
        assert!(matches!(spec.validate(), Err(RenderError::EmptyLabel)));
    }

    #[test]
    fn test_oversized_geometry_rejected() {
        let mut spec = LabelSpec::new(TapeWidth::Mm12, vec![FieldSpec::text("A")]);
        spec.margin = usize::MAX;
        assert!(matches!(spec.validate(), Err(RenderError::InvalidSpec(_))));

        let mut spec = LabelSpec::new(TapeWidth::Mm12, vec![FieldSpec::text("A")]);
        spec.spacing = MAX_GAP_DOTS + 1;
        assert!(matches!(spec.validate(), Err(RenderError::InvalidSpec(_))));

        let mut spec = LabelSpec::new(TapeWidth::Mm12, vec![FieldSpec::text("A")]);
        spec.length_mm = Some(1.0e9);
        assert!(matches!(spec.validate(), Err(RenderError::InvalidSpec(_))));

        spec.length_mm = Some(-2.0);
        assert!(matches!(spec.validate(), Err(RenderError::InvalidSpec(_))));
    }

    #[test]
    fn test_huge_spacing_fails_without_panic() {
        let mut spec = LabelSpec::new(
            TapeWidth::Mm12,
            vec![FieldSpec::text("A"), FieldSpec::text("B"), FieldSpec::text("C")],
        );
        spec.spacing = usize::MAX / 2;
        spec.margin = usize::MAX;
        let resolved = resolve(&spec, &DataRow::new(), &FieldMapping::new());
        assert!(matches!(
            render(&spec, &resolved),
            Err(RenderError::InvalidSpec(_))
        ));
    }

    #[test]
    fn test_largest_accepted_gaps_render() {
        let mut spec = LabelSpec::new(
            TapeWidth::Mm12,
            vec![FieldSpec::text("A"), FieldSpec::text("B")],
        );
        spec.flow = FieldFlow::Horizontal;
        spec.margin = MAX_GAP_DOTS;
        spec.spacing = MAX_GAP_DOTS;
        let resolved = resolve(&spec, &DataRow::new(), &FieldMapping::new());
        let bitmap = render(&spec, &resolved).unwrap();
        // margin too tall for 70 pins, so fields use the full height
        assert_eq!(bitmap.height(), 70);
        assert!(bitmap.width() > 3 * MAX_GAP_DOTS);
    }

    #[test]
    fn test_unsupported_tape_rejected_on_load() {
        let result: Result<LabelSpec, _> =
            serde_json::from_str(r#"{"tape_width_mm": 15, "fields": [{"value": "x"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_single_text_field_geometry() {
        // 12mm tape: 70 pins, margin 8 => 54 dots of content
        let spec = LabelSpec::new(TapeWidth::Mm12, vec![FieldSpec::text("AB")]);
        let resolved = resolve(&spec, &DataRow::new(), &FieldMapping::new());
        let bitmap = render(&spec, &resolved).unwrap();
        assert_eq!(bitmap.height(), 70);
        // 2 chars * 27 + 2 * 8
        assert_eq!(bitmap.width(), 2 * 27 + 16);
        assert!(bitmap.ink() > 0);
    }

    #[test]
    fn test_vertical_fields_share_height() {
        let spec = LabelSpec::new(
            TapeWidth::Mm24,
            vec![FieldSpec::text("A"), FieldSpec::text("B")],
        );
        let resolved = resolve(&spec, &DataRow::new(), &FieldMapping::new());
        let bitmap = render(&spec, &resolved).unwrap();
        // 128 - 16 = 112; (112 - 6) / 2 = 53 per field, cell width 26
        assert_eq!(bitmap.height(), 128);
        assert_eq!(bitmap.width(), 26 + 16);
    }

    #[test]
    fn test_horizontal_flow_widths_add_up() {
        let mut spec = LabelSpec::new(
            TapeWidth::Mm12,
            vec![FieldSpec::text("A"), FieldSpec::text("B")],
        );
        spec.flow = FieldFlow::Horizontal;
        let resolved = resolve(&spec, &DataRow::new(), &FieldMapping::new());
        let bitmap = render(&spec, &resolved).unwrap();
        assert_eq!(bitmap.width(), 27 + 6 + 27 + 16);
    }

    #[test]
    fn test_fixed_length_too_short() {
        let mut spec = LabelSpec::new(TapeWidth::Mm12, vec![FieldSpec::text("A LONG LABEL TEXT")]);
        spec.length_mm = Some(3.0);
        let resolved = resolve(&spec, &DataRow::new(), &FieldMapping::new());
        assert!(matches!(
            render(&spec, &resolved),
            Err(RenderError::DoesNotFit { field: 0, .. })
        ));
    }

    #[test]
    fn test_fixed_length_sets_width() {
        let mut spec = LabelSpec::new(TapeWidth::Mm12, vec![FieldSpec::text("OK")]);
        spec.length_mm = Some(40.0);
        let resolved = resolve(&spec, &DataRow::new(), &FieldMapping::new());
        let bitmap = render(&spec, &resolved).unwrap();
        assert_eq!(bitmap.width(), spec.length_dots().unwrap());
    }

    #[test]
    fn test_too_small_canvas_is_layout_failure() {
        // 3.5mm tape: 24 pins, 3 fields of 6 px need 3*6 + 2*6 = 30
        let mut spec = LabelSpec::new(
            TapeWidth::Mm3_5,
            vec![FieldSpec::text("A"), FieldSpec::text("B"), FieldSpec::text("C")],
        );
        spec.margin = 0;
        let resolved = resolve(&spec, &DataRow::new(), &FieldMapping::new());
        assert!(matches!(
            render(&spec, &resolved),
            Err(RenderError::DoesNotFit { .. })
        ));
    }

    #[test]
    fn test_bad_ean13_is_render_error() {
        let spec = LabelSpec::new(
            TapeWidth::Mm12,
            vec![FieldSpec::new(FieldKind::Ean13, "{{code}}")],
        );
        let resolved = resolve(&spec, &row(&[("code", "12AB")]), &FieldMapping::new());
        assert!(matches!(
            render(&spec, &resolved),
            Err(RenderError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_barcode_uses_two_dot_modules() {
        let spec = LabelSpec::new(
            TapeWidth::Mm12,
            vec![FieldSpec::new(FieldKind::Ean13, "5901234123457")],
        );
        let resolved = resolve(&spec, &DataRow::new(), &FieldMapping::new());
        let bitmap = render(&spec, &resolved).unwrap();
        assert_eq!(bitmap.width(), 95 * 2 + 16);
    }

    #[test]
    fn test_qr_fits_box() {
        let spec = LabelSpec::new(
            TapeWidth::Mm24,
            vec![FieldSpec::new(FieldKind::Qr, "hello")],
        );
        let resolved = resolve(&spec, &DataRow::new(), &FieldMapping::new());
        let bitmap = render(&spec, &resolved).unwrap();
        // Version 1 (21 modules) + quiet zone = 23; 112 / 23 = 4 dots per module
        assert_eq!(bitmap.width(), 23 * 4 + 16);
    }

    struct Stripes;

    impl SymbolSource for Stripes {
        fn encode(&self, _kind: FieldKind, _value: &str) -> Result<Symbol, RenderError> {
            Ok(Symbol::Linear(vec![true, false, true]))
        }
    }

    #[test]
    fn test_custom_symbol_source() {
        let spec = LabelSpec::new(
            TapeWidth::Mm6,
            vec![FieldSpec::new(FieldKind::Code128, "anything")],
        );
        let resolved = resolve(&spec, &DataRow::new(), &FieldMapping::new());
        let bitmap = render_label(&spec, &resolved, &Stripes).unwrap();
        assert_eq!(bitmap.width(), 3 * 2 + 16);
        // 6mm: 32 pins, bars span the 16-dot content height
        assert!(bitmap.get(8, 8));
        assert!(!bitmap.get(10, 8));
        assert!(!bitmap.get(8, 7));
    }
}
