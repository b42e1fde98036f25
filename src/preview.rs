//! # Label Preview
//!
//! Renders labels to PNG without touching a printer. The image is the label
//! as it reads on the tape: width runs along the tape, height across it, one
//! pixel per dot.
//!
//! Batches are rendered in parallel with `rayon`; results keep row order.

use image::{GrayImage, Luma};
use rayon::prelude::*;

use crate::error::LabelError;
use crate::layout::{self, DataRow, FieldMapping, LabelSpec};
use crate::raster::Bitmap;

/// Encode a bitmap as an 8-bit grayscale PNG (ink black, paper white).
pub fn to_png(bitmap: &Bitmap) -> Result<Vec<u8>, LabelError> {
    use image::ImageEncoder;

    let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
    let img = GrayImage::from_fn(width, height, |x, y| {
        let dark = bitmap.get(x as usize, y as usize);
        Luma([if dark { 0u8 } else { 255u8 }])
    });

    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::L8)
        .map_err(|e: image::ImageError| LabelError::Image(e.to_string()))?;

    Ok(png_bytes)
}

/// Render one row to PNG bytes.
pub fn preview_row(
    spec: &LabelSpec,
    row: &DataRow,
    mapping: &FieldMapping,
) -> Result<Vec<u8>, LabelError> {
    spec.validate()?;
    let resolved = layout::resolve(spec, row, mapping);
    let bitmap = layout::render(spec, &resolved)?;
    log::debug!("Preview {}x{} dots", bitmap.width(), bitmap.height());
    to_png(&bitmap)
}

/// Render every row; one result per row, in row order.
pub fn preview_batch(
    spec: &LabelSpec,
    rows: &[DataRow],
    mapping: &FieldMapping,
) -> Vec<Result<Vec<u8>, LabelError>> {
    rows.par_iter()
        .map(|row| preview_row(spec, row, mapping))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FieldKind, FieldSpec};
    use crate::printer::TapeWidth;
    use crate::raster::Canvas;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_png_signature_and_size() {
        let mut canvas = Canvas::new(10, 4);
        canvas.fill_rect(0, 0, 5, 4);
        let png = to_png(&canvas.freeze()).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);

        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (10, 4));
        assert_eq!(decoded.get_pixel(0, 0), &Luma([0]));
        assert_eq!(decoded.get_pixel(9, 3), &Luma([255]));
    }

    #[test]
    fn test_preview_row_height_matches_tape() {
        let spec = LabelSpec::new(TapeWidth::Mm12, vec![FieldSpec::text("{{name}}")]);
        let row: DataRow = [("name".to_string(), "Ada".to_string())].into();
        let png = preview_row(&spec, &row, &FieldMapping::new()).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.height() as usize, TapeWidth::Mm12.printable_pins());
    }

    #[test]
    fn test_preview_batch_keeps_order_and_errors() {
        let spec = LabelSpec::new(
            TapeWidth::Mm12,
            vec![FieldSpec::new(FieldKind::Ean13, "{{code}}")],
        );
        let rows: Vec<DataRow> = ["590123412345", "nope", "400638133393"]
            .iter()
            .map(|c| [("code".to_string(), c.to_string())].into())
            .collect();

        let results = preview_batch(&spec, &rows, &FieldMapping::new());
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(LabelError::Render(_))));
        assert!(results[2].is_ok());
    }
}
