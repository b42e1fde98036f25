//! 1-bit bitmaps.
//!
//! A [`Canvas`] is the mutable drawing surface used while a label is laid
//! out. [`Canvas::freeze`] turns it into an immutable [`Bitmap`], which is
//! what the raster converter and the preview encoder consume.
//!
//! Both store rows packed MSB-first, 1 = black:
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! ```

/// Mutable 1-bit drawing surface.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: usize,
    height: usize,
    row_bytes: usize,
    data: Vec<u8>,
}

impl Canvas {
    /// Create an all-white canvas.
    pub fn new(width: usize, height: usize) -> Self {
        let row_bytes = width.div_ceil(8);
        Self {
            width,
            height,
            row_bytes,
            data: vec![0; row_bytes * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Set a pixel (true = black). Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, black: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = y * self.row_bytes + x / 8;
        let mask = 0x80 >> (x % 8);
        if black {
            self.data[idx] |= mask;
        } else {
            self.data[idx] &= !mask;
        }
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y * self.row_bytes + x / 8] & (0x80 >> (x % 8)) != 0
    }

    /// Fill a rectangle with black.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize) {
        for py in y..(y + h).min(self.height) {
            for px in x..(x + w).min(self.width) {
                self.set(px, py, true);
            }
        }
    }

    /// Copy the black pixels of `src` with its top-left corner at (x, y).
    pub fn blit(&mut self, src: &Bitmap, x: usize, y: usize) {
        for sy in 0..src.height() {
            for sx in 0..src.width() {
                if src.get(sx, sy) {
                    self.set(x + sx, y + sy, true);
                }
            }
        }
    }

    /// Finish drawing.
    pub fn freeze(self) -> Bitmap {
        Bitmap {
            width: self.width,
            height: self.height,
            row_bytes: self.row_bytes,
            data: self.data,
        }
    }
}

/// Immutable 1-bit raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    row_bytes: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// Wrap packed row data. Returns `None` if the length doesn't match.
    pub fn from_packed(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        let row_bytes = width.div_ceil(8);
        (data.len() == row_bytes * height).then_some(Self {
            width,
            height,
            row_bytes,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel at (x, y); anything outside the bitmap is white.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y * self.row_bytes + x / 8] & (0x80 >> (x % 8)) != 0
    }

    /// Packed row data.
    pub fn as_packed(&self) -> &[u8] {
        &self.data
    }

    /// Count of black pixels.
    pub fn ink(&self) -> usize {
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }
}
