use heapless::Vec;

use crate::{Error, Grid, Quantized, Result, GRID_COLS, GRID_ROWS};

pub const BMP_CONTENT_TYPE: &str = "image/bmp";

const FILE_HEADER_LEN: usize = 14;
const INFO_HEADER_LEN: usize = 40;
const PALETTE_LEN: usize = 256 * 4;

/// Offset of the first pixel byte.
pub const BMP_HEADER_LEN: usize = FILE_HEADER_LEN + INFO_HEADER_LEN + PALETTE_LEN;

const fn row_stride(width: usize) -> usize {
    (width + 3) & !3
}

/// Encoded size of an 8-bit grayscale bitmap.
pub const fn bmp_len(height: usize, width: usize) -> usize {
    BMP_HEADER_LEN + height * row_stride(width)
}

pub const BITMAP_LEN: usize = bmp_len(GRID_ROWS, GRID_COLS);

pub type Bitmap = Vec<u8, BITMAP_LEN>;

/// Temperature span mapped onto black..white, in plain degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegreeRange {
    pub min_deg: f64,
    pub max_deg: f64,
}

impl Default for DegreeRange {
    fn default() -> Self {
        Self {
            min_deg: 0.0,
            max_deg: 80.0,
        }
    }
}

impl DegreeRange {
    pub fn new(min_deg: f64, max_deg: f64) -> Result<Self> {
        let range = Self { min_deg, max_deg };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        let (min_q, max_q) = self.quantized();
        if !min_q.is_finite() || !max_q.is_finite() || min_q == max_q {
            return Err(Error::InvalidRange {
                min_deg: self.min_deg,
                max_deg: self.max_deg,
            });
        }
        Ok(())
    }

    fn quantized(&self) -> (f64, f64) {
        (self.min_deg * 4.0, self.max_deg * 4.0)
    }

    /// Gray level for one quantized cell. Ties round down.
    pub fn intensity(&self, q: Quantized) -> u8 {
        let (min_q, max_q) = self.quantized();
        let scale = 255.0 / (max_q - min_q);
        let v = (scale * (q as f64 - min_q)).clamp(0.0, 255.0);
        let floor = v as u8;
        if v - floor as f64 > 0.5 {
            floor + 1
        } else {
            floor
        }
    }
}

struct BmpWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> BmpWriter<'a> {
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn put_u16(&mut self, v: u16) {
        self.put(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.put(&v.to_le_bytes());
    }

    fn put_i32(&mut self, v: i32) {
        self.put(&v.to_le_bytes());
    }

    /// Reserves a u32 to be filled in later and returns where it lives.
    fn bookmark_u32(&mut self) -> usize {
        let at = self.pos;
        self.put_u32(0);
        at
    }

    fn patch_u32(&mut self, at: usize, v: u32) {
        self.buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }
}

/// Writes `grid` as a grayscale bitmap into `out`, returning the byte count.
///
/// `out` is left untouched when the range or buffer size is rejected.
pub fn encode_bmp<const H: usize, const W: usize>(
    grid: &Grid<H, W>,
    range: &DegreeRange,
    out: &mut [u8],
) -> Result<usize> {
    range.validate()?;
    let needed = bmp_len(H, W);
    if out.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            got: out.len(),
        });
    }

    let mut w = BmpWriter { buf: out, pos: 0 };

    w.put(b"BM");
    let size_bookmark = w.bookmark_u32();
    w.put_u16(0);
    w.put_u16(0);
    let pixel_offset_bookmark = w.bookmark_u32();

    w.put_u32(INFO_HEADER_LEN as u32);
    w.put_i32(W as i32);
    w.put_i32(H as i32);
    w.put_u16(1); // planes
    w.put_u16(8); // bits per pixel
    w.put_u32(0); // no compression
    w.put_u32(0); // image size, zero when uncompressed
    w.put_u32(0);
    w.put_u32(0);
    w.put_u32(0); // whole palette used
    w.put_u32(0); // every color important

    for c in 0..=255u8 {
        w.put(&[c, c, c, 0]);
    }

    let pixel_offset = w.pos;
    let padding = row_stride(W) - W;
    // bottom row first
    for row in grid.cells().iter().rev() {
        for &q in row {
            w.put(&[range.intensity(q)]);
        }
        for _ in 0..padding {
            w.put(&[0]);
        }
    }

    let end = w.pos;
    w.patch_u32(size_bookmark, end as u32);
    w.patch_u32(pixel_offset_bookmark, pixel_offset as u32);
    Ok(end)
}

impl<const H: usize, const W: usize> Grid<H, W> {
    pub fn encode_bmp(&self, range: &DegreeRange, out: &mut [u8]) -> Result<usize> {
        encode_bmp(self, range, out)
    }
}

impl Grid {
    pub fn to_bitmap(&self, range: &DegreeRange) -> Result<Bitmap> {
        let mut bitmap = Bitmap::new();
        bitmap
            .resize(BITMAP_LEN, 0)
            .map_err(|_| Error::BufferTooSmall {
                needed: BITMAP_LEN,
                got: bitmap.capacity(),
            })?;
        let len = encode_bmp(self, range, &mut bitmap)?;
        bitmap.truncate(len);
        Ok(bitmap)
    }
}
