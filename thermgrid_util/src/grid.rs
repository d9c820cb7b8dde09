use crate::{Frame, Quantized, Unit, GRID_COLS, GRID_ROWS, RAW_FRAME_LEN};

/// Aggregate statistics over every cell of a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

impl Stats {
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut total = 0.0;
        let mut n = 0usize;
        for v in values {
            min = min.min(v);
            max = max.max(v);
            total += v;
            n += 1;
        }
        Self {
            min,
            max,
            average: total / n as f64,
        }
    }
}

/// Quantized temperature grid (1/4 °C per step). Never modified after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid<const H: usize = GRID_ROWS, const W: usize = GRID_COLS> {
    cells: [[Quantized; W]; H],
}

impl Grid {
    pub fn from_rows(rows: &Frame) -> Self {
        let mut cells = [[0; GRID_COLS]; GRID_ROWS];
        for (dst, row) in cells.iter_mut().zip(rows) {
            *dst = row.cells;
        }
        Self { cells }
    }

    /// Direct-read path: 64 little-endian cells, row-major, as read from the sensor.
    pub fn from_raw(raw: &[u8; RAW_FRAME_LEN]) -> Self {
        let mut cells = [[0; GRID_COLS]; GRID_ROWS];
        for (dst, bytes) in cells
            .iter_mut()
            .flat_map(|row| row.iter_mut())
            .zip(raw.chunks_exact(2))
        {
            *dst = Quantized::from_le_bytes([bytes[0], bytes[1]]);
        }
        Self { cells }
    }
}

impl<const H: usize, const W: usize> Grid<H, W> {
    pub const fn new(cells: [[Quantized; W]; H]) -> Self {
        Self { cells }
    }

    pub const fn height(&self) -> usize {
        H
    }

    pub const fn width(&self) -> usize {
        W
    }

    pub fn get(&self, row: usize, col: usize) -> Quantized {
        self.cells[row][col]
    }

    pub fn cells(&self) -> &[[Quantized; W]; H] {
        &self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = Quantized> + '_ {
        self.cells.iter().flat_map(|row| row.iter().copied())
    }

    pub fn view(&self, unit: Unit) -> GridView<'_, H, W> {
        GridView { grid: self, unit }
    }

    /// Reduces in quantized units, then converts the three results.
    pub fn stats(&self, unit: Unit) -> Stats {
        let mut min = Quantized::MAX;
        let mut max = Quantized::MIN;
        let mut total: i64 = 0;
        for q in self.iter() {
            min = min.min(q);
            max = max.max(q);
            total += q as i64;
        }
        Stats {
            min: unit.convert(min),
            max: unit.convert(max),
            average: unit.convert_f64(total as f64 / (H * W) as f64),
        }
    }
}

/// Read-only view of a grid in one unit. Conversion happens per access.
#[derive(Debug, Clone, Copy)]
pub struct GridView<'a, const H: usize = GRID_ROWS, const W: usize = GRID_COLS> {
    grid: &'a Grid<H, W>,
    unit: Unit,
}

impl<'a, const H: usize, const W: usize> GridView<'a, H, W> {
    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.unit.convert(self.grid.get(row, col))
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + 'a {
        let unit = self.unit;
        self.grid.iter().map(move |q| unit.convert(q))
    }

    pub fn to_array(&self) -> [[f64; W]; H] {
        let mut out = [[0.0; W]; H];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.get(r, c);
            }
        }
        out
    }

    /// Converts every cell, then reduces.
    pub fn stats(&self) -> Stats {
        Stats::from_values(self.iter())
    }
}
