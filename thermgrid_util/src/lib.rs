#![cfg_attr(not(test), no_std)]

pub use assembler::{find_frame, AssemblerConfig, FrameReceiver};
pub use bmp::{bmp_len, encode_bmp, Bitmap, DegreeRange, BITMAP_LEN, BMP_CONTENT_TYPE, BMP_HEADER_LEN};
pub use error::{Error, ErrorKind, Result};
pub use grid::{Grid, GridView, Stats};
pub use packet::{collect_window, decode_row, encode_row, Packet, PacketSource, RowSample, Window};
pub use sensor::{Amg88xx, FrameRate, PixelSource, PowerMode, SensorBus, SharedSensor};
pub use spline::{interpolate, Degree, InterpolatedGrid, SplineConfig, MAX_DEGREE};
pub use unit::{deg_c_to_f, Unit};

mod assembler;
mod bmp;
mod error;
mod grid;
mod packet;
pub mod sensor;
mod spline;
mod unit;

pub const GRID_ROWS: usize = 8;
pub const GRID_COLS: usize = 8;
pub const NUM_PIXELS: usize = GRID_ROWS * GRID_COLS;

/// Bytes read from the sensor's pixel registers for one frame.
pub const RAW_FRAME_LEN: usize = NUM_PIXELS * 2;

/// First byte of every row packet.
pub const MARKER: u8 = 42;
pub const ROW_HEADER_LEN: usize = 2;
pub const ROW_PAYLOAD_LEN: usize = ROW_HEADER_LEN + GRID_COLS * 2;

pub const DEFAULT_WINDOW: usize = 16;
pub const MAX_WINDOW: usize = 32;

/// Largest payload the radio link delivers in one packet.
pub const MAX_PACKET_LEN: usize = 60;

pub type Quantized = i16;
pub type Frame = [RowSample; GRID_ROWS];
