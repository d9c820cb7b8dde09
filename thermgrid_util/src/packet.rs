use heapless::Vec;

use crate::{
    Error, Quantized, Result, GRID_COLS, MARKER, MAX_PACKET_LEN, MAX_WINDOW, ROW_HEADER_LEN,
    ROW_PAYLOAD_LEN,
};

/// One packet as delivered by the radio link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    payload: Vec<u8, MAX_PACKET_LEN>,
    arrival_index: u32,
}

impl Packet {
    pub fn new(payload: &[u8], arrival_index: u32) -> Result<Self> {
        let payload = Vec::from_slice(payload).map_err(|_| Error::InvalidLength {
            expected: MAX_PACKET_LEN,
            got: payload.len(),
        })?;
        Ok(Self { payload, arrival_index })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Row tag carried in the second header byte, if the packet has one.
    pub fn sequence_tag(&self) -> Option<u8> {
        self.payload.get(1).copied()
    }

    pub fn arrival_index(&self) -> u32 {
        self.arrival_index
    }
}

pub type Window = Vec<Packet, MAX_WINDOW>;

/// Boundary to the wireless transport.
///
/// `receive` hands back the next packet, or `None` when nothing arrived within
/// the implementation's short timeout. It must never block indefinitely.
pub trait PacketSource {
    fn receive(&mut self) -> Result<Option<Packet>>;
}

impl<S: PacketSource + ?Sized> PacketSource for &mut S {
    fn receive(&mut self) -> Result<Option<Packet>> {
        (**self).receive()
    }
}

/// Pulls up to `window_size` packets, stopping early at the first miss.
pub fn collect_window<S: PacketSource>(source: &mut S, window_size: usize) -> Result<Window> {
    if window_size == 0 || window_size > MAX_WINDOW {
        return Err(Error::InvalidWindow {
            size: window_size,
            max: MAX_WINDOW,
        });
    }

    let mut window = Window::new();
    while window.len() < window_size {
        match source.receive()? {
            Some(packet) => {
                // capacity checked above
                let _ = window.push(packet);
            }
            None => break,
        }
    }

    log::debug!("collected {} of {} packets", window.len(), window_size);

    if window.is_empty() {
        return Err(Error::NoPackets);
    }
    Ok(window)
}

/// One decoded frame row, still in quantized units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSample {
    pub row_id: u8,
    pub cells: [Quantized; GRID_COLS],
}

pub fn decode_row(payload: &[u8], expected_row: u8) -> Result<RowSample> {
    if payload.len() != ROW_PAYLOAD_LEN {
        return Err(Error::InvalidLength {
            expected: ROW_PAYLOAD_LEN,
            got: payload.len(),
        });
    }
    if payload[0] != MARKER {
        return Err(Error::InvalidMarker {
            expected: MARKER,
            got: payload[0],
        });
    }
    let row_id = payload[1];
    if row_id != expected_row {
        return Err(Error::RowIdMismatch {
            expected: expected_row,
            got: row_id,
        });
    }

    let mut cells = [0; GRID_COLS];
    for (cell, bytes) in cells
        .iter_mut()
        .zip(payload[ROW_HEADER_LEN..].chunks_exact(2))
    {
        *cell = Quantized::from_le_bytes([bytes[0], bytes[1]]);
    }
    log::trace!("row {} decoded: {:?}", row_id, cells);

    Ok(RowSample { row_id, cells })
}

pub fn encode_row(row_id: u8, cells: &[Quantized; GRID_COLS]) -> [u8; ROW_PAYLOAD_LEN] {
    let mut payload = [0; ROW_PAYLOAD_LEN];
    payload[0] = MARKER;
    payload[1] = row_id;
    for (bytes, cell) in payload[ROW_HEADER_LEN..].chunks_exact_mut(2).zip(cells) {
        bytes.copy_from_slice(&cell.to_le_bytes());
    }
    payload
}
