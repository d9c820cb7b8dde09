use crate::{
    collect_window, decode_row, Error, Grid, Packet, PacketSource, Result, RowSample,
    DEFAULT_WINDOW, GRID_ROWS, MAX_WINDOW,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerConfig {
    pub window_size: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW,
        }
    }
}

/// Finds the first run of packets tagged 0, 1, .., 7 at consecutive positions.
///
/// No reordering or gap skipping: a lost or duplicated row breaks the run and
/// the scan moves on to the next 0 tag. Slices longer than `MAX_WINDOW` are
/// rejected so a failure can always report every tag seen.
pub fn find_frame(packets: &[Packet]) -> Result<&[Packet]> {
    if packets.len() > MAX_WINDOW {
        return Err(Error::InvalidWindow {
            size: packets.len(),
            max: MAX_WINDOW,
        });
    }

    let start = packets.iter().enumerate().position(|(i, packet)| {
        packet.sequence_tag() == Some(0)
            && packets.len() - i >= GRID_ROWS
            && packets[i..i + GRID_ROWS]
                .iter()
                .zip(0u8..)
                .all(|(p, tag)| p.sequence_tag() == Some(tag))
    });

    match start {
        Some(i) => {
            log::debug!("frame found at window index {}", i);
            Ok(&packets[i..i + GRID_ROWS])
        }
        None => {
            let tags = packets.iter().map(Packet::sequence_tag).collect();
            Err(Error::NoCompleteFrame { tags })
        }
    }
}

fn decode_frame(packets: &[Packet]) -> Result<[RowSample; GRID_ROWS]> {
    let mut rows = [RowSample {
        row_id: 0,
        cells: Default::default(),
    }; GRID_ROWS];
    for (row, (packet, expected)) in rows.iter_mut().zip(packets.iter().zip(0u8..)) {
        *row = decode_row(packet.payload(), expected)?;
    }
    Ok(rows)
}

/// Turns a lossy packet stream into decoded frames, one window per call.
pub struct FrameReceiver<S> {
    source: S,
    config: AssemblerConfig,
}

impl<S: PacketSource> FrameReceiver<S> {
    pub fn new(source: S, config: AssemblerConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> AssemblerConfig {
        self.config
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Collects a fresh window and returns the first complete frame in it.
    ///
    /// Packets left over after the matched run are dropped with the window.
    pub fn next_frame(&mut self) -> Result<Grid> {
        let window = collect_window(&mut self.source, self.config.window_size)?;
        let packets = find_frame(&window)?;
        let rows = decode_frame(packets)?;
        Ok(Grid::from_rows(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::tests::{row_payload, Replay};
    use crate::ErrorKind;

    fn packets(tags: &[u8]) -> std::vec::Vec<Packet> {
        tags.iter()
            .enumerate()
            .map(|(i, &t)| Packet::new(&row_payload(t), i as u32).unwrap())
            .collect()
    }

    fn arrivals(run: &[Packet]) -> std::vec::Vec<u32> {
        run.iter().map(Packet::arrival_index).collect()
    }

    #[test]
    fn ordered_run() {
        let window = packets(&[0, 1, 2, 3, 4, 5, 6, 7]);
        let run = find_frame(&window).unwrap();
        assert_eq!(arrivals(run), [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn skips_leading_noise() {
        let window = packets(&[3, 0, 1, 2, 3, 4, 5, 6, 7]);
        let run = find_frame(&window).unwrap();
        assert_eq!(arrivals(run), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn gap_fails_with_tags() {
        let window = packets(&[0, 1, 2, 4, 5, 6, 7]);
        let err = find_frame(&window).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        let tags: std::vec::Vec<Option<u8>> = [0, 1, 2, 4, 5, 6, 7].map(Some).to_vec();
        assert_eq!(err.tags().unwrap(), &tags[..]);
    }

    #[test]
    fn oversized_slice_rejected() {
        let tags: std::vec::Vec<u8> = (0..MAX_WINDOW as u8 + 1).map(|i| i % 3).collect();
        let err = find_frame(&packets(&tags)).unwrap_err();
        assert_eq!(err, Error::InvalidWindow { size: 33, max: 32 });
        assert!(err.tags().is_none());

        let err = find_frame(&packets(&tags[..MAX_WINDOW])).unwrap_err();
        assert_eq!(err.tags().unwrap().len(), MAX_WINDOW);
    }

    #[test]
    fn first_run_wins() {
        let window = packets(&[0, 1, 2, 3, 4, 5, 6, 7, 0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(find_frame(&window).unwrap()[0].arrival_index(), 0);
    }

    #[test]
    fn duplicate_breaks_run() {
        let window = packets(&[0, 1, 1, 2, 3, 4, 5, 6, 7, 0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(find_frame(&window).unwrap()[0].arrival_index(), 9);
    }

    #[test]
    fn candidate_too_close_to_end() {
        let window = packets(&[5, 6, 7, 0, 1, 2, 3, 4, 5, 6]);
        assert!(matches!(
            find_frame(&window),
            Err(Error::NoCompleteFrame { .. })
        ));
    }

    #[test]
    fn short_packet_has_no_tag() {
        let mut window = packets(&[0, 1, 2, 3, 4, 5, 6]);
        window.insert(3, Packet::new(&[42], 99).unwrap());
        let err = find_frame(&window).unwrap_err();
        assert_eq!(err.tags().unwrap()[3], None);
    }

    #[test]
    fn receiver_decodes_grid() {
        let mut receiver = FrameReceiver::new(
            Replay::tagged(&[7, 2, 0, 1, 2, 3, 4, 5, 6, 7]),
            AssemblerConfig::default(),
        );
        let grid = receiver.next_frame().unwrap();
        assert_eq!(grid.get(0, 0), 0);
        assert_eq!(grid.get(3, 5), 35);
        assert_eq!(grid.get(7, 7), 77);
    }

    #[test]
    fn receiver_surfaces_bad_marker() {
        let mut payloads: std::vec::Vec<std::vec::Vec<u8>> =
            (0..8).map(|t| row_payload(t).to_vec()).collect();
        payloads[4][0] = 0;
        let mut receiver = FrameReceiver::new(Replay::new(payloads), AssemblerConfig::default());
        assert_eq!(
            receiver.next_frame().unwrap_err(),
            Error::InvalidMarker { expected: 42, got: 0 }
        );
    }

    #[test]
    fn receiver_window_limits_search() {
        let mut tags = std::vec![9; 12];
        tags.extend(0..8);
        let mut receiver = FrameReceiver::new(
            Replay::tagged(&tags),
            AssemblerConfig { window_size: MAX_WINDOW },
        );
        assert!(receiver.next_frame().is_ok());

        let mut receiver = FrameReceiver::new(Replay::tagged(&tags), AssemblerConfig::default());
        let err = receiver.next_frame().unwrap_err();
        assert_eq!(err.tags().unwrap().len(), DEFAULT_WINDOW);
    }

    #[test]
    fn receiver_empty_link() {
        let mut receiver = FrameReceiver::new(
            Replay::new(std::vec::Vec::new()),
            AssemblerConfig::default(),
        );
        assert_eq!(receiver.next_frame().unwrap_err(), Error::NoPackets);
    }
}
