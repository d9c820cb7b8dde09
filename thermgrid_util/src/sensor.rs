//! AMG88xx register access and the locked direct-read path.

use core::cell::RefCell;
use critical_section::Mutex;

use crate::{
    Bitmap, DegreeRange, Error, Grid, Result, Stats, Unit, GRID_COLS, GRID_ROWS, RAW_FRAME_LEN,
};

pub const DEFAULT_ADDRESS: u8 = 0x69;

pub mod reg {
    pub const POWER_CONTROL: u8 = 0x00;
    pub const RESET: u8 = 0x01;
    pub const FRAME_RATE: u8 = 0x02;
    pub const AVERAGE: u8 = 0x07;
    pub const THERMISTOR: u8 = 0x0e;
    pub const AVERAGE_UNLOCK: u8 = 0x1f;
    pub const PIXELS: u8 = 0x80;
}

const INITIAL_RESET: u8 = 0x3f;
const MOVING_AVERAGE_BIT: u8 = 0b0010_0000;
const AVERAGE_UNLOCK_SEQUENCE: [u8; 3] = [0x50, 0x45, 0x57];
const AVERAGE_LOCK: u8 = 0x00;

/// Settle time after reset or wake.
pub const SETTLE_MS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    Normal = 0x00,
    Sleep = 0x10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameRate {
    #[default]
    Fps10 = 0,
    Fps1 = 1,
}

impl FrameRate {
    pub fn period_ms(self) -> u32 {
        match self {
            FrameRate::Fps10 => 100,
            FrameRate::Fps1 => 1000,
        }
    }
}

impl TryFrom<u8> for FrameRate {
    type Error = Error;

    fn try_from(fps: u8) -> Result<Self> {
        match fps {
            10 => Ok(FrameRate::Fps10),
            1 => Ok(FrameRate::Fps1),
            other => Err(Error::InvalidFrameRate(other)),
        }
    }
}

/// Register-level access to the sensor bus.
pub trait SensorBus {
    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<()>;
    fn write_register(&mut self, reg: u8, value: u8) -> Result<()>;
    fn delay_ms(&mut self, ms: u32);
}

/// Anything that can hand over one raw frame.
pub trait PixelSource {
    fn read_frame(&mut self, raw: &mut [u8; RAW_FRAME_LEN]) -> Result<()>;

    /// On-die thermistor in °C.
    fn read_thermistor(&mut self) -> Result<f64>;
}

pub fn thermistor_deg_c(raw: [u8; 2]) -> f64 {
    u16::from_le_bytes(raw) as f64 / 16.0
}

pub struct Amg88xx<B> {
    bus: B,
    power: PowerMode,
    moving_average: bool,
}

impl<B: SensorBus> Amg88xx<B> {
    /// Wakes the sensor, resets it and reads back the averaging mode.
    pub fn new(mut bus: B) -> Result<Self> {
        bus.write_register(reg::POWER_CONTROL, PowerMode::Normal as u8)?;
        bus.write_register(reg::RESET, INITIAL_RESET)?;
        bus.delay_ms(SETTLE_MS);

        let mut average = [0u8];
        bus.read_registers(reg::AVERAGE, &mut average)?;
        log::info!("amg88xx ready, moving average {}", average[0] & MOVING_AVERAGE_BIT != 0);

        Ok(Self {
            bus,
            power: PowerMode::Normal,
            moving_average: average[0] & MOVING_AVERAGE_BIT != 0,
        })
    }

    pub fn power_mode(&self) -> PowerMode {
        self.power
    }

    pub fn sleep(&mut self) -> Result<()> {
        self.bus
            .write_register(reg::POWER_CONTROL, PowerMode::Sleep as u8)?;
        self.power = PowerMode::Sleep;
        Ok(())
    }

    pub fn wake(&mut self) -> Result<()> {
        self.bus
            .write_register(reg::POWER_CONTROL, PowerMode::Normal as u8)?;
        self.power = PowerMode::Normal;
        self.bus.delay_ms(SETTLE_MS);
        Ok(())
    }

    pub fn set_frame_rate(&mut self, rate: FrameRate) -> Result<()> {
        self.bus.write_register(reg::FRAME_RATE, rate as u8)
    }

    pub fn moving_average(&self) -> bool {
        self.moving_average
    }

    pub fn set_moving_average(&mut self, enabled: bool) -> Result<()> {
        for key in AVERAGE_UNLOCK_SEQUENCE {
            self.bus.write_register(reg::AVERAGE_UNLOCK, key)?;
        }
        let value = if enabled { MOVING_AVERAGE_BIT } else { 0 };
        self.bus.write_register(reg::AVERAGE, value)?;
        self.bus.write_register(reg::AVERAGE_UNLOCK, AVERAGE_LOCK)?;

        let mut average = [0u8];
        self.bus.read_registers(reg::AVERAGE, &mut average)?;
        self.moving_average = average[0] & MOVING_AVERAGE_BIT != 0;
        Ok(())
    }

    pub fn release(self) -> B {
        self.bus
    }
}

impl<B: SensorBus> PixelSource for Amg88xx<B> {
    fn read_frame(&mut self, raw: &mut [u8; RAW_FRAME_LEN]) -> Result<()> {
        self.bus.read_registers(reg::PIXELS, raw)
    }

    fn read_thermistor(&mut self) -> Result<f64> {
        let mut raw = [0u8; 2];
        self.bus.read_registers(reg::THERMISTOR, &mut raw)?;
        Ok(thermistor_deg_c(raw))
    }
}

/// Sensor handle shared between callers.
///
/// Every read holds the lock for one whole acquire-decode-convert sequence,
/// so no caller sees a half-updated frame.
pub struct SharedSensor<S> {
    inner: Mutex<RefCell<Option<S>>>,
}

impl<S> Default for SharedSensor<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SharedSensor<S> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    pub fn install(&self, sensor: S) -> Option<S> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(sensor))
    }

    pub fn take(&self) -> Option<S> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> Result<R>) -> Result<R> {
        critical_section::with(|cs| {
            let mut slot = self.inner.borrow_ref_mut(cs);
            let sensor = slot.as_mut().ok_or(Error::SensorUnavailable)?;
            f(sensor)
        })
    }
}

impl<S: PixelSource> SharedSensor<S> {
    pub fn read_grid(&self) -> Result<Grid> {
        self.with(|sensor| {
            let mut raw = [0u8; RAW_FRAME_LEN];
            sensor.read_frame(&mut raw)?;
            Ok(Grid::from_raw(&raw))
        })
    }

    pub fn read_view(&self, unit: Unit) -> Result<[[f64; GRID_COLS]; GRID_ROWS]> {
        self.with(|sensor| {
            let mut raw = [0u8; RAW_FRAME_LEN];
            sensor.read_frame(&mut raw)?;
            Ok(Grid::from_raw(&raw).view(unit).to_array())
        })
    }

    pub fn read_stats(&self, unit: Unit) -> Result<Stats> {
        Ok(self.read_grid()?.stats(unit))
    }

    /// The range is checked before the bus is touched.
    pub fn read_bitmap(&self, range: &DegreeRange) -> Result<Bitmap> {
        range.validate()?;
        self.read_grid()?.to_bitmap(range)
    }

    pub fn read_thermistor(&self) -> Result<f64> {
        self.with(|sensor| sensor.read_thermistor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::vec::Vec;

    struct FakeBus {
        registers: [u8; 256],
        writes: Vec<(u8, u8)>,
        slept_ms: u32,
        fail: bool,
    }

    impl SensorBus for FakeBus {
        fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
            if self.fail {
                return Err(Error::Bus("nack"));
            }
            let start = reg as usize;
            buf.copy_from_slice(&self.registers[start..start + buf.len()]);
            Ok(())
        }

        fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
            if self.fail {
                return Err(Error::Bus("nack"));
            }
            self.writes.push((reg, value));
            if reg != reg::AVERAGE_UNLOCK {
                self.registers[reg as usize] = value;
            }
            Ok(())
        }

        fn delay_ms(&mut self, ms: u32) {
            self.slept_ms += ms;
        }
    }

    impl Default for FakeBus {
        fn default() -> Self {
            Self {
                registers: [0; 256],
                writes: Vec::new(),
                slept_ms: 0,
                fail: false,
            }
        }
    }

    fn sensor_with_pixels(q: i16) -> Amg88xx<FakeBus> {
        let mut bus = FakeBus::default();
        for cell in bus.registers[0x80..].chunks_exact_mut(2) {
            cell.copy_from_slice(&q.to_le_bytes());
        }
        bus.registers[reg::THERMISTOR as usize] = 0x90;
        bus.registers[reg::THERMISTOR as usize + 1] = 0x01;
        Amg88xx::new(bus).unwrap()
    }

    #[test]
    fn init_wakes_and_resets() {
        let sensor = sensor_with_pixels(0);
        assert_eq!(sensor.power_mode(), PowerMode::Normal);
        assert!(!sensor.moving_average());
        let bus = sensor.release();
        assert_eq!(bus.writes, [(0x00, 0x00), (0x01, 0x3f)]);
        assert_eq!(bus.slept_ms, SETTLE_MS);
    }

    #[test]
    fn moving_average_uses_unlock_sequence() {
        let mut sensor = sensor_with_pixels(0);
        sensor.set_moving_average(true).unwrap();
        assert!(sensor.moving_average());
        let bus = sensor.release();
        assert_eq!(
            &bus.writes[2..],
            &[(0x1f, 0x50), (0x1f, 0x45), (0x1f, 0x57), (0x07, 0x20), (0x1f, 0x00)]
        );
    }

    #[test]
    fn sleep_and_wake() {
        let mut sensor = sensor_with_pixels(0);
        sensor.sleep().unwrap();
        assert_eq!(sensor.power_mode(), PowerMode::Sleep);
        sensor.wake().unwrap();
        assert_eq!(sensor.power_mode(), PowerMode::Normal);
        assert_eq!(sensor.release().slept_ms, 2 * SETTLE_MS);
    }

    #[test]
    fn frame_rate_values() {
        assert_eq!(FrameRate::try_from(10).unwrap(), FrameRate::Fps10);
        assert_eq!(FrameRate::try_from(1).unwrap(), FrameRate::Fps1);
        assert_eq!(FrameRate::try_from(5), Err(Error::InvalidFrameRate(5)));

        let mut sensor = sensor_with_pixels(0);
        sensor.set_frame_rate(FrameRate::Fps1).unwrap();
        assert_eq!(sensor.release().registers[reg::FRAME_RATE as usize], 1);
    }

    #[test]
    fn thermistor_sixteenths() {
        assert_relative_eq!(thermistor_deg_c([0x90, 0x01]), 25.0);
        let shared = SharedSensor::new();
        shared.install(sensor_with_pixels(0));
        assert_relative_eq!(shared.read_thermistor().unwrap(), 25.0);
    }

    #[test]
    fn shared_read_paths() {
        let shared = SharedSensor::new();
        shared.install(sensor_with_pixels(100));

        let grid = shared.read_grid().unwrap();
        assert!(grid.iter().all(|q| q == 100));
        assert_eq!(shared.read_view(Unit::Celsius).unwrap(), [[25.0; 8]; 8]);
        assert_relative_eq!(
            shared.read_stats(Unit::Kelvin).unwrap().average,
            298.15,
            epsilon = 1e-9
        );

        let bmp = shared.read_bitmap(&DegreeRange::default()).unwrap();
        assert_eq!(bmp.len(), 1142);
        assert_eq!(bmp[1078], 80);
    }

    #[test]
    fn empty_slot_is_transport_error() {
        let shared: SharedSensor<Amg88xx<FakeBus>> = SharedSensor::new();
        let err = shared.read_grid().unwrap_err();
        assert_eq!(err, Error::SensorUnavailable);
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }

    #[test]
    fn lock_released_after_failure() {
        let shared = SharedSensor::new();
        shared.install(sensor_with_pixels(40));
        shared.with(|s| {
            s.bus.fail = true;
            Ok(())
        })
        .unwrap();
        assert_eq!(shared.read_grid().unwrap_err(), Error::Bus("nack"));

        shared.with(|s| {
            s.bus.fail = false;
            Ok(())
        })
        .unwrap();
        assert_eq!(shared.read_grid().unwrap().get(7, 7), 40);
    }

    #[test]
    fn bad_range_never_reads() {
        let shared = SharedSensor::new();
        shared.install(sensor_with_pixels(40));
        shared.with(|s| {
            s.bus.fail = true;
            Ok(())
        })
        .unwrap();
        let range = DegreeRange { min_deg: 5.0, max_deg: 5.0 };
        assert!(matches!(
            shared.read_bitmap(&range),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn concurrent_readers_see_whole_frames() {
        use std::sync::Arc;

        struct Alternating {
            next: i16,
        }

        impl PixelSource for Alternating {
            fn read_frame(&mut self, raw: &mut [u8; RAW_FRAME_LEN]) -> Result<()> {
                for cell in raw.chunks_exact_mut(2) {
                    cell.copy_from_slice(&self.next.to_le_bytes());
                    std::thread::yield_now();
                }
                self.next = if self.next == 0 { 400 } else { 0 };
                Ok(())
            }

            fn read_thermistor(&mut self) -> Result<f64> {
                Ok(0.0)
            }
        }

        let shared = Arc::new(SharedSensor::new());
        shared.install(Alternating { next: 0 });
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let stats = shared.read_stats(Unit::Quantized).unwrap();
                        assert_eq!(stats.min, stats.max);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
