#![no_std]
#![no_main]

use esp_backtrace as _;
use esp_hal::entry;
use thermgrid_util::Unit;

mod driver;

use driver::SENSOR;

// Thermistor is logged once every this many frames.
const THERMISTOR_EVERY: u32 = 50;

#[entry]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    log::info!("Starting");

    let delay = match driver::init() {
        Ok(delay) => delay,
        Err(e) => panic!("init failed: {}", e),
    };

    let mut frames: u32 = 0;
    loop {
        match SENSOR.read_grid() {
            Ok(grid) => {
                let stats = grid.stats(Unit::Celsius);
                log::info!(
                    "frame {} min {:.2} max {:.2} mean {:.2} degC",
                    frames,
                    stats.min,
                    stats.max,
                    stats.average
                );
                if let Err(e) = driver::transmit(&grid) {
                    log::warn!("transmit failed: {}", e);
                }
            }
            Err(e) => log::warn!("sensor read failed: {}", e),
        }

        if frames % THERMISTOR_EVERY == 0 {
            match SENSOR.read_thermistor() {
                Ok(deg_c) => log::info!("thermistor {:.2} degC", deg_c),
                Err(e) => log::warn!("thermistor read failed: {}", e),
            }
        }

        frames = frames.wrapping_add(1);
        delay.delay_millis(driver::FRAME_RATE.period_ms());
    }
}
