#![no_std]
#![no_main]

use esp_backtrace as _;
use esp_hal::entry;
use thermgrid_util::{AssemblerConfig, DegreeRange, FrameReceiver, Grid, SplineConfig, Unit};

mod driver;

const UPSAMPLED: usize = 16;

#[entry]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    log::info!("Starting");

    let source = match driver::init() {
        Ok(source) => source,
        Err(e) => panic!("init failed: {}", e),
    };
    let mut receiver = FrameReceiver::new(source, AssemblerConfig::default());

    loop {
        match receiver.next_frame() {
            Ok(grid) => report(&grid),
            Err(e) if e.is_recoverable() => log::debug!("{}", e),
            Err(e) => log::warn!("{}", e),
        }
    }
}

fn report(grid: &Grid) {
    let stats = grid.stats(Unit::Celsius);
    log::info!(
        "frame min {:.2} max {:.2} mean {:.2} degC",
        stats.min,
        stats.max,
        stats.average
    );

    match grid.interpolate::<UPSAMPLED>(Unit::Celsius, &SplineConfig::default()) {
        Ok(up) => {
            let stats = up.stats();
            log::info!(
                "{}x{} min {:.2} max {:.2} mean {:.2} degC",
                UPSAMPLED,
                UPSAMPLED,
                stats.min,
                stats.max,
                stats.average
            );
        }
        Err(e) => log::warn!("interpolation failed: {}", e),
    }

    match grid.to_bitmap(&DegreeRange::default()) {
        Ok(bmp) => log::info!("bitmap {} bytes", bmp.len()),
        Err(e) => log::warn!("bitmap failed: {}", e),
    }
}
