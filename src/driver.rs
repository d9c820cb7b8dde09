use core::cell::RefCell;
use critical_section::Mutex;
use esp_hal::{
    clock::ClockControl,
    delay::Delay,
    gpio::Io,
    i2c::I2C,
    peripherals::{Peripherals, I2C0, UART1},
    system::SystemControl,
    uart::Uart,
    Blocking,
};
use fugit::HertzU32;
use thermgrid_util::{
    encode_row,
    sensor::{self, SensorBus},
    Amg88xx, Error, FrameRate, Grid, Result, SharedSensor, ROW_PAYLOAD_LEN,
};

const I2C_FREQUENCY: HertzU32 = HertzU32::kHz(400);
pub const FRAME_RATE: FrameRate = FrameRate::Fps10;

pub type Sensor = Amg88xx<Bus<'static>>;

pub static SENSOR: SharedSensor<Sensor> = SharedSensor::new();
static RADIO: Mutex<RefCell<Option<Radio>>> = Mutex::new(RefCell::new(None));

pub struct Bus<'a> {
    i2c: I2C<'a, I2C0, Blocking>,
    delay: Delay,
}

impl SensorBus for Bus<'_> {
    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        self.i2c
            .write_read(sensor::DEFAULT_ADDRESS, &[reg], buf)
            .map_err(|_| Error::Bus("i2c read"))
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        self.i2c
            .write(sensor::DEFAULT_ADDRESS, &[reg, value])
            .map_err(|_| Error::Bus("i2c write"))
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_millis(ms);
    }
}

/// Serial link to the radio modem. Each packet goes out as `[len][payload]`.
pub struct Radio<'a> {
    uart: Uart<'a, UART1, Blocking>,
}

pub fn init() -> Result<Delay> {
    let peripherals = Peripherals::take();
    let system = SystemControl::new(peripherals.SYSTEM);
    let clocks = ClockControl::max(system.clock_control).freeze();
    let delay = Delay::new(&clocks);

    let io = Io::new(peripherals.GPIO, peripherals.IO_MUX);

    let sda = io.pins.gpio8;
    let scl = io.pins.gpio9;
    let i2c = I2C::new(peripherals.I2C0, sda, scl, I2C_FREQUENCY, &clocks);

    let mut amg = Amg88xx::new(Bus { i2c, delay })?;
    amg.set_frame_rate(FRAME_RATE)?;
    SENSOR.install(amg);

    let tx = io.pins.gpio17;
    let rx = io.pins.gpio18;
    let uart = Uart::new(peripherals.UART1, &clocks, tx, rx).map_err(|_| Error::Bus("uart init"))?;

    critical_section::with(|cs| {
        RADIO.borrow_ref_mut(cs).replace(Radio { uart });
    });

    Ok(delay)
}

pub fn transmit(grid: &Grid) -> Result<()> {
    for (row_id, cells) in grid.cells().iter().enumerate() {
        let payload = encode_row(row_id as u8, cells);
        send(&payload)?;
    }
    Ok(())
}

fn send(payload: &[u8; ROW_PAYLOAD_LEN]) -> Result<()> {
    critical_section::with(|cs| {
        let mut radio = RADIO.borrow_ref_mut(cs);
        let radio = radio.as_mut().ok_or(Error::Bus("radio not initialised"))?;
        radio
            .uart
            .write_bytes(&[ROW_PAYLOAD_LEN as u8])
            .and_then(|_| radio.uart.write_bytes(payload))
            .map_err(|_| Error::Bus("uart write"))?;
        Ok(())
    })
}
