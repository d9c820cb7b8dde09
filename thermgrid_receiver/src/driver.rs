use esp_hal::{
    clock::ClockControl,
    delay::Delay,
    gpio::Io,
    peripherals::{Peripherals, UART1},
    system::SystemControl,
    uart::Uart,
    Blocking,
};
use fugit::MicrosDurationU32;
use thermgrid_util::{Error, Packet, PacketSource, Result, MAX_PACKET_LEN};

const POLL_INTERVAL: MicrosDurationU32 = MicrosDurationU32::micros(10);
const BYTE_TIMEOUT: MicrosDurationU32 = MicrosDurationU32::millis(20);

/// Packets from the radio modem, framed as `[len][payload]` on UART1.
pub struct RadioSource<'a> {
    uart: Uart<'a, UART1, Blocking>,
    delay: Delay,
    arrivals: u32,
}

pub fn init() -> Result<RadioSource<'static>> {
    let peripherals = Peripherals::take();
    let system = SystemControl::new(peripherals.SYSTEM);
    let clocks = ClockControl::max(system.clock_control).freeze();

    let io = Io::new(peripherals.GPIO, peripherals.IO_MUX);
    let tx = io.pins.gpio17;
    let rx = io.pins.gpio18;
    let uart = Uart::new(peripherals.UART1, &clocks, tx, rx).map_err(|_| Error::Bus("uart init"))?;

    Ok(RadioSource {
        uart,
        delay: Delay::new(&clocks),
        arrivals: 0,
    })
}

impl RadioSource<'_> {
    fn read_byte(&mut self) -> Option<u8> {
        for _ in 0..BYTE_TIMEOUT.ticks() / POLL_INTERVAL.ticks() {
            if let Ok(byte) = self.uart.read_byte() {
                return Some(byte);
            }
            self.delay.delay_micros(POLL_INTERVAL.ticks());
        }
        None
    }
}

impl PacketSource for RadioSource<'_> {
    fn receive(&mut self) -> Result<Option<Packet>> {
        let Some(len) = self.read_byte() else {
            return Ok(None);
        };

        let mut buf = [0u8; MAX_PACKET_LEN];
        for i in 0..len as usize {
            let Some(byte) = self.read_byte() else {
                log::debug!("packet cut short after {} of {} bytes", i, len);
                return Ok(None);
            };
            // oversized packets are kept truncated so their tag still shows up
            if i < MAX_PACKET_LEN {
                buf[i] = byte;
            }
        }

        let packet = Packet::new(&buf[..(len as usize).min(MAX_PACKET_LEN)], self.arrivals)?;
        self.arrivals = self.arrivals.wrapping_add(1);
        Ok(Some(packet))
    }
}
