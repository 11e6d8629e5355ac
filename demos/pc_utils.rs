use std::cell::RefCell;
use std::io;
use std::time::{Duration, Instant};

use embedded_hal::serial::{Read, Write};
use serialport::prelude::*;
use tracing_subscriber::EnvFilter;
use zw101::Clock;

// We're cheating here and will use the host OS's serial port
// as our UART, and for that we have to implement the read/write
// interfaces from embedded-hal.

pub const DEFAULT_BAUD_RATE: u32 = 57600;

pub struct SerialReader<'a>(pub &'a RefCell<Box<dyn SerialPort>>);
pub struct SerialWriter<'a>(pub &'a RefCell<Box<dyn SerialPort>>);

impl Read<u8> for SerialReader<'_> {
    type Error = io::Error;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let mut buf: [u8; 1] = [0u8];
        return match self.0.borrow_mut().read(&mut buf) {
            Ok(1) => Ok(buf[0]),
            Ok(_) => Err(nb::Error::WouldBlock),
            // The driver keeps its own deadline; a port timeout only means "nothing yet".
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        };
    }
}

impl Write<u8> for SerialWriter<'_> {
    type Error = io::Error;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        let buf: [u8; 1] = [word];
        loop {
            match self.0.borrow_mut().write(&buf) {
                Ok(n) => if n == 1 {
                    return Ok(());
                },
                Err(e) => {
                    return Err(nb::Error::from(e));
                }
            }
        }
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        return match self.0.borrow_mut().flush() {
            Ok(_) => Ok(()),
            Err(e) => Err(nb::Error::from(e)),
        };
    }
}

/// Milliseconds since the program started.
pub struct StdClock(Instant);

impl StdClock {
    pub fn new() -> Self {
        StdClock(Instant::now())
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u32 {
        return self.0.elapsed().as_millis() as u32;
    }
}

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

pub fn print_ports() {
    let ports = serialport::available_ports().unwrap();
    for port in ports {
        println!("Available port: {} ({:#?})", port.port_name, port.port_type);
    }
}

pub fn get_configured_serial_port(port_name: &str, baud_rate: u32) -> serialport::Result<Box<dyn SerialPort>> {
    println!("Using port {} at {} baud", port_name, baud_rate);
    return serialport::open(port_name).map(|mut port| {
        port.set_baud_rate(baud_rate).unwrap();
        port.set_timeout(Duration::from_millis(10)).unwrap();
        return port;
    });
}

#[allow(dead_code)]
// This allows us to share code between different PC-based examples.
// There's probably a better way to do it!
fn main() {}
