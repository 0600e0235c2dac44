//! USB CDC ACM (Serial) Implementation
//!
//! Provides the virtual serial port carrying the memory upload protocol,
//! exposed as an `embedded-io-async` byte stream.

use embassy_usb::class::cdc_acm::{CdcAcmClass, State};
use embassy_usb::driver::Driver;
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};

use crate::config::USB_CDC_PACKET_SIZE;

/// Largest payload sent per packet; one short of a full packet so no
/// zero-length terminator is needed
const TX_CHUNK: usize = USB_CDC_PACKET_SIZE as usize - 1;

/// CDC ACM state
pub struct CdcState<'d> {
    state: State<'d>,
}

impl Default for CdcState<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d> CdcState<'d> {
    /// Create new CDC state
    #[must_use]
    pub fn new() -> Self {
        Self { state: State::new() }
    }

    /// Get reference to state for class creation
    pub fn state_mut(&mut self) -> &mut State<'d> {
        &mut self.state
    }
}

/// The host closed the port or the bus was reset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Disconnected;

impl embedded_io_async::Error for Disconnected {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NotConnected
    }
}

impl defmt::Format for Disconnected {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Disconnected");
    }
}

/// Byte stream over a CDC ACM class
pub struct CdcStream<'d, D: Driver<'d>> {
    class: CdcAcmClass<'d, D>,
    packet: [u8; USB_CDC_PACKET_SIZE as usize],
    start: usize,
    end: usize,
}

impl<'d, D: Driver<'d>> CdcStream<'d, D> {
    /// Wrap a CDC ACM class
    #[must_use]
    pub fn new(class: CdcAcmClass<'d, D>) -> Self {
        Self {
            class,
            packet: [0; USB_CDC_PACKET_SIZE as usize],
            start: 0,
            end: 0,
        }
    }

    /// Wait until the host opens the port
    pub async fn wait_connection(&mut self) {
        self.class.wait_connection().await;
        self.start = 0;
        self.end = 0;
    }
}

impl<'d, D: Driver<'d>> ErrorType for CdcStream<'d, D> {
    type Error = Disconnected;
}

impl<'d, D: Driver<'d>> Read for CdcStream<'d, D> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.start == self.end {
            self.end = self
                .class
                .read_packet(&mut self.packet)
                .await
                .map_err(|_| Disconnected)?;
            self.start = 0;
        }
        let n = buf.len().min(self.end - self.start);
        buf[..n].copy_from_slice(&self.packet[self.start..self.start + n]);
        self.start += n;
        Ok(n)
    }
}

impl<'d, D: Driver<'d>> Write for CdcStream<'d, D> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(TX_CHUNK);
        self.class
            .write_packet(&buf[..n])
            .await
            .map_err(|_| Disconnected)?;
        Ok(n)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// USB device descriptor strings
pub struct UsbStrings {
    /// Manufacturer name
    pub manufacturer: &'static str,
    /// Product name
    pub product: &'static str,
    /// Serial number
    pub serial: &'static str,
}

impl Default for UsbStrings {
    fn default() -> Self {
        Self {
            manufacturer: "PicoRX",
            product: "PicoRX SDR Receiver",
            serial: "0001",
        }
    }
}

/// USB device info for descriptor
#[derive(Clone, Copy, Debug)]
pub struct UsbDeviceInfo {
    /// Vendor ID
    pub vid: u16,
    /// Product ID
    pub pid: u16,
    /// Device release number
    pub device_release: u16,
}

impl Default for UsbDeviceInfo {
    fn default() -> Self {
        Self {
            vid: crate::config::USB_VID,
            pid: crate::config::USB_PID,
            device_release: 0x0100,
        }
    }
}

impl UsbDeviceInfo {
    /// Device configuration with these identifiers and `strings`
    #[must_use]
    pub fn config(&self, strings: &UsbStrings) -> embassy_usb::Config<'static> {
        let mut config = embassy_usb::Config::new(self.vid, self.pid);
        config.manufacturer = Some(strings.manufacturer);
        config.product = Some(strings.product);
        config.serial_number = Some(strings.serial);
        config.device_release = self.device_release;
        config.max_power = 100;
        config.max_packet_size_0 = 64;
        config
    }
}

impl defmt::Format for UsbDeviceInfo {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "USB({=u16:04X}:{=u16:04X})", self.vid, self.pid);
    }
}
