//! ADC Front End
//!
//! Acquires RF/IF sample blocks from ADC0 by DMA at 500 kHz and reads the
//! battery and temperature channels between blocks.

use embassy_rp::adc::{Adc, Async, Channel};
use embassy_rp::dma;
use embassy_rp::{Peripheral, PeripheralRef};

use super::lo::LocalOscillator;
use crate::config::pins::ADC_CLOCK_DIV;
use crate::config::{ADC_BLOCK_SIZE, ADC_MAX};
use crate::log::warn;
use crate::radio::receiver::{Frontend, Housekeeping};

/// ADC reading result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdcReading {
    /// Raw 12-bit ADC value (0-4095)
    raw: u16,
}

impl AdcReading {
    /// Create a new ADC reading from raw value
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    /// Get the raw 12-bit value
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.raw
    }
}

impl defmt::Format for AdcReading {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ADC({})", self.raw);
    }
}

/// Receiver front end: sampler, housekeeping channels and the LO
pub struct AdcFrontend<'d, D: dma::Channel> {
    adc: Adc<'d, Async>,
    rf: Channel<'d>,
    battery: Channel<'d>,
    temperature: Channel<'d>,
    dma: PeripheralRef<'d, D>,
    lo: LocalOscillator<'d>,
    last: Housekeeping,
}

impl<'d, D: dma::Channel> AdcFrontend<'d, D> {
    /// Assemble the front end from configured channels
    pub fn new(
        adc: Adc<'d, Async>,
        rf: Channel<'d>,
        battery: Channel<'d>,
        temperature: Channel<'d>,
        dma: impl Peripheral<P = D> + 'd,
        lo: LocalOscillator<'d>,
    ) -> Self {
        Self {
            adc,
            rf,
            battery,
            temperature,
            dma: dma.into_ref(),
            lo,
            last: Housekeeping::default(),
        }
    }

    /// One conversion; a failed read keeps the previous value
    fn read(&mut self, which: Housekeeper) -> AdcReading {
        let (channel, previous) = match which {
            Housekeeper::Battery => (&mut self.battery, self.last.battery_raw),
            Housekeeper::Temperature => (&mut self.temperature, self.last.temperature_raw),
        };
        match self.adc.blocking_read(channel) {
            Ok(raw) => AdcReading::from_raw(raw),
            Err(error) => {
                warn!("adc {} read failed: {}", which, error);
                AdcReading::from_raw(previous)
            }
        }
    }
}

#[derive(Clone, Copy, defmt::Format)]
enum Housekeeper {
    Battery,
    Temperature,
}

impl<D: dma::Channel> Frontend for AdcFrontend<'_, D> {
    #[allow(clippy::cast_sign_loss)]
    async fn acquire(&mut self, block: &mut [u16; ADC_BLOCK_SIZE]) {
        let result = self
            .adc
            .read_many(&mut self.rf, &mut block[..], ADC_CLOCK_DIV, self.dma.reborrow())
            .await;
        if result.is_err() {
            warn!("adc block dropped");
            block.fill(ADC_MAX as u16);
        }
    }

    fn tune(&mut self, lo_hz: u32) {
        self.lo.set_frequency(lo_hz);
    }

    fn housekeeping(&mut self) -> Housekeeping {
        self.last = Housekeeping {
            battery_raw: self.read(Housekeeper::Battery).raw(),
            temperature_raw: self.read(Housekeeper::Temperature).raw(),
        };
        self.last
    }

    fn halt(&mut self) {
        self.lo.set_enabled(false);
    }

    fn restart(&mut self) {
        self.lo.set_enabled(true);
    }
}
