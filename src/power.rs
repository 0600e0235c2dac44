//! Power Readings
//!
//! Converts the raw battery and temperature ADC readings carried in the
//! status record into physical units for display.

use crate::config::ADC_BITS;
use crate::radio::status::Status;

/// ADC reference voltage
pub const ADC_VREF: f32 = 3.3;

/// VSYS divider feeding the battery ADC input
pub const VSYS_DIVIDER: f32 = 3.0;

/// Sensor voltage at 27 °C
const TEMP_SENSOR_V27: f32 = 0.706;

/// Sensor slope, volts per °C
const TEMP_SENSOR_SLOPE: f32 = 0.001_721;

#[allow(clippy::cast_precision_loss)]
fn raw_to_volts(raw: u16) -> f32 {
    f32::from(raw) * ADC_VREF / ((1u32 << ADC_BITS) - 1) as f32
}

/// Battery voltage reading
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatteryVoltage {
    /// Raw ADC reading (12-bit)
    raw: u16,
}

impl BatteryVoltage {
    /// Create from ADC reading
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    /// Raw ADC reading
    #[must_use]
    pub const fn raw(&self) -> u16 {
        self.raw
    }

    /// Get voltage in volts
    #[must_use]
    pub fn voltage(&self) -> f32 {
        raw_to_volts(self.raw) * VSYS_DIVIDER
    }

    /// Charge estimate for a single Li-ion cell, 3.0 V to 4.2 V
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percentage(&self) -> u8 {
        let v = self.voltage();
        let pct = ((v - 3.0) / 1.2 * 100.0).clamp(0.0, 100.0);
        pct as u8
    }

    /// Check if battery is low
    #[must_use]
    pub fn is_low(&self) -> bool {
        self.voltage() < 3.3
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for BatteryVoltage {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn format(&self, f: defmt::Formatter) {
        let v = self.voltage();
        let whole = v as u32;
        let frac = ((v - whole as f32) * 100.0) as u32;
        defmt::write!(f, "{}.{=u32:02}V", whole, frac);
    }
}

/// On-die temperature sensor reading
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Temperature {
    raw: u16,
}

impl Temperature {
    /// Create from ADC reading
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    /// Sensor voltage
    #[must_use]
    pub fn sensor_volts(&self) -> f32 {
        raw_to_volts(self.raw)
    }

    /// Get temperature in Celsius
    #[must_use]
    pub fn celsius(&self) -> f32 {
        27.0 - (self.sensor_volts() - TEMP_SENSOR_V27) / TEMP_SENSOR_SLOPE
    }

    /// Get temperature in Fahrenheit
    #[must_use]
    pub fn fahrenheit(&self) -> f32 {
        self.celsius() * 9.0 / 5.0 + 32.0
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Temperature {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn format(&self, f: defmt::Formatter) {
        let c = self.celsius();
        let whole = c as i32;
        let frac = ((c - whole as f32).abs() * 10.0) as u32;
        defmt::write!(f, "{}.{}C", whole, frac);
    }
}

/// Both readings from one status record
#[must_use]
pub const fn readings(status: &Status) -> (BatteryVoltage, Temperature) {
    (
        BatteryVoltage::from_raw(status.battery_raw),
        Temperature::from_raw(status.temperature_raw),
    )
}
