//! System configuration and hardware constants
//!
//! This module defines compile-time constants for the receiver hardware.
//! Sample rates, the fixed filter chain, S-meter calibration and the flash
//! layout are centralized here. Derived values are computed in `const`
//! context so nothing is recomputed at run time.

use crate::types::{AgcSpeed, Bandwidth, Mode, TuningStep};

/// System clock frequency (RP2040 @ 125 MHz)
pub const SYSTEM_CLOCK_HZ: u32 = 125_000_000;

/// ADC sample rate
pub const ADC_SAMPLE_RATE: u32 = 500_000;

/// Audio output rate (PWM update rate after interpolation)
pub const AUDIO_SAMPLE_RATE: u32 = ADC_SAMPLE_RATE / 2;

/// ADC resolution in bits
pub const ADC_BITS: u32 = 12;

/// Half-scale ADC code, also the signed full-scale magnitude
pub const ADC_MAX: i32 = 1 << (ADC_BITS - 1);

/// Samples per acquisition block
pub const ADC_BLOCK_SIZE: usize = 2048;

/// Total decimation from the ADC rate to baseband
pub const DECIMATION_RATE: usize = 32;

/// Baseband (demodulator) sample rate
pub const BASEBAND_SAMPLE_RATE: u32 = ADC_SAMPLE_RATE / DECIMATION_RATE as u32;

/// IF offset removed by the frequency shift stage
///
/// The LO is programmed this far below the tuned frequency.
pub const IF_OFFSET_HZ: u32 = ADC_SAMPLE_RATE / 4;

/// Complex samples per block at the CIC output
pub const CIC_OUTPUT_PER_BLOCK: usize = ADC_BLOCK_SIZE / cic::DECIMATION;

/// Baseband samples per block
pub const BASEBAND_PER_BLOCK: usize = ADC_BLOCK_SIZE / DECIMATION_RATE;

/// Audio output samples per block
pub const AUDIO_PER_BLOCK: usize = BASEBAND_PER_BLOCK * cic::INTERPOLATION;

/// Number of spectrum bins published in the status record
pub const SPECTRUM_BINS: usize = 128;

/// CIC output level mapped to 1.0 in the floating point stages
///
/// Twice the full-scale CIC output, leaving 6 dB of headroom for the
/// fixed-point half-band filter.
pub const BASEBAND_FULL_SCALE: f32 = 16384.0;

/// Control core tick rate
pub const UI_TICK_HZ: u32 = 10;

/// Quiet ticks after the last tuning change before the frequency is autosaved
pub const AUTOSAVE_QUIET_TICKS: u8 = 10;

/// Longest accepted line in the memory upload protocol
pub const UPLOAD_LINE_LEN: usize = 64;

/// USB VID (use test VID for development)
pub const USB_VID: u16 = 0x1209;

/// USB PID (get from pid.codes for production)
pub const USB_PID: u16 = 0x0001;

/// USB CDC ACM packet size
pub const USB_CDC_PACKET_SIZE: u16 = 64;

/// Default startup frequency (AM broadcast band)
pub const DEFAULT_FREQUENCY_HZ: u32 = 1_215_000;

/// Default operating mode
pub const DEFAULT_MODE: Mode = Mode::Am;

/// Default tuning step
pub const DEFAULT_TUNING_STEP: TuningStep = TuningStep::KHz1;

/// Default AGC speed
pub const DEFAULT_AGC_SPEED: AgcSpeed = AgcSpeed::Normal;

/// Default bandwidth
pub const DEFAULT_BANDWIDTH: Bandwidth = Bandwidth::Normal;

/// Default CW sidetone in units of 100 Hz
pub const DEFAULT_CW_SIDETONE: u8 = 10;

/// Default volume (0-9)
pub const DEFAULT_VOLUME: u8 = 5;

/// Cascaded integrator-comb filter parameters
pub mod cic {
    //! Fixed CIC parameters and the gain/bias terms derived from them.

    use crate::dsp::cic::CicScaling;

    /// Filter order (number of integrator/comb pairs)
    pub const ORDER: usize = 4;

    /// CIC decimation factor
    pub const DECIMATION: usize = super::DECIMATION_RATE / 2;

    /// CIC interpolation factor for audio reconstruction
    pub const INTERPOLATION: usize = super::DECIMATION_RATE / 2;

    /// Extra output bits kept beyond the ADC resolution
    pub const EXTRA_BITS: u32 = 2;

    /// `ceil(ORDER * log2(DECIMATION))`
    pub const BIT_GROWTH: u32 = crate::dsp::cic::bit_growth(ORDER, DECIMATION);

    /// Decimator output scaling
    ///
    /// The frequency shift ahead of the decimator floors its products, so
    /// the bias also cancels that stage's mean error of half an input LSB.
    pub const DECIMATOR_SCALING: CicScaling = CicScaling::decimator(ORDER, DECIMATION, EXTRA_BITS, true);

    /// Interpolator output scaling (unity DC gain)
    pub const INTERPOLATOR_SCALING: CicScaling = CicScaling::interpolator(ORDER, INTERPOLATION);
}

/// S-meter calibration
pub mod calibration {
    //! Signal strength calibration derived from the ADC bit depth and the
    //! RF front-end gain budget.

    use super::{cic, ADC_MAX};

    /// Magnitude of a full-scale sine at the CIC output
    pub const FULL_SCALE_SIGNAL_STRENGTH: f32 = 0.707 * ADC_MAX as f32 * (1 << cic::EXTRA_BITS) as f32;

    /// RMS power of a full-scale signal into 50 ohms, in mW
    pub const FULL_SCALE_RMS_MW: f32 = (0.5 * 0.707 * 1000.0 * 3.3 * 3.3) / 50.0;

    /// `10 * log10(FULL_SCALE_RMS_MW)`
    #[allow(clippy::cast_possible_truncation)]
    pub const FULL_SCALE_DBM: f32 = {
        // log2 by normalising to [1, 2) and squaring out one bit at a time
        let mut x = FULL_SCALE_RMS_MW as f64;
        let mut log2 = 0.0;
        while x >= 2.0 {
            x /= 2.0;
            log2 += 1.0;
        }
        while x < 1.0 {
            x *= 2.0;
            log2 -= 1.0;
        }
        let mut bit = 0.5;
        while bit > 1e-9 {
            x *= x;
            if x >= 2.0 {
                x /= 2.0;
                log2 += bit;
            }
            bit /= 2.0;
        }
        (10.0 * log2 * core::f64::consts::LOG10_2) as f32
    };

    /// Front-end amplifier gain
    pub const AMPLIFIER_GAIN_DB: f32 = 60.0;

    /// Preamplifier gain
    pub const PREAMPLIFIER_GAIN_DB: f32 = 14.0;

    /// Anti-alias filter insertion gain
    pub const FILTER_GAIN_DB: f32 = -12.0;

    /// S0 reference level
    pub const S0_DBM: f32 = -127.0;

    /// S1 reference level
    pub const S1_DBM: f32 = -121.0;

    /// S9 reference level
    pub const S9_DBM: f32 = -73.0;

    /// S9+10dB reference level
    pub const S9_10_DBM: f32 = -63.0;

    /// dB per S-unit below S9
    pub const DB_PER_S_UNIT: f32 = S1_DBM - S0_DBM;

    /// Factory gain calibration (dB): amplifier, preamplifier and filter
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const DEFAULT_GAIN_CAL_DB: u8 = (AMPLIFIER_GAIN_DB + PREAMPLIFIER_GAIN_DB + FILTER_GAIN_DB) as u8;
}

/// Flash layout
pub mod flash {
    //! Persistent store layout at the top of the program flash.

    /// Total flash size
    pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

    /// Erase granularity
    pub const SECTOR_SIZE: usize = 4096;

    /// Program granularity
    pub const PAGE_SIZE: usize = 256;

    /// Words in one autosave slot or channel record
    pub const RECORD_WORDS: usize = 16;

    /// Bytes in one autosave slot or channel record
    pub const RECORD_BYTES: usize = RECORD_WORDS * 4;

    /// Records per sector
    pub const RECORDS_PER_SECTOR: usize = SECTOR_SIZE / RECORD_BYTES;

    /// Number of autosave slots
    pub const AUTOSAVE_SLOTS: usize = 512;

    /// Autosave log offset within the store region
    pub const AUTOSAVE_OFFSET: usize = 0;

    /// Autosave log size
    pub const AUTOSAVE_SIZE: usize = AUTOSAVE_SLOTS * RECORD_BYTES;

    /// Number of channel records
    pub const CHANNEL_COUNT: usize = 512;

    /// Settings words kept in a channel record
    pub const SETTINGS_TO_STORE: usize = 6;

    /// Channel table offset within the store region
    pub const CHANNEL_OFFSET: usize = AUTOSAVE_OFFSET + AUTOSAVE_SIZE;

    /// Channel table size
    pub const CHANNEL_SIZE: usize = CHANNEL_COUNT * RECORD_BYTES;

    /// Store region size
    pub const REGION_SIZE: usize = AUTOSAVE_SIZE + CHANNEL_SIZE;

    /// Store region offset from the start of flash
    pub const REGION_OFFSET: usize = FLASH_SIZE - REGION_SIZE;

    const _: () = assert!(AUTOSAVE_SIZE % SECTOR_SIZE == 0);
    const _: () = assert!(CHANNEL_SIZE % SECTOR_SIZE == 0);
    const _: () = assert!(PAGE_SIZE % RECORD_BYTES == 0);
}

/// Board wiring and peripheral timing
pub mod pins {
    //! GPIO assignments and clock dividers for the RP2040 board.

    use super::{ADC_SAMPLE_RATE, AUDIO_SAMPLE_RATE, SYSTEM_CLOCK_HZ};

    /// RF/IF input (ADC0)
    pub const RF_ADC_GPIO: u8 = 26;

    /// VSYS/3 battery sense (ADC3)
    pub const BATTERY_ADC_GPIO: u8 = 29;

    /// Audio PWM output (PWM slice 0, channel A)
    pub const AUDIO_PWM_GPIO: u8 = 16;

    /// Local oscillator output (PWM slice 1, channel A)
    pub const LO_GPIO: u8 = 2;

    /// ADC clock feeding the sampler
    pub const ADC_CLOCK_HZ: u32 = 48_000_000;

    /// ADC clock divider for [`ADC_SAMPLE_RATE`]
    #[allow(clippy::cast_possible_truncation)]
    pub const ADC_CLOCK_DIV: u16 = (ADC_CLOCK_HZ / ADC_SAMPLE_RATE - 1) as u16;

    /// PWM counter top for one wrap per audio sample
    #[allow(clippy::cast_possible_truncation)]
    pub const AUDIO_PWM_TOP: u16 = (SYSTEM_CLOCK_HZ / AUDIO_SAMPLE_RATE - 1) as u16;
}

/// Default band lower edge
#[must_use]
pub const fn default_band_min_hz() -> u32 {
    0
}

/// Default band upper edge
#[must_use]
pub const fn default_band_max_hz() -> u32 {
    crate::types::Frequency::MAX_HZ
}
