//! PWM Audio Output
//!
//! Audio leaves through one PWM slice running at the audio sample rate. A
//! DMA channel paced by the slice's wrap request writes one compare value
//! per period.

use embassy_rp::dma::{self, Channel as _};
use embassy_rp::pac;
use embassy_rp::pwm::{Config, Pwm};
use embassy_rp::{Peripheral, PeripheralRef};

use crate::config::pins::AUDIO_PWM_TOP;
use crate::config::AUDIO_PER_BLOCK;
use crate::radio::receiver::AudioSink;

/// PWM slice driving the audio pin
const AUDIO_SLICE: usize = 0;

/// PWM compare value
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DutyCycle(u16);

impl DutyCycle {
    /// Silence: half of the counter range
    pub const MID: Self = Self(AUDIO_PWM_TOP / 2);

    /// Map a signed sample onto `0..=AUDIO_PWM_TOP`
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn from_sample(sample: i16) -> Self {
        let top = AUDIO_PWM_TOP as i32;
        let offset = (sample as i32 * (top + 1)) >> 16;
        Self((top / 2 + offset) as u16)
    }

    /// Get raw compare value
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self::MID
    }
}

impl defmt::Format for DutyCycle {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}/{}", self.0, AUDIO_PWM_TOP);
    }
}

/// DMA-fed PWM audio sink
pub struct PwmAudioSink<'d, D: dma::Channel> {
    pwm: Pwm<'d>,
    config: Config,
    dma: PeripheralRef<'d, D>,
    buffer: [u32; AUDIO_PER_BLOCK],
}

impl<'d, D: dma::Channel> PwmAudioSink<'d, D> {
    /// Configure `pwm` (slice 0, output A) for audio
    pub fn new(pwm: Pwm<'d>, dma: impl Peripheral<P = D> + 'd) -> Self {
        let mut config = Config::default();
        config.top = AUDIO_PWM_TOP;
        config.compare_a = DutyCycle::MID.raw();
        let mut sink = Self {
            pwm,
            config,
            dma: dma.into_ref(),
            buffer: [u32::from(DutyCycle::MID.raw()); AUDIO_PER_BLOCK],
        };
        sink.pwm.set_config(&sink.config);
        sink
    }
}

impl<D: dma::Channel> AudioSink for PwmAudioSink<'_, D> {
    async fn play(&mut self, samples: &[i16; AUDIO_PER_BLOCK]) {
        for (dst, &sample) in self.buffer.iter_mut().zip(samples) {
            *dst = u32::from(DutyCycle::from_sample(sample).raw());
        }
        let target = pac::PWM.ch(AUDIO_SLICE).cc().as_ptr().cast::<u32>();
        // SAFETY: the compare register is a valid word-sized MMIO target and
        // the buffer outlives the transfer, which is awaited here.
        let transfer = unsafe {
            dma::write(
                self.dma.reborrow(),
                &self.buffer[..],
                target,
                pac::dma::vals::TreqSel::PWM_WRAP0,
            )
        };
        transfer.await;
    }

    fn halt(&mut self) {
        self.dma.abort();
        self.config.compare_a = DutyCycle::MID.raw();
        self.pwm.set_config(&self.config);
    }

    fn restart(&mut self) {
        self.pwm.set_config(&self.config);
    }
}
