//! Receiver pipeline
//!
//! Runs on the real-time core. Each pass turns one ADC block into one block
//! of audio and publishes a status record:
//!
//! ```text
//!  ADC 500k ─► DC removal ─► fs/4 shift ─► CIC ÷16 ─┬─► spectrum
//!                                                   └─► I/Q swap ─► half-band ÷2
//!  ─► bandwidth LPF ─► strength ─► AGC ─► detector ─► notch ─► squelch/volume
//!  ─► CIC ×16 ─► audio 250k
//! ```
//!
//! Settings are applied only between blocks.
//!
//! Acquisition, processing and playback overlap. While block N is
//! processed the sampler fills the other ADC buffer with block N+1 and the
//! PWM plays the audio of block N-1, so neither DMA stream waits on the
//! DSP:
//!
//! ```text
//!  pass k:   acquire adc[k % 2]    process adc[(k+1) % 2] -> audio[k % 2]
//!            play audio[(k+1) % 2]
//! ```

use embassy_futures::join::join3;
use embassy_time::Instant;
#[cfg(feature = "embedded")]
use micromath::F32Ext;

use embassy_sync::blocking_mutex::raw::RawMutex;

use super::exchange::Exchange;
use super::settings::{Settings, MAX_VOLUME};
use super::status::Status;
use crate::config::{
    cic, ADC_BLOCK_SIZE, ADC_MAX, ADC_SAMPLE_RATE, AUDIO_PER_BLOCK, BASEBAND_FULL_SCALE,
    BASEBAND_PER_BLOCK, BASEBAND_SAMPLE_RATE, CIC_OUTPUT_PER_BLOCK, IF_OFFSET_HZ,
};
use crate::dsp::agc::{Agc, AgcConfig, SignalStrength, Squelch};
use crate::dsp::cic::{CicDecimator, CicInterpolator};
use crate::dsp::demod::{DemodulatorBank, IqSample};
use crate::dsp::filter::{from_sample, ButterworthLowpass, HalfBandDecimator, Sample};
use crate::dsp::notch::AutoNotch;
use crate::dsp::oscillator::Nco;
use crate::dsp::spectrum::SpectrumEstimator;
use crate::log::{debug, info};
use crate::types::{Frequency, Mode};

/// Audio level mapped to full volume
const AUDIO_FULL_SCALE: f32 = 32767.0;

/// Housekeeping readings taken between blocks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Housekeeping {
    /// Raw battery ADC reading
    pub battery_raw: u16,
    /// Raw temperature sensor reading
    pub temperature_raw: u16,
}

/// Sample acquisition and LO control
#[allow(async_fn_in_trait)]
pub trait Frontend {
    /// Fill `block` with the next unsigned 12-bit ADC samples
    ///
    /// Runs alongside [`AudioSink::play`] and the processing of the
    /// previous block.
    async fn acquire(&mut self, block: &mut [u16; ADC_BLOCK_SIZE]);

    /// Program the local oscillator
    fn tune(&mut self, lo_hz: u32);

    /// Read battery and temperature
    fn housekeeping(&mut self) -> Housekeeping;

    /// Stop acquisition ahead of a suspension
    fn halt(&mut self);

    /// Restart acquisition after a suspension
    fn restart(&mut self);
}

/// Audio output
#[allow(async_fn_in_trait)]
pub trait AudioSink {
    /// Play one block of signed audio at the output rate, returning when
    /// the last sample has been handed to the output
    async fn play(&mut self, samples: &[i16; AUDIO_PER_BLOCK]);

    /// Stop output ahead of a suspension
    fn halt(&mut self);

    /// Restart output after a suspension
    fn restart(&mut self);
}

/// Filter and detector state for one pass over a block
struct Chain {
    dc_offset: i32,
    nco: Nco,
    cic_i: CicDecimator<{ cic::ORDER }>,
    cic_q: CicDecimator<{ cic::ORDER }>,
    cic_out: [IqSample; CIC_OUTPUT_PER_BLOCK],
    spectrum: SpectrumEstimator,
    half_band_i: HalfBandDecimator,
    half_band_q: HalfBandDecimator,
    bandwidth_i: ButterworthLowpass,
    bandwidth_q: ButterworthLowpass,
    strength: SignalStrength,
    agc: Agc,
    demod: DemodulatorBank,
    notch: AutoNotch,
    notch_enabled: bool,
    squelch: Squelch,
    interpolator: CicInterpolator<{ cic::ORDER }>,
}

impl Chain {
    fn new(settings: &Settings) -> Self {
        let cutoff = bandwidth_cutoff(settings);
        Self {
            dc_offset: ADC_MAX,
            nco: Nco::new(IF_OFFSET_HZ, ADC_SAMPLE_RATE),
            cic_i: CicDecimator::with_scaling(cic::DECIMATION, cic::DECIMATOR_SCALING),
            cic_q: CicDecimator::with_scaling(cic::DECIMATION, cic::DECIMATOR_SCALING),
            cic_out: [IqSample::default(); CIC_OUTPUT_PER_BLOCK],
            spectrum: SpectrumEstimator::new(),
            half_band_i: HalfBandDecimator::new(),
            half_band_q: HalfBandDecimator::new(),
            bandwidth_i: ButterworthLowpass::new(cutoff),
            bandwidth_q: ButterworthLowpass::new(cutoff),
            strength: SignalStrength::new(),
            agc: Agc::new(AgcConfig::for_speed(settings.agc_speed(), BASEBAND_SAMPLE_RATE)),
            demod: DemodulatorBank::new(
                BASEBAND_SAMPLE_RATE as f32,
                settings.mode(),
                settings.cw_sidetone_hz(),
            ),
            notch: AutoNotch::default(),
            notch_enabled: notch_wanted(settings),
            squelch: Squelch::new(),
            interpolator: CicInterpolator::with_scaling(cic::INTERPOLATION, cic::INTERPOLATOR_SCALING),
        }
    }

    fn configure(&mut self, previous: &Settings, settings: &Settings) {
        if settings.agc_speed() != previous.agc_speed() {
            self.agc
                .set_config(AgcConfig::for_speed(settings.agc_speed(), BASEBAND_SAMPLE_RATE));
        }

        let cutoff = bandwidth_cutoff(settings);
        self.bandwidth_i.set_cutoff(cutoff);
        self.bandwidth_q.set_cutoff(cutoff);

        self.demod.set_mode(settings.mode());
        self.demod.set_sidetone(settings.cw_sidetone_hz());

        let notch = notch_wanted(settings);
        if notch && !self.notch_enabled {
            self.notch.reset();
        }
        self.notch_enabled = notch;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn process_block(
        &mut self,
        settings: &Settings,
        status: &mut Status,
        adc: &[u16],
        audio: &mut [i16; AUDIO_PER_BLOCK],
    ) {
        // Frequency shift and CIC decimation
        let mut sum: i64 = 0;
        let mut produced = 0;
        for &raw in adc.iter().take(ADC_BLOCK_SIZE) {
            sum += i64::from(raw);
            let x = i32::from(raw) - self.dc_offset;
            let (cos, sin) = self.nco.next_q15();
            let i = (x * i32::from(cos)) >> 15;
            let q = (x * -i32::from(sin)) >> 15;
            if let (Some(ci), Some(cq)) = (self.cic_i.process(i), self.cic_q.process(q)) {
                if let Some(slot) = self.cic_out.get_mut(produced) {
                    *slot = IqSample::new(ci as f32, cq as f32);
                    produced += 1;
                }
            }
        }
        if !adc.is_empty() {
            self.dc_offset = (sum / adc.len() as i64) as i32;
        }

        self.spectrum.process(&self.cic_out[..produced], &mut status.spectrum);

        // Baseband: decimate, filter, measure, detect
        let mut baseband_audio = [0.0f32; BASEBAND_PER_BLOCK];
        let mut power = 0.0f32;
        let mut count = 0usize;
        for k in 0..produced {
            let mut iq = self.cic_out[k];
            if settings.swap_iq() {
                iq = iq.swapped();
            }
            let hb_i = self.half_band_i.process(cic_to_sample(iq.i));
            let hb_q = self.half_band_q.process(cic_to_sample(iq.q));
            let (Some(hb_i), Some(hb_q)) = (hb_i, hb_q) else {
                continue;
            };

            let filtered = IqSample::new(
                self.bandwidth_i.process(from_sample(hb_i)),
                self.bandwidth_q.process(from_sample(hb_q)),
            );
            power += filtered.magnitude_squared();

            let levelled = self.agc.process(filtered);
            let mut sample = self.demod.process(levelled);
            if self.notch_enabled {
                sample = self.notch.process(sample);
            }
            if let Some(slot) = baseband_audio.get_mut(count) {
                *slot = sample;
                count += 1;
            }
        }

        if count > 0 {
            let rms = (power / count as f32).sqrt() * BASEBAND_FULL_SCALE;
            self.strength.update(rms);
        }
        let gain_cal = settings.gain_cal();
        status.signal_strength_dbm = self.strength.dbm(gain_cal);
        let open = self
            .squelch
            .update(self.strength.s_unit(gain_cal), settings.squelch());
        status.audio_muted = !open;

        // Squelch, volume and interpolation to the output rate
        let gain = if open {
            AUDIO_FULL_SCALE * f32::from(settings.volume()) / f32::from(MAX_VOLUME)
        } else {
            0.0
        };
        let mut chunk = [0i32; cic::INTERPOLATION];
        for (sample, out) in baseband_audio
            .iter()
            .zip(audio.chunks_exact_mut(cic::INTERPOLATION))
        {
            let level = (sample * gain).clamp(-AUDIO_FULL_SCALE, AUDIO_FULL_SCALE) as i32;
            self.interpolator.process(level, &mut chunk);
            for (dst, &src) in out.iter_mut().zip(&chunk) {
                *dst = src.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
            }
        }

        status.blocks = status.blocks.wrapping_add(1);
    }
}

/// CIC output units to the Q15 half-band input (1.0 = [`BASEBAND_FULL_SCALE`])
#[allow(clippy::cast_possible_truncation)]
fn cic_to_sample(value: f32) -> Sample {
    let bits = (value as i32) << 1;
    Sample::from_bits(bits.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16)
}

fn bandwidth_cutoff(settings: &Settings) -> f32 {
    settings.bandwidth().cutoff_hz(settings.mode()) / BASEBAND_SAMPLE_RATE as f32
}

fn notch_wanted(settings: &Settings) -> bool {
    settings.auto_notch() && settings.mode().supports_auto_notch()
}

/// The receiver pipeline and its applied settings
pub struct Receiver {
    chain: Chain,
    settings: Settings,
    tuned: Option<Frequency>,
    generation: Option<u32>,
    status: Status,
    adc: [[u16; ADC_BLOCK_SIZE]; 2],
    audio: [[i16; AUDIO_PER_BLOCK]; 2],
    /// Buffer pair written by the next pass
    slot: usize,
    /// The other ADC buffer holds a block not yet processed
    acquired: bool,
    /// The other audio buffer holds audio not yet played
    queued: bool,
}

impl Receiver {
    /// Build the pipeline with `settings` applied
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        let settings = settings.clamped().with_suspend(false);
        Self {
            chain: Chain::new(&settings),
            settings,
            tuned: None,
            generation: None,
            status: Status::EMPTY,
            adc: [[0; ADC_BLOCK_SIZE]; 2],
            audio: [[0; AUDIO_PER_BLOCK]; 2],
            slot: 0,
            acquired: false,
            queued: false,
        }
    }

    /// Settings currently applied
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Status of the last processed block
    #[must_use]
    pub const fn status(&self) -> &Status {
        &self.status
    }

    /// Active demodulation mode
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.chain.demod.mode()
    }

    /// Apply new settings between blocks
    ///
    /// Returns the LO frequency to program if the tuned frequency changed.
    pub fn apply(&mut self, settings: &Settings) -> Option<u32> {
        let settings = settings.clamped().with_suspend(false);
        self.chain.configure(&self.settings, &settings);
        self.settings = settings;

        if self.tuned == Some(settings.frequency()) {
            None
        } else {
            self.tuned = Some(settings.frequency());
            debug!("tuned to {}", settings.frequency());
            Some(settings.frequency().lo_hz())
        }
    }

    /// Process one ADC block into one audio block and update the status
    pub fn process_block(&mut self, adc: &[u16], audio: &mut [i16; AUDIO_PER_BLOCK]) {
        self.chain
            .process_block(&self.settings, &mut self.status, adc, audio);
    }

    /// One pass: take new settings, park if asked, otherwise run a block
    ///
    /// Acquires the next block and plays the previous block's audio while
    /// the block acquired last pass is processed. The first two passes
    /// fill the pipeline and play nothing.
    pub async fn step<M, F, S>(&mut self, exchange: &Exchange<M>, frontend: &mut F, sink: &mut S)
    where
        M: RawMutex,
        F: Frontend,
        S: AudioSink,
    {
        if let Some((settings, generation)) = exchange.fetch_settings(self.generation) {
            self.generation = Some(generation);
            if settings.suspend() {
                frontend.halt();
                sink.halt();
                exchange.park().await;
                frontend.restart();
                sink.restart();
                return;
            }
            if let Some(lo_hz) = self.apply(&settings) {
                frontend.tune(lo_hz);
            }
        }

        let [adc_a, adc_b] = &mut self.adc;
        let (next, ready) = if self.slot == 0 { (adc_a, &*adc_b) } else { (adc_b, &*adc_a) };
        let [audio_a, audio_b] = &mut self.audio;
        let (out, pending) = if self.slot == 0 { (audio_a, &*audio_b) } else { (audio_b, &*audio_a) };
        let (chain, status, settings) = (&mut self.chain, &mut self.status, &self.settings);
        let (acquired, queued) = (self.acquired, self.queued);

        let ((), (), busy) = join3(
            frontend.acquire(next),
            async {
                if queued {
                    sink.play(pending).await;
                }
            },
            async {
                acquired.then(|| {
                    let start = Instant::now();
                    chain.process_block(settings, status, ready, out);
                    start.elapsed()
                })
            },
        )
        .await;

        if let Some(busy) = busy {
            self.status.busy_time_us = u32::try_from(busy.as_micros()).unwrap_or(u32::MAX);
            let readings = frontend.housekeeping();
            self.status.battery_raw = readings.battery_raw;
            self.status.temperature_raw = readings.temperature_raw;
            exchange.publish(&self.status);
        }

        self.queued = acquired;
        self.acquired = true;
        self.slot ^= 1;
    }

    /// Run forever
    pub async fn run<M, F, S>(mut self, exchange: &Exchange<M>, frontend: &mut F, sink: &mut S) -> !
    where
        M: RawMutex,
        F: Frontend,
        S: AudioSink,
    {
        exchange.attach();
        info!("receiver running at {}", self.settings.frequency());
        loop {
            self.step(exchange, frontend, sink).await;
        }
    }
}
