//! Receiver Pipeline Tests
//!
//! Drives the complete receive chain with synthetic ADC blocks: signal
//! strength, spectrum placement, AM recovery, squelch and the settings
//! and suspension handling of a receiver pass.
//! Run with: cargo test --features std --test receiver_tests

use std::cell::RefCell;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use embassy_futures::{block_on, yield_now};
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};

use picorx::config::{ADC_BLOCK_SIZE, ADC_SAMPLE_RATE, AUDIO_PER_BLOCK, AUDIO_SAMPLE_RATE, IF_OFFSET_HZ};
use picorx::dsp::agc::magnitude_to_dbm;
use picorx::dsp::spectrum::peak_bin;
use picorx::radio::{AudioSink, Exchange, Frontend, Housekeeping, Receiver, Settings};
use picorx::types::{Frequency, Mode, SUnit};

// ============================================================================
// Test Doubles
// ============================================================================

/// Synthetic IF source: a carrier `offset_hz` from the tuned frequency,
/// optionally amplitude modulated
struct ToneFrontend {
    n: u64,
    offset_hz: f64,
    amplitude: f64,
    modulation: Option<(f64, f64)>,
    tunes: Vec<u32>,
    halts: u32,
    restarts: u32,
}

impl ToneFrontend {
    fn new(offset_hz: f64, amplitude: f64) -> Self {
        Self {
            n: 0,
            offset_hz,
            amplitude,
            modulation: None,
            tunes: Vec::new(),
            halts: 0,
            restarts: 0,
        }
    }

    fn modulated(mut self, tone_hz: f64, depth: f64) -> Self {
        self.modulation = Some((tone_hz, depth));
        self
    }

    fn fill(&mut self, block: &mut [u16; ADC_BLOCK_SIZE]) {
        let fs = f64::from(ADC_SAMPLE_RATE);
        let carrier = f64::from(IF_OFFSET_HZ) + self.offset_hz;
        for sample in block.iter_mut() {
            let phase = (self.n as f64 * carrier / fs).fract();
            let envelope = match self.modulation {
                Some((tone, depth)) => 1.0 + depth * (2.0 * PI * self.n as f64 * tone / fs).cos(),
                None => 1.0,
            };
            let value = 2048.0 + self.amplitude * envelope * (2.0 * PI * phase).cos();
            *sample = value.round().clamp(0.0, 4095.0) as u16;
            self.n += 1;
        }
    }
}

impl Frontend for ToneFrontend {
    async fn acquire(&mut self, block: &mut [u16; ADC_BLOCK_SIZE]) {
        self.fill(block);
    }

    fn tune(&mut self, lo_hz: u32) {
        self.tunes.push(lo_hz);
    }

    fn housekeeping(&mut self) -> Housekeeping {
        Housekeeping {
            battery_raw: 1500,
            temperature_raw: 876,
        }
    }

    fn halt(&mut self) {
        self.halts += 1;
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }
}

#[derive(Default)]
struct RecordingSink {
    samples: Vec<i16>,
    halts: u32,
    restarts: u32,
}

impl AudioSink for RecordingSink {
    async fn play(&mut self, samples: &[i16; AUDIO_PER_BLOCK]) {
        self.samples.extend_from_slice(samples);
    }

    fn halt(&mut self) {
        self.halts += 1;
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }
}

/// Front end whose transfers take one executor round trip
struct PacedFrontend<'a> {
    inner: ToneFrontend,
    events: &'a RefCell<Vec<&'static str>>,
}

impl Frontend for PacedFrontend<'_> {
    async fn acquire(&mut self, block: &mut [u16; ADC_BLOCK_SIZE]) {
        self.events.borrow_mut().push("acquire start");
        yield_now().await;
        self.inner.fill(block);
        self.events.borrow_mut().push("acquire end");
    }

    fn tune(&mut self, lo_hz: u32) {
        self.inner.tune(lo_hz);
    }

    fn housekeeping(&mut self) -> Housekeeping {
        self.inner.housekeeping()
    }

    fn halt(&mut self) {}

    fn restart(&mut self) {}
}

/// Sink whose transfers take one executor round trip
struct PacedSink<'a> {
    events: &'a RefCell<Vec<&'static str>>,
}

impl AudioSink for PacedSink<'_> {
    async fn play(&mut self, _samples: &[i16; AUDIO_PER_BLOCK]) {
        self.events.borrow_mut().push("play start");
        yield_now().await;
        self.events.borrow_mut().push("play end");
    }

    fn halt(&mut self) {}

    fn restart(&mut self) {}
}

/// Run `blocks` blocks straight through the chain, returning the audio
fn run_blocks(receiver: &mut Receiver, frontend: &mut ToneFrontend, blocks: usize) -> Vec<i16> {
    let mut adc = [0u16; ADC_BLOCK_SIZE];
    let mut audio = [0i16; AUDIO_PER_BLOCK];
    let mut out = Vec::with_capacity(blocks * AUDIO_PER_BLOCK);
    for _ in 0..blocks {
        frontend.fill(&mut adc);
        receiver.process_block(&adc, &mut audio);
        out.extend_from_slice(&audio);
    }
    out
}

/// Power of `samples` at `freq_hz`
fn tone_power(samples: &[i16], freq_hz: f64) -> f64 {
    let fs = f64::from(AUDIO_SAMPLE_RATE);
    let (mut re, mut im) = (0.0, 0.0);
    for (n, &s) in samples.iter().enumerate() {
        let angle = 2.0 * PI * freq_hz * n as f64 / fs;
        re += f64::from(s) * angle.cos();
        im -= f64::from(s) * angle.sin();
    }
    re * re + im * im
}

fn am_settings() -> Settings {
    Settings::DEFAULT.with_mode(Mode::Am)
}

// ============================================================================
// Settings Application
// ============================================================================

#[test]
fn apply_reports_lo_only_on_retune() {
    let settings = am_settings();
    let mut receiver = Receiver::new(settings);
    assert_eq!(receiver.apply(&settings), Some(settings.frequency().lo_hz()));
    assert_eq!(receiver.apply(&settings), None);
    assert_eq!(receiver.apply(&settings.with_volume(2)), None);
    assert_eq!(receiver.settings().volume(), 2);

    let retuned = settings.with_frequency(Frequency::from_hz(7_100_000).unwrap());
    assert_eq!(receiver.apply(&retuned), Some(7_100_000 - IF_OFFSET_HZ));
}

#[test]
fn apply_switches_demodulator() {
    let mut receiver = Receiver::new(am_settings());
    assert_eq!(receiver.mode(), Mode::Am);
    receiver.apply(&am_settings().with_mode(Mode::Usb));
    assert_eq!(receiver.mode(), Mode::Usb);
}

#[test]
fn apply_never_keeps_suspend() {
    let mut receiver = Receiver::new(am_settings().with_suspend(true));
    assert!(!receiver.settings().suspend());
    receiver.apply(&am_settings().with_suspend(true));
    assert!(!receiver.settings().suspend());
}

// ============================================================================
// Signal Strength and Spectrum
// ============================================================================

#[test]
fn signal_strength_tracks_carrier_level() {
    let settings = am_settings();
    let mut receiver = Receiver::new(settings);
    let mut frontend = ToneFrontend::new(0.0, 500.0);
    run_blocks(&mut receiver, &mut frontend, 60);

    // A carrier of A counts measures 2A at the CIC output
    let expected = magnitude_to_dbm(1000.0, settings.gain_cal());
    let measured = receiver.status().signal_strength_dbm;
    assert!((measured - expected).abs() < 1.0, "{measured} vs {expected}");
    assert_eq!(receiver.status().s_unit(), SUnit::new(10).unwrap());
    assert!(!receiver.status().audio_muted);
}

#[test]
fn weaker_carrier_reads_lower() {
    let mut strong = Receiver::new(am_settings());
    let mut weak = Receiver::new(am_settings());
    run_blocks(&mut strong, &mut ToneFrontend::new(0.0, 800.0), 60);
    run_blocks(&mut weak, &mut ToneFrontend::new(0.0, 80.0), 60);
    let difference = strong.status().signal_strength_dbm - weak.status().signal_strength_dbm;
    assert!((difference - 20.0).abs() < 1.0, "{difference}");
}

#[test]
fn spectrum_places_carrier_above_centre() {
    let mut receiver = Receiver::new(am_settings());
    run_blocks(&mut receiver, &mut ToneFrontend::new(3000.0, 1000.0), 3);
    let (bin, _) = peak_bin(&receiver.status().spectrum).unwrap();
    assert!((75..=77).contains(&bin), "{bin}");
}

#[test]
fn spectrum_places_carrier_below_centre() {
    let mut receiver = Receiver::new(am_settings());
    run_blocks(&mut receiver, &mut ToneFrontend::new(-3000.0, 1000.0), 3);
    let (bin, _) = peak_bin(&receiver.status().spectrum).unwrap();
    assert!((51..=53).contains(&bin), "{bin}");
}

#[test]
fn block_counter_advances() {
    let mut receiver = Receiver::new(am_settings());
    run_blocks(&mut receiver, &mut ToneFrontend::new(0.0, 100.0), 5);
    assert_eq!(receiver.status().blocks, 5);
}

// ============================================================================
// Audio
// ============================================================================

/// AM settings tuned to 1 MHz
fn am_at_1mhz() -> Settings {
    am_settings().with_frequency(Frequency::from_hz(1_000_000).unwrap())
}

/// Settled audio: 200000 samples hold whole cycles of every measured tone
fn settled(audio: &[i16]) -> &[i16] {
    &audio[100 * AUDIO_PER_BLOCK..100 * AUDIO_PER_BLOCK + 200_000]
}

#[test]
fn am_recovers_modulating_tone() {
    let settings = am_at_1mhz();
    let mut receiver = Receiver::new(settings);
    assert_eq!(receiver.apply(&settings), Some(1_000_000 - IF_OFFSET_HZ));
    let mut frontend = ToneFrontend::new(0.0, 800.0).modulated(1000.0, 0.5);
    let audio = run_blocks(&mut receiver, &mut frontend, 300);

    let window = settled(&audio);
    let wanted = tone_power(window, 1000.0);
    assert!(wanted > 100.0 * tone_power(window, 2500.0));
    assert!(wanted > 100.0 * tone_power(window, 3000.0));
    assert!(window.iter().any(|&s| s.unsigned_abs() > 1000));

    // Mean power of the modulated carrier is 1 + m^2/2 times the bare carrier
    let carrier = 1600.0 * (1.0f32 + 0.5 * 0.5 * 0.5).sqrt();
    let expected = magnitude_to_dbm(carrier, settings.gain_cal());
    let measured = receiver.status().signal_strength_dbm;
    assert!((measured - expected).abs() < 1.0, "{measured} vs {expected}");
}

#[test]
fn am_output_tracks_modulation_depth() {
    let recovered = |depth: f64| {
        let mut receiver = Receiver::new(am_at_1mhz());
        let mut frontend = ToneFrontend::new(0.0, 800.0).modulated(1000.0, depth);
        let audio = run_blocks(&mut receiver, &mut frontend, 300);
        tone_power(settled(&audio), 1000.0)
    };

    // Doubling the depth doubles the recovered tone
    let ratio_db = 10.0 * (recovered(0.2) / recovered(0.1)).log10();
    assert!((ratio_db - 6.0).abs() < 1.5, "{ratio_db}");
}

#[test]
fn squelch_mutes_weak_signal() {
    let settings = am_settings().with_squelch(SUnit::MAX);
    let mut receiver = Receiver::new(settings);
    let mut frontend = ToneFrontend::new(0.0, 100.0).modulated(1000.0, 0.5);
    let audio = run_blocks(&mut receiver, &mut frontend, 20);
    assert!(receiver.status().audio_muted);
    assert!(audio.iter().all(|&s| s == 0));
}

#[test]
fn zero_volume_is_silent_but_open() {
    let settings = am_settings().with_volume(0);
    let mut receiver = Receiver::new(settings);
    let mut frontend = ToneFrontend::new(0.0, 800.0).modulated(1000.0, 0.5);
    let audio = run_blocks(&mut receiver, &mut frontend, 20);
    assert!(!receiver.status().audio_muted);
    assert!(audio.iter().all(|&s| s == 0));
}

// ============================================================================
// Receiver Passes
// ============================================================================

#[test]
fn step_tunes_processes_and_publishes() {
    let exchange = Exchange::<NoopRawMutex>::new(am_settings());
    let mut receiver = Receiver::new(exchange.settings());
    let mut frontend = ToneFrontend::new(0.0, 500.0);
    let mut sink = RecordingSink::default();

    // First pass only acquires
    block_on(receiver.step(&exchange, &mut frontend, &mut sink));
    assert_eq!(frontend.tunes, vec![am_settings().frequency().lo_hz()]);
    assert!(sink.samples.is_empty());
    assert_eq!(exchange.read_status().blocks, 0);

    // Second pass processes the first block
    block_on(receiver.step(&exchange, &mut frontend, &mut sink));
    assert!(sink.samples.is_empty());
    let status = exchange.read_status();
    assert_eq!(status.blocks, 1);
    assert_eq!(status.battery_raw, 1500);
    assert_eq!(status.temperature_raw, 876);

    // Third pass plays it
    block_on(receiver.step(&exchange, &mut frontend, &mut sink));
    assert_eq!(sink.samples.len(), AUDIO_PER_BLOCK);
    assert_eq!(frontend.tunes.len(), 1);

    exchange.apply(am_settings().with_frequency(Frequency::from_hz(9_500_000).unwrap()));
    block_on(receiver.step(&exchange, &mut frontend, &mut sink));
    assert_eq!(frontend.tunes, vec![am_settings().frequency().lo_hz(), 9_500_000 - IF_OFFSET_HZ]);
    assert_eq!(exchange.read_status().blocks, 3);
    assert_eq!(sink.samples.len(), 2 * AUDIO_PER_BLOCK);
}

#[test]
fn stepping_plays_every_block_in_order() {
    let exchange = Exchange::<NoopRawMutex>::new(am_settings());
    let mut receiver = Receiver::new(exchange.settings());
    let mut frontend = ToneFrontend::new(0.0, 800.0).modulated(1000.0, 0.5);
    let mut sink = RecordingSink::default();
    for _ in 0..12 {
        block_on(receiver.step(&exchange, &mut frontend, &mut sink));
    }

    // Same audio as feeding the chain the contiguous sample stream directly
    let mut reference = Receiver::new(am_settings());
    let expected = run_blocks(
        &mut reference,
        &mut ToneFrontend::new(0.0, 800.0).modulated(1000.0, 0.5),
        10,
    );
    assert_eq!(sink.samples.len(), 10 * AUDIO_PER_BLOCK);
    assert!(sink.samples == expected);
    assert_eq!(exchange.read_status().blocks, 11);
    assert_eq!(frontend.n, 12 * ADC_BLOCK_SIZE as u64);
}

#[test]
fn acquisition_and_playback_overlap() {
    let events = RefCell::new(Vec::new());
    let exchange = Exchange::<NoopRawMutex>::new(am_settings());
    let mut receiver = Receiver::new(exchange.settings());
    let mut frontend = PacedFrontend {
        inner: ToneFrontend::new(0.0, 500.0),
        events: &events,
    };
    let mut sink = PacedSink { events: &events };

    for _ in 0..2 {
        block_on(receiver.step(&exchange, &mut frontend, &mut sink));
        assert_eq!(events.take(), vec!["acquire start", "acquire end"]);
    }

    // Both transfers are in flight before either completes
    for _ in 0..3 {
        block_on(receiver.step(&exchange, &mut frontend, &mut sink));
        assert_eq!(events.take(), vec!["acquire start", "play start", "acquire end", "play end"]);
    }
}

#[test]
fn step_parks_while_suspended() {
    let exchange = Exchange::<CriticalSectionRawMutex>::new(am_settings());
    let stop = AtomicBool::new(false);
    exchange.attach();

    let (frontend, sink) = thread::scope(|s| {
        let worker = s.spawn(|| {
            let mut receiver = Receiver::new(exchange.settings());
            let mut frontend = ToneFrontend::new(0.0, 500.0);
            let mut sink = RecordingSink::default();
            while !stop.load(Ordering::SeqCst) {
                block_on(receiver.step(&exchange, &mut frontend, &mut sink));
            }
            (frontend, sink)
        });

        for _ in 0..5 {
            let guard = block_on(exchange.suspend());
            assert!(exchange.is_parked());
            let frozen = exchange.read_status().blocks;
            thread::yield_now();
            assert_eq!(exchange.read_status().blocks, frozen);
            drop(guard);
        }
        stop.store(true, Ordering::SeqCst);
        worker.join().unwrap()
    });

    assert!(frontend.halts >= 1);
    assert_eq!(frontend.halts, frontend.restarts);
    assert_eq!(sink.halts, frontend.halts);
    assert_eq!(sink.restarts, frontend.restarts);
    assert!(!exchange.is_parked());
}
