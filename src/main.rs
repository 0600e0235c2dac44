//! PicoRX Receiver Main Application
//!
//! Entry point for the RP2040 receiver firmware. Core 1 runs the receiver
//! pipeline; core 0 runs the controller and the USB upload port.

#![no_std]
#![no_main]

use defmt::{info, unwrap, warn};
use embassy_executor::Executor;
use embassy_futures::select::{select, Either};
use embassy_rp::adc::{self, Adc, Channel as AdcChannel};
use embassy_rp::bind_interrupts;
use embassy_rp::flash::Flash;
use embassy_rp::gpio::Pull;
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::{DMA_CH0, DMA_CH1, USB};
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::usb::{Driver, InterruptHandler as UsbInterruptHandler};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Ticker};
use embassy_usb::class::cdc_acm::CdcAcmClass;
use embassy_usb::{Builder, UsbDevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use picorx::config::{UI_TICK_HZ, USB_CDC_PACKET_SIZE};
use picorx::hal::{AdcFrontend, FlashRegion, LocalOscillator, PwmAudioSink};
use picorx::protocol::{run_upload, TransferError};
use picorx::radio::{Command, Controller, Exchange, Receiver, Settings};
use picorx::usb::{CdcState, CdcStream, UsbDeviceInfo, UsbStrings};

bind_interrupts!(struct Irqs {
    ADC_IRQ_FIFO => adc::InterruptHandler;
    USBCTRL_IRQ => UsbInterruptHandler<USB>;
});

type Control = Mutex<CriticalSectionRawMutex, Controller<'static, CriticalSectionRawMutex, FlashRegion<'static>>>;
type UsbDriver = Driver<'static, USB>;

/// Settings and status shared by both cores
static EXCHANGE: Exchange<CriticalSectionRawMutex> = Exchange::new(Settings::DEFAULT);

/// Commands from the user interface
pub static COMMANDS: Channel<CriticalSectionRawMutex, Command, 8> = Channel::new();

static CORE1_STACK: StaticCell<Stack<16384>> = StaticCell::new();
static EXECUTOR0: StaticCell<Executor> = StaticCell::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();
static CONTROLLER: StaticCell<Control> = StaticCell::new();
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static CDC_STATE: StaticCell<CdcState<'static>> = StaticCell::new();

/// Main entry point
#[cortex_m_rt::entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());
    info!("PicoRX firmware v{}", env!("CARGO_PKG_VERSION"));

    // Restore settings before the receiver starts
    let region = FlashRegion::new(Flash::new_blocking(p.FLASH));
    let controller = unwrap!(Controller::new(&EXCHANGE, region));
    let controller: &'static Control = CONTROLLER.init(Mutex::new(controller));

    // Receiver front end and audio output
    let adc = Adc::new(p.ADC, Irqs, adc::Config::default());
    let rf = AdcChannel::new_pin(p.PIN_26, Pull::None);
    let battery = AdcChannel::new_pin(p.PIN_29, Pull::None);
    let temperature = AdcChannel::new_temp_sensor(p.ADC_TEMP_SENSOR);
    let lo = LocalOscillator::new(Pwm::new_output_a(p.PWM_SLICE1, p.PIN_2, PwmConfig::default()));
    let frontend = AdcFrontend::new(adc, rf, battery, temperature, p.DMA_CH0, lo);
    let sink = PwmAudioSink::new(Pwm::new_output_a(p.PWM_SLICE0, p.PIN_16, PwmConfig::default()), p.DMA_CH1);

    spawn_core1(p.CORE1, CORE1_STACK.init(Stack::new()), move || {
        let executor1 = EXECUTOR1.init(Executor::new());
        executor1.run(|spawner| unwrap!(spawner.spawn(receiver_task(frontend, sink))));
    });

    // USB serial port for memory upload
    let driver = Driver::new(p.USB, Irqs);
    let mut builder = Builder::new(
        driver,
        UsbDeviceInfo::default().config(&UsbStrings::default()),
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [],
        CONTROL_BUF.init([0; 64]),
    );
    let class = CdcAcmClass::new(&mut builder, CDC_STATE.init(CdcState::new()).state_mut(), USB_CDC_PACKET_SIZE);
    let usb = builder.build();

    info!("starting control core");
    let executor0 = EXECUTOR0.init(Executor::new());
    executor0.run(|spawner| {
        unwrap!(spawner.spawn(usb_task(usb)));
        unwrap!(spawner.spawn(upload_task(CdcStream::new(class), controller)));
        unwrap!(spawner.spawn(control_task(controller)));
    });
}

/// Receiver pipeline on core 1
#[embassy_executor::task]
async fn receiver_task(mut frontend: AdcFrontend<'static, DMA_CH0>, mut sink: PwmAudioSink<'static, DMA_CH1>) {
    let receiver = Receiver::new(EXCHANGE.settings());
    receiver.run(&EXCHANGE, &mut frontend, &mut sink).await
}

/// Ticks and user commands
#[embassy_executor::task]
async fn control_task(controller: &'static Control) {
    let mut ticker = Ticker::every(Duration::from_hz(u64::from(UI_TICK_HZ)));
    loop {
        let command = match select(ticker.next(), COMMANDS.receive()).await {
            Either::First(()) => Command::Tick,
            Either::Second(command) => command,
        };
        if let Err(error) = controller.lock().await.handle(command).await {
            warn!("command failed: {}", error);
        }
    }
}

/// One upload session per host connection
#[embassy_executor::task]
async fn upload_task(mut stream: CdcStream<'static, UsbDriver>, controller: &'static Control) {
    loop {
        stream.wait_connection().await;
        info!("usb: host connected");
        let mut writer = controller;
        match run_upload(&mut stream, &mut writer).await {
            Ok(()) => info!("usb: upload complete"),
            Err(TransferError::Storage(error)) => warn!("usb: upload failed: {}", error),
            Err(TransferError::Io(_) | TransferError::Closed) => info!("usb: host disconnected"),
        }
    }
}

/// USB device state machine
#[embassy_executor::task]
async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) {
    usb.run().await
}
