//! Settings/status exchange between the control core and the receiver
//!
//! One blocking mutex guards the settings record, its generation counter
//! and the status record, so every read or write sees a whole record from
//! a single publication. The receiver copies settings in and status out
//! once per block and never holds the lock while processing.
//!
//! Flash operations use a two-phase rendezvous on top of this:
//!
//! ```text
//!  control core                         receiver core
//!  ------------                         -------------
//!  suspend()  --- suspend flag set --->  fetch_settings() sees it
//!     |                                  halts front end and sink
//!     | <------- parked signal --------  park()
//!  SuspendGuard held: flash work            (waiting)
//!  drop(guard) --- resume signal ----->  park() returns
//!                                        restarts front end and sink
//! ```
//!
//! The receiver's filter state is untouched while parked, so it resumes
//! exactly where it stopped.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

use super::settings::Settings;
use super::status::Status;
use crate::config::SPECTRUM_BINS;
use crate::log::{debug, info};

struct Shared {
    settings: Settings,
    generation: u32,
    status: Status,
    parked: bool,
    attached: bool,
}

/// Cross-core settings and status exchange
pub struct Exchange<M: RawMutex> {
    shared: Mutex<M, RefCell<Shared>>,
    parked: Signal<M, ()>,
    resume: Signal<M, ()>,
}

/// View of both records inside the exchange's critical section
pub struct Access<'a> {
    settings: &'a mut Settings,
    status: &'a Status,
}

impl Access<'_> {
    /// Settings most recently written by the control core
    #[must_use]
    pub fn settings(&self) -> &Settings {
        self.settings
    }

    /// Replace the settings record; a pending suspend request is kept
    pub fn set_settings(&mut self, settings: Settings) {
        *self.settings = settings.with_suspend(self.settings.suspend());
    }

    /// Status most recently published by the receiver
    #[must_use]
    pub fn status(&self) -> &Status {
        self.status
    }
}

impl<M: RawMutex> Exchange<M> {
    /// Create an exchange holding `settings` and an empty status
    #[must_use]
    pub const fn new(settings: Settings) -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared {
                settings,
                generation: 0,
                status: Status::EMPTY,
                parked: false,
                attached: false,
            })),
            parked: Signal::new(),
            resume: Signal::new(),
        }
    }

    // ------------------------------------------------------------------
    // Control side
    // ------------------------------------------------------------------

    /// Run `f` with exclusive access to both records
    ///
    /// A settings change made through the view is seen by the next block
    /// the receiver processes.
    pub fn access<R>(&self, f: impl FnOnce(&mut Access<'_>) -> R) -> R {
        self.shared.lock(|cell| {
            let shared = &mut *cell.borrow_mut();
            let before = shared.settings;
            let result = f(&mut Access {
                settings: &mut shared.settings,
                status: &shared.status,
            });
            if shared.settings != before {
                shared.generation = shared.generation.wrapping_add(1);
            }
            result
        })
    }

    /// Publish new settings to the receiver
    pub fn apply(&self, settings: Settings) {
        self.access(|view| view.set_settings(settings));
    }

    /// Current settings record
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.access(|view| *view.settings())
    }

    /// Copy of the latest status
    #[must_use]
    pub fn read_status(&self) -> Status {
        self.access(|view| *view.status())
    }

    /// Copy of the latest spectrum
    #[must_use]
    pub fn get_spectrum(&self) -> [f32; SPECTRUM_BINS] {
        self.access(|view| view.status().spectrum)
    }

    /// Ask the receiver to park and wait until it has
    ///
    /// Returns at once if no receiver is attached. The receiver stays
    /// parked until the returned guard is dropped. Only one guard may be
    /// held at a time.
    pub async fn suspend(&self) -> SuspendGuard<'_, M> {
        let must_wait = self.shared.lock(|cell| {
            let mut shared = cell.borrow_mut();
            shared.settings = shared.settings.with_suspend(true);
            shared.generation = shared.generation.wrapping_add(1);
            self.parked.reset();
            shared.attached && !shared.parked
        });

        while must_wait && !self.is_parked() {
            self.parked.wait().await;
        }

        info!("receiver suspended");
        SuspendGuard { exchange: self }
    }

    /// Whether the receiver is currently parked
    #[must_use]
    pub fn is_parked(&self) -> bool {
        self.shared.lock(|cell| cell.borrow().parked)
    }

    /// Whether flash may be touched: the receiver is parked or absent
    #[must_use]
    pub fn is_quiesced(&self) -> bool {
        self.shared.lock(|cell| {
            let shared = cell.borrow();
            shared.parked || !shared.attached
        })
    }

    fn release(&self) {
        self.shared.lock(|cell| {
            let mut shared = cell.borrow_mut();
            shared.settings = shared.settings.with_suspend(false);
            shared.generation = shared.generation.wrapping_add(1);
        });
        self.resume.signal(());
        info!("receiver resumed");
    }

    // ------------------------------------------------------------------
    // Receiver side
    // ------------------------------------------------------------------

    /// Register the receiver; suspension now waits for it to park
    pub fn attach(&self) {
        self.shared.lock(|cell| cell.borrow_mut().attached = true);
    }

    /// Settings and their generation, if newer than `seen`
    #[must_use]
    pub fn fetch_settings(&self, seen: Option<u32>) -> Option<(Settings, u32)> {
        self.shared.lock(|cell| {
            let shared = cell.borrow();
            (seen != Some(shared.generation)).then_some((shared.settings, shared.generation))
        })
    }

    /// Publish a status record
    pub fn publish(&self, status: &Status) {
        self.shared.lock(|cell| cell.borrow_mut().status = *status);
    }

    /// Acknowledge a suspend request and wait for it to be lifted
    pub async fn park(&self) {
        self.shared.lock(|cell| cell.borrow_mut().parked = true);
        self.parked.signal(());
        debug!("receiver parked");

        loop {
            self.resume.wait().await;
            let released = self.shared.lock(|cell| {
                let mut shared = cell.borrow_mut();
                if shared.settings.suspend() {
                    false
                } else {
                    shared.parked = false;
                    true
                }
            });
            if released {
                break;
            }
        }
    }
}

/// Proof that the receiver is parked
///
/// Dropping the guard lifts the suspend request and wakes the receiver.
pub struct SuspendGuard<'a, M: RawMutex> {
    exchange: &'a Exchange<M>,
}

impl<M: RawMutex> SuspendGuard<'_, M> {
    /// Exchange this guard belongs to
    #[must_use]
    pub fn exchange(&self) -> &Exchange<M> {
        self.exchange
    }
}

impl<M: RawMutex> Drop for SuspendGuard<'_, M> {
    fn drop(&mut self) {
        self.exchange.release();
    }
}
