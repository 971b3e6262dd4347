//! Demonstration scenario wired onto the bus.
//!
//! The scenario registers a handful of listeners that exercise every
//! registration shape the bus offers, then fires "driver" events before each
//! tick:
//!
//! - `engine.heartbeat` -- fired every tick, counted by a persistent
//!   listener bound to the shared [`ScenarioStats`].
//! - `countdown.step` -- a persistent, instance-bound listener with a frozen
//!   step size. Each run re-fires `countdown.step` through a publisher, so
//!   the countdown advances exactly one step per tick, until it fires
//!   `countdown.done` (a one-shot listener).
//! - `spawn.wave` -- a one-shot listener that re-arms itself for the next
//!   wave through a publisher, up to [`MAX_WAVES`].
//! - `weather.gust` -- fired at random from a seeded RNG.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tickbus_core::{BoundAction, BusError, EventBus, EventPublisher, ListenerMode};
use tracing::info;

/// Fired before every tick.
pub const HEARTBEAT: &str = "engine.heartbeat";
/// Advances the countdown by one step.
pub const COUNTDOWN_STEP: &str = "countdown.step";
/// Fired once when the countdown reaches zero.
pub const COUNTDOWN_DONE: &str = "countdown.done";
/// Spawns the next wave.
pub const WAVE: &str = "spawn.wave";
/// Random weather event.
pub const GUST: &str = "weather.gust";

/// Countdown start value.
pub const COUNTDOWN_START: u32 = 5;
/// Amount removed from the countdown per step.
pub const COUNTDOWN_STEP_SIZE: u32 = 1;
/// Waves spawned before the wave listener stops re-arming.
pub const MAX_WAVES: u32 = 3;
/// A wave is fired on every tick divisible by this.
pub const WAVE_EVERY_TICKS: u64 = 4;
/// Chance of a gust on any tick.
const GUST_CHANCE: f64 = 0.25;

/// Counters updated by the scenario's listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioStats {
    /// Heartbeats observed.
    pub heartbeats: u64,
    /// Whether `countdown.done` has been handled.
    pub countdown_finished: bool,
    /// Highest wave spawned.
    pub waves: u32,
    /// Gusts observed.
    pub gusts: u64,
}

#[derive(Debug)]
struct Countdown {
    remaining: u32,
    publisher: EventPublisher,
}

/// Scenario state kept alive for as long as its listeners should run.
///
/// Listeners only hold weak references to `stats` and `countdown`; dropping
/// the scenario expires them.
#[derive(Debug)]
pub struct Scenario {
    stats: Rc<RefCell<ScenarioStats>>,
    // Owned only to keep the countdown listener's instance alive.
    _countdown: Rc<RefCell<Countdown>>,
    rng: StdRng,
}

impl Scenario {
    /// Register the scenario's listeners on `bus`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if a registry refuses a listener.
    pub fn install(bus: &mut EventBus, seed: u64) -> Result<Self, BusError> {
        let stats = Rc::new(RefCell::new(ScenarioStats::default()));
        let publisher = bus.publisher();

        bus.add_event_listener(
            HEARTBEAT,
            BoundAction::for_instance(&stats, |s: &mut ScenarioStats| {
                s.heartbeats = s.heartbeats.saturating_add(1);
            }),
            ListenerMode::Persistent,
        )?;

        let countdown = Rc::new(RefCell::new(Countdown {
            remaining: COUNTDOWN_START,
            publisher: publisher.clone(),
        }));
        bus.add_event_listener(
            COUNTDOWN_STEP,
            BoundAction::for_instance_with_args(
                &countdown,
                COUNTDOWN_STEP_SIZE,
                |c: &mut Countdown, step: &u32| {
                    c.remaining = c.remaining.saturating_sub(*step);
                    if c.remaining == 0 {
                        c.publisher.fire_event(COUNTDOWN_DONE);
                    } else {
                        c.publisher.fire_event(COUNTDOWN_STEP);
                    }
                },
            ),
            ListenerMode::Persistent,
        )?;
        bus.add_event_listener(
            COUNTDOWN_DONE,
            BoundAction::for_instance(&stats, |s: &mut ScenarioStats| {
                s.countdown_finished = true;
                info!("countdown finished");
            }),
            ListenerMode::OneShot,
        )?;
        bus.fire_event(COUNTDOWN_STEP);

        bus.add_event_listener(
            GUST,
            BoundAction::for_instance(&stats, |s: &mut ScenarioStats| {
                s.gusts = s.gusts.saturating_add(1);
            }),
            ListenerMode::Persistent,
        )?;

        arm_wave(&publisher, Rc::downgrade(&stats), 1);

        info!(seed, "scenario installed");
        Ok(Self {
            stats,
            _countdown: countdown,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Fire the driver events for the tick about to run.
    pub fn before_tick(&mut self, bus: &EventBus) {
        let upcoming = bus.ticks().saturating_add(1);
        bus.fire_event(HEARTBEAT);
        if upcoming.checked_rem(WAVE_EVERY_TICKS) == Some(0) {
            bus.fire_event(WAVE);
        }
        if self.rng.random_bool(GUST_CHANCE) {
            bus.fire_event(GUST);
        }
    }

    /// Snapshot of the scenario counters.
    pub fn stats(&self) -> ScenarioStats {
        self.stats.borrow().clone()
    }
}

/// Stage a one-shot listener for `wave` that arms the following wave when it
/// runs.
fn arm_wave(publisher: &EventPublisher, stats: Weak<RefCell<ScenarioStats>>, wave: u32) {
    if wave > MAX_WAVES {
        return;
    }
    let Some(target) = stats.upgrade() else {
        return;
    };
    let again = publisher.clone();
    publisher.add_event_listener(
        WAVE,
        BoundAction::for_instance_with_args(
            &target,
            wave,
            move |s: &mut ScenarioStats, wave: &u32| {
                s.waves = *wave;
                info!(wave, "wave spawned");
                arm_wave(&again, stats.clone(), wave.saturating_add(1));
            },
        ),
        ListenerMode::OneShot,
    );
}
