//! Software PWM: validated channel configuration plus a background cycle
//! worker driving one output line.
//!
//! A [`PwmChannel`] only holds configuration.  [`PwmChannel::start()`] moves
//! the channel into a [`PwmCycle`] worker thread which toggles the line until
//! it is stopped; [`PwmCycle::stop()`] joins the thread and hands the channel
//! back.  Because the line itself moves into the worker, a second worker on
//! the same line cannot be started while the first one is alive.
//!
//! No attempt is made to compensate scheduler jitter; the achievable timing
//! resolution is whatever the host gives a sleeping or spinning thread.

use core::time::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use embedded_hal::digital::OutputPin;

/// Default cycle period: 20 ms (50 Hz).
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(20);

/// Poll interval of a paused worker, bounding the latency of `resume()`.
const PAUSE_POLL: Duration = Duration::from_millis(1);

/// Rejected channel reconfiguration.  The previous value stays in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Duty cycle outside `0.0..=1.0`.
    InvalidDutyCycle,
    /// Zero-length cycle period.
    InvalidPeriod,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::InvalidDutyCycle => write!(f, "duty cycle must be within 0.0..=1.0"),
            ConfigError::InvalidPeriod => write!(f, "cycle period must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Worker termination failure, reported by [`PwmCycle::stop()`].
#[derive(Debug)]
pub enum CycleError<E> {
    /// A line write failed; the worker shut down early and the line is gone
    /// with it.
    Line(E),
    /// The worker thread panicked.
    Panicked,
}

impl<E: core::fmt::Debug> core::fmt::Display for CycleError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CycleError::Line(error) => write!(f, "cycle worker line write failed: {:?}", error),
            CycleError::Panicked => write!(f, "cycle worker thread panicked"),
        }
    }
}

impl<E: core::fmt::Debug> std::error::Error for CycleError<E> {}

/// How the cycle worker waits for a phase deadline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitStrategy {
    /// Sleep until the deadline.  Cheap; resolution bounded by the scheduler.
    #[default]
    Sleep,
    /// Busy-spin until the deadline.  Tightest timing, keeps one core busy.
    Spin,
}

/// Validated PWM configuration for one output line.
#[derive(Debug)]
pub struct PwmChannel<L> {
    line: L,
    duty_cycle: f32,
    period: Duration,
    wait: WaitStrategy,
}

impl<L: OutputPin> PwmChannel<L> {
    /// New channel with duty cycle 0 and the default 20 ms period.
    pub fn new(line: L) -> Self {
        Self {
            line,
            duty_cycle: 0.0,
            period: DEFAULT_PERIOD,
            wait: WaitStrategy::Sleep,
        }
    }

    /// New channel with an explicit duty cycle and period.
    pub fn with_config(line: L, duty_cycle: f32, period: Duration) -> Result<Self, ConfigError> {
        let mut channel = Self::new(line);
        channel.set_duty_cycle(duty_cycle)?;
        channel.set_period(period)?;
        Ok(channel)
    }

    /// Set the fraction of each period the line is held high.
    pub fn set_duty_cycle(&mut self, duty_cycle: f32) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&duty_cycle) {
            return Err(ConfigError::InvalidDutyCycle);
        }
        self.duty_cycle = duty_cycle;
        Ok(())
    }

    /// Set the cycle period.
    pub fn set_period(&mut self, period: Duration) -> Result<(), ConfigError> {
        if period.is_zero() {
            return Err(ConfigError::InvalidPeriod);
        }
        self.period = period;
        Ok(())
    }

    /// Replace the driven line, returning the previous one.
    ///
    /// Output capability is a property of the type: anything that is not an
    /// [`OutputPin`] cannot be assigned here in the first place.
    pub fn set_line(&mut self, line: L) -> L {
        core::mem::replace(&mut self.line, line)
    }

    pub fn set_wait_strategy(&mut self, wait: WaitStrategy) {
        self.wait = wait;
    }

    pub fn duty_cycle(&self) -> f32 {
        self.duty_cycle
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        self.wait
    }

    pub fn line(&self) -> &L {
        &self.line
    }

    /// Give the line back.
    pub fn release(self) -> L {
        self.line
    }
}

impl<L> PwmChannel<L>
where
    L: OutputPin + Send + 'static,
    L::Error: Send + 'static,
{
    /// Start a cycle worker bound to a snapshot of this channel.
    ///
    /// The worker first drives the line low, then repeats the on/off phases
    /// until stopped.  Reconfiguring a running cycle is not possible; stop
    /// it, adjust the returned channel and start again.
    pub fn start(self) -> PwmCycle<L> {
        let PwmChannel {
            line,
            duty_cycle,
            period,
            wait,
        } = self;
        let on_time = period.mul_f64(f64::from(duty_cycle));
        let off_time = period.saturating_sub(on_time);

        let controls = Arc::new(Controls::default());
        let worker_controls = Arc::clone(&controls);
        let handle =
            thread::spawn(move || run_cycle(line, on_time, off_time, wait, &worker_controls));

        PwmCycle {
            controls,
            handle: Some(handle),
            duty_cycle,
            period,
            wait,
        }
    }
}

#[derive(Default)]
struct Controls {
    stop: AtomicBool,
    pause: AtomicBool,
}

/// A running PWM cycle worker.
///
/// State machine: `start()` puts the worker in the running state; `pause()`
/// and `resume()` switch between running and paused; `stop()` is terminal and
/// consumes the worker.  Dropping a `PwmCycle` stops and joins it as well.
pub struct PwmCycle<L: OutputPin> {
    controls: Arc<Controls>,
    handle: Option<JoinHandle<Result<L, L::Error>>>,
    duty_cycle: f32,
    period: Duration,
    wait: WaitStrategy,
}

impl<L: OutputPin> PwmCycle<L> {
    /// Freeze toggling without terminating the worker.
    ///
    /// The line keeps whatever level it last had.  A paused worker keeps
    /// polling its controls, so `resume()` and `stop()` stay effective.
    pub fn pause(&self) {
        self.controls.pause.store(true, Ordering::Release);
    }

    /// Continue toggling after a [`pause()`][PwmCycle::pause].
    pub fn resume(&self) {
        self.controls.pause.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.controls.pause.load(Ordering::Acquire)
    }

    /// Whether the worker task is still alive (running or paused).
    pub fn is_running(&self) -> bool {
        !self.controls.stop.load(Ordering::Acquire)
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the worker and hand the channel back.
    ///
    /// The line is driven low before the worker terminates, the thread is
    /// joined, and the returned channel can be reconfigured and started
    /// again.  Stop latency is bounded by one full cycle plus the pause poll
    /// interval.
    pub fn stop(mut self) -> Result<PwmChannel<L>, CycleError<L::Error>> {
        self.controls.stop.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(Ok(line)) => Ok(PwmChannel {
                    line,
                    duty_cycle: self.duty_cycle,
                    period: self.period,
                    wait: self.wait,
                }),
                Ok(Err(error)) => Err(CycleError::Line(error)),
                Err(_) => Err(CycleError::Panicked),
            },
            None => Err(CycleError::Panicked),
        }
    }
}

impl<L: OutputPin> Drop for PwmCycle<L> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.controls.stop.store(true, Ordering::Release);
            let _ = handle.join();
        }
    }
}

fn run_cycle<L: OutputPin>(
    mut line: L,
    on_time: Duration,
    off_time: Duration,
    wait: WaitStrategy,
    controls: &Controls,
) -> Result<L, L::Error> {
    line.set_low()?;
    while !controls.stop.load(Ordering::Acquire) {
        if controls.pause.load(Ordering::Acquire) {
            thread::sleep(PAUSE_POLL);
            continue;
        }
        if !on_time.is_zero() {
            line.set_high()?;
            wait_until(Instant::now() + on_time, wait);
        }
        // re-check between phases so stop latency stays below one cycle
        if controls.stop.load(Ordering::Acquire) {
            break;
        }
        if !off_time.is_zero() {
            line.set_low()?;
            wait_until(Instant::now() + off_time, wait);
        }
    }
    line.set_low()?;
    Ok(line)
}

fn wait_until(deadline: Instant, wait: WaitStrategy) {
    match wait {
        WaitStrategy::Sleep => {
            thread::sleep(deadline.saturating_duration_since(Instant::now()));
        }
        WaitStrategy::Spin => {
            while Instant::now() < deadline {
                std::hint::spin_loop();
            }
        }
    }
}
