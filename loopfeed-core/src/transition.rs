use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{
    coordinator::Advance,
    error::Error,
    timer::{TimerId, TimerKind, Timers},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionMode {
    Animated,
    Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionRequest {
    pub index: usize,
    /// Leading edge of the target item, `index * item_extent`.
    pub offset: f64,
    pub mode: TransitionMode,
}

/// Scrollable surface the feed is laid out on.  A target that cannot be
/// positioned yet fails with `Error::TransitionNotReady`, either right away or
/// later through `FeedCommand::TransitionFailed`.
pub trait Viewport: Send {
    fn scroll_to(&mut self, request: &TransitionRequest) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverConfig {
    pub item_extent: f64,
    pub wrap_mode: TransitionMode,
    pub retry_delay: Duration,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Issued,
    RetryScheduled,
    Abandoned,
    /// Report about a transition that is no longer in flight.
    Ignored,
}

struct InFlight {
    index: usize,
    retries: u32,
    retry_timer: Option<TimerId>,
}

/// Moves the viewport to requested indices and recovers from targets that are
/// not laid out yet.  Never touches the current index itself.
pub struct TransitionDriver {
    config: DriverConfig,
    in_flight: Option<InFlight>,
}

impl TransitionDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            in_flight: None,
        }
    }

    pub fn in_flight(&self) -> Option<usize> {
        self.in_flight.as_ref().map(|in_flight| in_flight.index)
    }

    pub fn request(&self, index: usize, mode: TransitionMode) -> TransitionRequest {
        TransitionRequest {
            index,
            offset: index as f64 * self.config.item_extent,
            mode,
        }
    }

    /// Stepping forward by one animates; jumping back to the start uses the
    /// configured wrap mode.
    pub fn plan(&self, advance: Advance) -> TransitionRequest {
        let mode = if advance.is_wraparound() {
            self.config.wrap_mode
        } else {
            TransitionMode::Animated
        };
        self.request(advance.to, mode)
    }

    /// Issue a fresh transition, replacing whatever was in flight.
    pub fn issue(
        &mut self,
        request: TransitionRequest,
        viewport: &mut dyn Viewport,
        now: Instant,
        timers: &mut Timers,
    ) -> Outcome {
        self.clear(timers);
        self.in_flight = Some(InFlight {
            index: request.index,
            retries: 0,
            retry_timer: None,
        });
        self.send(request, viewport, now, timers)
    }

    /// The transition to `index` could not be carried out.
    pub fn failed(&mut self, index: usize, now: Instant, timers: &mut Timers) -> Outcome {
        let in_flight = match &mut self.in_flight {
            Some(in_flight) if in_flight.index == index => in_flight,
            _ => {
                log::warn!("failure reported for stale transition to {}", index);
                return Outcome::Ignored;
            }
        };
        if in_flight.retry_timer.is_some() {
            return Outcome::RetryScheduled;
        }
        if in_flight.retries < self.config.max_retries {
            in_flight.retries += 1;
            in_flight.retry_timer = Some(timers.schedule(
                now,
                self.config.retry_delay,
                TimerKind::Retry { index },
            ));
            log::info!(
                "transition to {} failed, retrying in {:?}",
                index,
                self.config.retry_delay
            );
            Outcome::RetryScheduled
        } else {
            log::warn!("transition to {} failed again, giving up", index);
            self.in_flight = None;
            Outcome::Abandoned
        }
    }

    /// A retry timer came due.  Retries always jump without animation.
    pub fn retry_due(
        &mut self,
        index: usize,
        viewport: &mut dyn Viewport,
        now: Instant,
        timers: &mut Timers,
    ) -> Outcome {
        match &mut self.in_flight {
            Some(in_flight) if in_flight.index == index && in_flight.retry_timer.is_some() => {
                in_flight.retry_timer = None;
            }
            _ => return Outcome::Ignored,
        }
        let request = self.request(index, TransitionMode::Instant);
        self.send(request, viewport, now, timers)
    }

    /// The viewport settled on `index`.
    pub fn confirm(&mut self, index: usize, timers: &mut Timers) {
        if self.in_flight() == Some(index) {
            self.clear(timers);
        }
    }

    /// Drop the transition in flight, cancelling a pending retry.  Returns the
    /// index it was heading to.
    pub fn abandon(&mut self, timers: &mut Timers) -> Option<usize> {
        let index = self.in_flight();
        self.clear(timers);
        index
    }

    fn send(
        &mut self,
        request: TransitionRequest,
        viewport: &mut dyn Viewport,
        now: Instant,
        timers: &mut Timers,
    ) -> Outcome {
        match viewport.scroll_to(&request) {
            Ok(()) => Outcome::Issued,
            Err(Error::TransitionNotReady { index }) => self.failed(index, now, timers),
            Err(err) => {
                log::error!("viewport rejected transition to {}: {}", request.index, err);
                self.in_flight = None;
                Outcome::Abandoned
            }
        }
    }

    fn clear(&mut self, timers: &mut Timers) {
        if let Some(InFlight {
            retry_timer: Some(timer),
            ..
        }) = self.in_flight.take()
        {
            timers.cancel(timer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingViewport;

    const MS: Duration = Duration::from_millis(1);

    fn driver() -> TransitionDriver {
        TransitionDriver::new(DriverConfig {
            item_extent: 800.0,
            wrap_mode: TransitionMode::Instant,
            retry_delay: 100 * MS,
            max_retries: 1,
        })
    }

    #[test]
    fn plans_offsets_and_modes() {
        let driver = driver();
        let forward = driver.plan(Advance { from: 1, to: 2 });
        assert_eq!(forward.offset, 1600.0);
        assert_eq!(forward.mode, TransitionMode::Animated);
        let wrap = driver.plan(Advance { from: 4, to: 0 });
        assert_eq!(wrap.offset, 0.0);
        assert_eq!(wrap.mode, TransitionMode::Instant);
    }

    #[test]
    fn failed_transition_retries_once_without_animation() {
        let mut driver = driver();
        let mut viewport = RecordingViewport::new();
        let mut timers = Timers::new();
        let t0 = Instant::now();
        viewport.fail_next(2);

        let request = driver.plan(Advance { from: 0, to: 1 });
        assert_eq!(
            driver.issue(request, &mut viewport, t0, &mut timers),
            Outcome::RetryScheduled
        );
        assert!(timers.expire(t0 + 99 * MS).is_empty());
        let due = timers.expire(t0 + 100 * MS);
        assert_eq!(due, [TimerKind::Retry { index: 1 }]);

        assert_eq!(
            driver.retry_due(1, &mut viewport, t0 + 100 * MS, &mut timers),
            Outcome::Abandoned
        );
        assert!(timers.is_empty());
        assert_eq!(driver.in_flight(), None);

        let requests = viewport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].mode, TransitionMode::Animated);
        assert_eq!(requests[1].mode, TransitionMode::Instant);
        assert_eq!(requests[1].index, 1);
    }

    #[test]
    fn successful_retry_stays_in_flight_until_confirmed() {
        let mut driver = driver();
        let mut viewport = RecordingViewport::new();
        let mut timers = Timers::new();
        let t0 = Instant::now();
        viewport.fail_next(1);

        let request = driver.plan(Advance { from: 2, to: 3 });
        driver.issue(request, &mut viewport, t0, &mut timers);
        timers.expire(t0 + 100 * MS);
        assert_eq!(
            driver.retry_due(3, &mut viewport, t0 + 100 * MS, &mut timers),
            Outcome::Issued
        );
        assert_eq!(driver.in_flight(), Some(3));
        driver.confirm(3, &mut timers);
        assert_eq!(driver.in_flight(), None);
    }

    #[test]
    fn asynchronous_failure_report_is_bounded_too() {
        let mut driver = driver();
        let mut viewport = RecordingViewport::new();
        let mut timers = Timers::new();
        let t0 = Instant::now();

        let request = driver.plan(Advance { from: 0, to: 1 });
        assert_eq!(
            driver.issue(request, &mut viewport, t0, &mut timers),
            Outcome::Issued
        );
        assert_eq!(driver.failed(1, t0, &mut timers), Outcome::RetryScheduled);
        // A duplicate report while the retry is pending schedules nothing new.
        assert_eq!(driver.failed(1, t0, &mut timers), Outcome::RetryScheduled);
        assert_eq!(timers.len(), 1);
        timers.expire(t0 + 100 * MS);
        driver.retry_due(1, &mut viewport, t0 + 100 * MS, &mut timers);
        assert_eq!(
            driver.failed(1, t0 + 150 * MS, &mut timers),
            Outcome::Abandoned
        );
        assert_eq!(driver.failed(1, t0 + 150 * MS, &mut timers), Outcome::Ignored);
    }

    #[test]
    fn new_transition_cancels_pending_retry() {
        let mut driver = driver();
        let mut viewport = RecordingViewport::new();
        let mut timers = Timers::new();
        let t0 = Instant::now();
        viewport.fail_next(1);

        driver.issue(driver.request(1, TransitionMode::Animated), &mut viewport, t0, &mut timers);
        assert_eq!(timers.len(), 1);
        driver.issue(driver.request(2, TransitionMode::Animated), &mut viewport, t0, &mut timers);
        assert!(timers.is_empty());
        assert_eq!(driver.retry_due(1, &mut viewport, t0, &mut timers), Outcome::Ignored);
    }

    #[test]
    fn abandon_cancels_retry() {
        let mut driver = driver();
        let mut viewport = RecordingViewport::new();
        let mut timers = Timers::new();
        viewport.fail_next(1);
        let request = driver.request(1, TransitionMode::Animated);
        driver.issue(request, &mut viewport, Instant::now(), &mut timers);
        assert_eq!(driver.abandon(&mut timers), Some(1));
        assert!(timers.is_empty());
    }
}
