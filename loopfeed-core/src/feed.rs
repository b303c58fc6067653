use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    time::Instant,
};

use crossbeam_channel::Sender;

use crate::{
    actor::{Act, Actor},
    config::FeedConfig,
    coordinator::{AdvanceCoordinator, Interaction},
    error::Error,
    item::{validate_items, Item, ItemId},
    playback::{ItemPlayback, MediaBackend, Occupancy, PlaybackTimings},
    source::Snapshot,
    timer::{TimerId, TimerKind, Timers},
    transition::{Outcome, TransitionDriver, TransitionMode, Viewport},
    util::Sequence,
    visibility::ViewabilityTracker,
};

/// Opens an item's external link, bound to a long press.
pub trait LinkOpener: Send {
    fn open(&mut self, url: &str) -> Result<(), Error>;
}

/// Platform pieces the feed drives but does not own the behaviour of.
pub struct Collaborators {
    pub media: Box<dyn MediaBackend>,
    pub viewport: Box<dyn Viewport>,
    pub links: Box<dyn LinkOpener>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedCommand {
    /// The item source produced a new snapshot.
    Load(Snapshot),
    /// The user put a finger on the list.
    DragBegin,
    /// Scrolling momentum settled after a drag.
    MomentumEnd,
    /// The viewport's leading edge moved to `offset`.
    Scrolled { offset: f64 },
    /// The host decided on its own which item is on screen.
    VisibleIndexChanged { index: usize },
    PlaybackEnded { id: ItemId },
    MediaFailed { id: ItemId },
    /// The viewport could not position `index` after accepting the request.
    TransitionFailed { index: usize },
    LongPress { index: usize },
    /// Check timers and pending visibility changes.
    Tick,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Command(FeedCommand),
    /// The source has not resolved yet.  Nothing is interactive.
    Loading,
    /// A snapshot with `len` items replaced the previous one.
    Ready { len: usize },
    /// `id` at `index` became the visible item.  Its playback started.
    Presenting { index: usize, id: ItemId },
    /// The visible item completed its presentation.  `Advancing` follows
    /// unless the user is scrolling.
    Finished { index: usize },
    /// A transition towards `to` was handed to the viewport.
    Advancing {
        from: usize,
        to: usize,
        mode: TransitionMode,
    },
    /// The transition failed and will be retried once without animation.
    RetryScheduled { index: usize },
    /// The transition was dropped.  Manual scrolling still works.
    TransitionAbandoned { index: usize },
}

pub struct Feed {
    config: FeedConfig,
    timings: PlaybackTimings,
    items: Option<Vec<Item>>,
    coordinator: AdvanceCoordinator,
    driver: TransitionDriver,
    tracker: ViewabilityTracker,
    timers: Timers,
    playbacks: HashMap<ItemId, ItemPlayback>,
    presenting: Option<ItemId>,
    occupancies: Sequence<u64>,
    settle_timer: Option<TimerId>,
    media: Box<dyn MediaBackend>,
    viewport: Box<dyn Viewport>,
    links: Box<dyn LinkOpener>,
    events: Sender<FeedEvent>,
}

impl Feed {
    pub fn new(config: FeedConfig, collaborators: Collaborators, events: Sender<FeedEvent>) -> Self {
        let Collaborators {
            media,
            viewport,
            links,
        } = collaborators;
        Self {
            timings: config.playback(),
            driver: TransitionDriver::new(config.driver()),
            tracker: ViewabilityTracker::new(
                config.viewability(),
                config.item_extent,
                config.viewport_extent,
            ),
            config,
            items: None,
            coordinator: AdvanceCoordinator::new(),
            timers: Timers::new(),
            playbacks: HashMap::new(),
            presenting: None,
            occupancies: Sequence::new(0),
            settle_timer: None,
            media,
            viewport,
            links,
            events,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.items.is_none()
    }

    pub fn items(&self) -> &[Item] {
        self.items.as_deref().unwrap_or_default()
    }

    pub fn current(&self) -> Option<usize> {
        self.coordinator.current()
    }

    pub fn current_item(&self) -> Option<&Item> {
        self.items().get(self.current()?)
    }

    pub fn interaction(&self) -> Interaction {
        self.coordinator.interaction()
    }

    /// Earliest moment a `Tick` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.timers.next_deadline(), self.tracker.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn handle_event(&mut self, event: FeedEvent, now: Instant) {
        match event {
            FeedEvent::Command(cmd) => {
                self.handle_command(cmd, now);
            }
            FeedEvent::Loading
            | FeedEvent::Ready { .. }
            | FeedEvent::Presenting { .. }
            | FeedEvent::Finished { .. }
            | FeedEvent::Advancing { .. }
            | FeedEvent::RetryScheduled { .. }
            | FeedEvent::TransitionAbandoned { .. } => {
                log::debug!("feed: {:?}", event);
            }
        }
    }

    fn handle_command(&mut self, cmd: FeedCommand, now: Instant) {
        match cmd {
            FeedCommand::Load(snapshot) => self.load(snapshot, now),
            FeedCommand::Tick => self.tick(now),
            FeedCommand::Shutdown => self.hide_presenting(),
            _ if self.is_loading() => {
                log::debug!("still loading, ignoring {:?}", cmd);
            }
            FeedCommand::DragBegin => self.drag_begin(),
            FeedCommand::MomentumEnd => self.momentum_end(now),
            FeedCommand::Scrolled { offset } => self.scrolled(offset, now),
            FeedCommand::VisibleIndexChanged { index } => self.observe(index, now),
            FeedCommand::PlaybackEnded { id } => self.playback_ended(id, now),
            FeedCommand::MediaFailed { id } => {
                log::error!("media for {} failed, waiting for the user to move on", id);
            }
            FeedCommand::TransitionFailed { index } => {
                let outcome = self.driver.failed(index, now, &mut self.timers);
                self.transition_outcome(outcome, index);
            }
            FeedCommand::LongPress { index } => self.long_press(index),
        }
    }

    fn load(&mut self, snapshot: Snapshot, now: Instant) {
        let items = match snapshot {
            Snapshot::Loading => {
                self.hide_presenting();
                if let Some(index) = self.driver.abandon(&mut self.timers) {
                    log::info!("feed is loading, dropping transition to {}", index);
                }
                self.cancel_settle_timer();
                self.coordinator.reset_interaction();
                self.tracker.reset();
                self.items = None;
                self.emit(FeedEvent::Loading);
                return;
            }
            Snapshot::Ready(items) => items,
        };
        if let Err(err) = validate_items(&items) {
            log::error!("rejecting snapshot: {}", err);
            return;
        }

        // Keep playback state of items that survived the refetch.
        let ids: HashSet<&ItemId> = items.iter().map(|item| &item.id).collect();
        let presenting_removed = self
            .presenting
            .as_ref()
            .is_some_and(|id| !ids.contains(id));
        if presenting_removed {
            self.hide_presenting();
        }
        self.playbacks.retain(|id, _| ids.contains(id));

        let len = items.len();
        self.items = Some(items);
        if self.coordinator.set_len(len) {
            log::info!("feed shrank to {} items, current index clamped", len);
        }
        if let Some(target) = self.driver.in_flight() {
            if target >= len {
                self.driver.abandon(&mut self.timers);
            }
        }
        self.tracker.reset();
        self.emit(FeedEvent::Ready { len });
        self.sync_presentation(now);
    }

    fn drag_begin(&mut self) {
        self.coordinator.drag_begin();
        self.cancel_settle_timer();
    }

    fn momentum_end(&mut self, now: Instant) {
        self.coordinator.drag_end();
        // A finish swallowed by the drag would leave the item stuck once the
        // list settles back on it.
        let swallowed = self
            .presenting
            .as_ref()
            .and_then(|id| self.playbacks.get(id))
            .is_some_and(ItemPlayback::is_finished);
        if swallowed && self.coordinator.interaction() == Interaction::Idle {
            log::info!("replaying item finished during drag");
            self.restart_presenting(now);
        }
    }

    fn scrolled(&mut self, offset: f64, now: Instant) {
        let len = self.items().len();
        if let Some(index) = self.tracker.scrolled(offset, len, now) {
            self.observe(index, now);
        }
    }

    fn observe(&mut self, index: usize, now: Instant) {
        self.driver.confirm(index, &mut self.timers);
        let changed = self.coordinator.observe_visible(index).is_some();
        if !matches!(self.coordinator.interaction(), Interaction::AutoAdvancing { .. }) {
            self.cancel_settle_timer();
        }
        if changed {
            self.sync_presentation(now);
        }
    }

    fn playback_ended(&mut self, id: ItemId, now: Instant) {
        if self.presenting.as_ref() != Some(&id) {
            log::info!("end of playback from hidden item {}, ignoring", id);
            return;
        }
        let finished = match self.playbacks.get_mut(&id) {
            Some(playback) => playback.playback_ended(&mut self.timers),
            None => None,
        };
        if finished.is_some() {
            self.finished(now);
        }
    }

    fn finished(&mut self, now: Instant) {
        let Some(index) = self.coordinator.current() else {
            return;
        };
        self.emit(FeedEvent::Finished { index });
        let Some(advance) = self.coordinator.finished() else {
            return;
        };
        if advance.is_in_place() {
            log::info!("only one item, replaying it");
            self.restart_presenting(now);
            return;
        }

        let request = self.driver.plan(advance);
        log::info!(
            "advancing from {} to {} ({:?})",
            advance.from,
            advance.to,
            request.mode
        );
        self.emit(FeedEvent::Advancing {
            from: advance.from,
            to: advance.to,
            mode: request.mode,
        });
        self.cancel_settle_timer();
        self.settle_timer = Some(self.timers.schedule(
            now,
            self.config.settle_timeout(),
            TimerKind::Settle { target: advance.to },
        ));
        let outcome = self
            .driver
            .issue(request, self.viewport.as_mut(), now, &mut self.timers);
        self.transition_outcome(outcome, advance.to);
    }

    fn transition_outcome(&mut self, outcome: Outcome, index: usize) {
        match outcome {
            Outcome::Issued | Outcome::Ignored => {}
            Outcome::RetryScheduled => {
                self.emit(FeedEvent::RetryScheduled { index });
            }
            Outcome::Abandoned => {
                self.coordinator.abandon(index);
                self.cancel_settle_timer();
                self.emit(FeedEvent::TransitionAbandoned { index });
            }
        }
    }

    fn tick(&mut self, now: Instant) {
        for kind in self.timers.expire(now) {
            match kind {
                TimerKind::Dwell { occupancy } | TimerKind::Stall { occupancy } => {
                    self.presentation_timer(kind, occupancy, now);
                }
                TimerKind::Retry { index } => {
                    // Only retry while the advance that asked for it still stands.
                    let wanted = Interaction::AutoAdvancing { target: index };
                    if self.coordinator.interaction() != wanted {
                        log::info!("advance to {} no longer wanted, dropping retry", index);
                        self.driver.abandon(&mut self.timers);
                        self.emit(FeedEvent::TransitionAbandoned { index });
                        continue;
                    }
                    let outcome =
                        self.driver
                            .retry_due(index, self.viewport.as_mut(), now, &mut self.timers);
                    self.transition_outcome(outcome, index);
                }
                TimerKind::Settle { target } => {
                    self.settle_timer = None;
                    if self.coordinator.interaction() == (Interaction::AutoAdvancing { target }) {
                        log::warn!("transition to {} never settled", target);
                        self.driver.abandon(&mut self.timers);
                        self.coordinator.abandon(target);
                    }
                }
            }
        }
        if let Some(index) = self.tracker.poll(now) {
            self.observe(index, now);
        }
    }

    fn presentation_timer(&mut self, kind: TimerKind, occupancy: Occupancy, now: Instant) {
        let finished = self
            .presenting
            .as_ref()
            .and_then(|id| self.playbacks.get_mut(id))
            .and_then(|playback| playback.timer_expired(kind));
        match finished {
            Some(finished) if finished == occupancy => self.finished(now),
            _ => log::debug!("stale {:?}", kind),
        }
    }

    fn long_press(&mut self, index: usize) {
        let Some(item) = self.items().get(index) else {
            log::warn!("long press on missing item {}", index);
            return;
        };
        let Some(url) = item.link_url.clone() else {
            return;
        };
        log::info!("opening link of {}: {}", item.id, url);
        if let Err(err) = self.links.open(&url) {
            log::error!("failed to open {}: {}", url, err);
        }
    }

    /// Make the item at the current index the one that plays, hiding the
    /// previous one.
    fn sync_presentation(&mut self, now: Instant) {
        let Some(index) = self.coordinator.current() else {
            self.hide_presenting();
            return;
        };
        let Some(item) = self.items.as_deref().and_then(|items| items.get(index)) else {
            return;
        };
        if self.presenting.as_ref() == Some(&item.id) {
            return;
        }
        let id = item.id.clone();
        if let Some(previous) = self.presenting.take() {
            if let Some(playback) = self.playbacks.get_mut(&previous) {
                playback.hide(&mut self.timers);
            }
        }

        let occupancy = Occupancy(self.occupancies.advance());
        let playback = match self.playbacks.entry(id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(ItemPlayback::open(item, self.media.as_mut())),
        };
        playback.show(occupancy, now, &self.timings, &mut self.timers);
        log::info!("presenting {} at {}", id, index);
        self.presenting = Some(id.clone());
        self.emit(FeedEvent::Presenting { index, id });
    }

    fn restart_presenting(&mut self, now: Instant) {
        let occupancy = Occupancy(self.occupancies.advance());
        if let Some(playback) = self
            .presenting
            .as_ref()
            .and_then(|id| self.playbacks.get_mut(id))
        {
            playback.restart(occupancy, now, &self.timings, &mut self.timers);
        }
    }

    fn hide_presenting(&mut self) {
        if let Some(id) = self.presenting.take() {
            if let Some(playback) = self.playbacks.get_mut(&id) {
                playback.hide(&mut self.timers);
            }
        }
    }

    fn cancel_settle_timer(&mut self) {
        if let Some(timer) = self.settle_timer.take() {
            self.timers.cancel(timer);
        }
    }

    fn emit(&self, event: FeedEvent) {
        if self.events.send(event).is_err() {
            log::warn!("feed event receiver is gone");
        }
    }
}

impl Actor for Feed {
    type Message = FeedEvent;
    type Error = Error;

    fn handle(&mut self, msg: FeedEvent, now: Instant) -> Result<Act<Self>, Error> {
        let shutdown = msg == FeedEvent::Command(FeedCommand::Shutdown);
        self.handle_event(msg, now);
        if shutdown {
            return Ok(Act::Shutdown);
        }
        Ok(match self.next_deadline() {
            Some(deadline) => Act::WaitUntil {
                deadline,
                timeout_msg: FeedEvent::Command(FeedCommand::Tick),
            },
            None => Act::Continue,
        })
    }
}
