use std::{
    mem,
    time::{Duration, Instant},
};

use crate::{
    error::Error,
    item::{ContentType, Item, ItemId},
    timer::{TimerId, TimerKind, Timers},
};

/// Token for one uninterrupted visible period of one item.  Timer expiries
/// and end-of-playback reports carrying an older token are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Occupancy(pub(crate) u64);

/// Playback controls of one opened video.
pub trait MediaControl: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek_to_start(&mut self);
    fn set_looping(&mut self, looping: bool);
}

/// Platform media capability.  End of playback is reported back to the feed as
/// `FeedCommand::PlaybackEnded`.
pub trait MediaBackend: Send {
    fn open_video(&mut self, item: &Item) -> Result<Box<dyn MediaControl>, Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackTimings {
    /// How long an image stays up before it counts as finished.
    pub dwell: Duration,
    /// Give up waiting for a video's end after this long.  `None` waits
    /// forever.
    pub stall_timeout: Option<Duration>,
}

enum Presentation {
    /// `None` if the media could not be opened.
    Video(Option<Box<dyn MediaControl>>),
    Image,
}

enum SignalState {
    Hidden,
    Presenting {
        occupancy: Occupancy,
        timer: Option<TimerId>,
    },
    Finished {
        occupancy: Occupancy,
    },
}

/// Drives one item's media while it is visible and turns its end (or the
/// image dwell) into a single finished signal per occupancy.
pub struct ItemPlayback {
    id: ItemId,
    presentation: Presentation,
    state: SignalState,
}

impl ItemPlayback {
    pub fn open(item: &Item, media: &mut dyn MediaBackend) -> Self {
        let presentation = match item.content_type {
            ContentType::Video => match media.open_video(item) {
                Ok(mut handle) => {
                    // Play once, then stop, so the end can be observed.
                    handle.set_looping(false);
                    Presentation::Video(Some(handle))
                }
                Err(err) => {
                    log::error!("failed to open video {}: {}", item.id, err);
                    Presentation::Video(None)
                }
            },
            ContentType::Image => Presentation::Image,
        };
        Self {
            id: item.id.clone(),
            presentation,
            state: SignalState::Hidden,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn occupancy(&self) -> Option<Occupancy> {
        match self.state {
            SignalState::Hidden => None,
            SignalState::Presenting { occupancy, .. } | SignalState::Finished { occupancy } => {
                Some(occupancy)
            }
        }
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self.state, SignalState::Hidden)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SignalState::Finished { .. })
    }

    pub fn show(
        &mut self,
        occupancy: Occupancy,
        now: Instant,
        timings: &PlaybackTimings,
        timers: &mut Timers,
    ) {
        if self.is_visible() {
            return;
        }
        let timer = match &mut self.presentation {
            Presentation::Video(handle) => {
                match handle {
                    Some(handle) => {
                        // Replays always start from the beginning.
                        handle.seek_to_start();
                        handle.play();
                    }
                    None => log::warn!("showing {} without playable media", self.id),
                }
                timings
                    .stall_timeout
                    .map(|timeout| timers.schedule(now, timeout, TimerKind::Stall { occupancy }))
            }
            Presentation::Image => {
                Some(timers.schedule(now, timings.dwell, TimerKind::Dwell { occupancy }))
            }
        };
        self.state = SignalState::Presenting { occupancy, timer };
    }

    pub fn hide(&mut self, timers: &mut Timers) {
        match mem::replace(&mut self.state, SignalState::Hidden) {
            SignalState::Hidden => return,
            SignalState::Presenting {
                timer: Some(timer), ..
            } => {
                timers.cancel(timer);
            }
            SignalState::Presenting { timer: None, .. } | SignalState::Finished { .. } => {}
        }
        if let Presentation::Video(Some(handle)) = &mut self.presentation {
            // Progress is discarded, the next occupancy starts over.
            handle.pause();
            handle.seek_to_start();
        }
    }

    /// Start a fresh occupancy of an item that stays on screen.
    pub fn restart(
        &mut self,
        occupancy: Occupancy,
        now: Instant,
        timings: &PlaybackTimings,
        timers: &mut Timers,
    ) {
        self.hide(timers);
        self.show(occupancy, now, timings, timers);
    }

    /// The video reached its end.  Returns the occupancy that just finished,
    /// or `None` if this report is a duplicate or arrived while hidden.
    pub fn playback_ended(&mut self, timers: &mut Timers) -> Option<Occupancy> {
        if !matches!(self.presentation, Presentation::Video(_)) {
            log::warn!("end of playback reported for image {}", self.id);
            return None;
        }
        self.finish(timers)
    }

    pub fn timer_expired(&mut self, kind: TimerKind) -> Option<Occupancy> {
        let expected = match (&self.presentation, kind) {
            (Presentation::Image, TimerKind::Dwell { occupancy }) => occupancy,
            (Presentation::Video(_), TimerKind::Stall { occupancy }) => {
                log::warn!("video {} stalled, moving on", self.id);
                occupancy
            }
            _ => return None,
        };
        match self.state {
            SignalState::Presenting { occupancy, .. } if occupancy == expected => {
                self.state = SignalState::Finished { occupancy };
                Some(occupancy)
            }
            _ => None,
        }
    }

    fn finish(&mut self, timers: &mut Timers) -> Option<Occupancy> {
        match self.state {
            SignalState::Presenting { occupancy, timer } => {
                if let Some(timer) = timer {
                    timers.cancel(timer);
                }
                self.state = SignalState::Finished { occupancy };
                Some(occupancy)
            }
            SignalState::Finished { .. } | SignalState::Hidden => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{image, video, MediaCall, RecordingMedia};

    const MS: Duration = Duration::from_millis(1);

    fn timings() -> PlaybackTimings {
        PlaybackTimings {
            dwell: 4000 * MS,
            stall_timeout: None,
        }
    }

    #[test]
    fn video_resets_position_on_every_hide() {
        let mut media = RecordingMedia::new();
        let mut timers = Timers::new();
        let now = Instant::now();
        let mut playback = ItemPlayback::open(&video("v"), &mut media);

        playback.show(Occupancy(1), now, &timings(), &mut timers);
        playback.hide(&mut timers);
        playback.show(Occupancy(2), now, &timings(), &mut timers);
        playback.hide(&mut timers);

        use MediaCall::*;
        assert_eq!(
            media.calls("v"),
            [
                SetLooping(false),
                SeekToStart,
                Play,
                Pause,
                SeekToStart,
                SeekToStart,
                Play,
                Pause,
                SeekToStart,
            ]
        );
    }

    #[test]
    fn duplicate_end_of_playback_finishes_once() {
        let mut media = RecordingMedia::new();
        let mut timers = Timers::new();
        let mut playback = ItemPlayback::open(&video("v"), &mut media);
        playback.show(Occupancy(7), Instant::now(), &timings(), &mut timers);

        assert_eq!(playback.playback_ended(&mut timers), Some(Occupancy(7)));
        assert_eq!(playback.playback_ended(&mut timers), None);
        assert!(playback.is_finished());

        // Guard resets with the next occupancy.
        playback.hide(&mut timers);
        playback.show(Occupancy(8), Instant::now(), &timings(), &mut timers);
        assert_eq!(playback.playback_ended(&mut timers), Some(Occupancy(8)));
    }

    #[test]
    fn end_of_playback_while_hidden_is_ignored() {
        let mut media = RecordingMedia::new();
        let mut timers = Timers::new();
        let mut playback = ItemPlayback::open(&video("v"), &mut media);
        assert_eq!(playback.playback_ended(&mut timers), None);
    }

    #[test]
    fn image_finishes_once_after_dwell() {
        let mut media = RecordingMedia::new();
        let mut timers = Timers::new();
        let t0 = Instant::now();
        let mut playback = ItemPlayback::open(&image("i"), &mut media);
        playback.show(Occupancy(1), t0, &timings(), &mut timers);

        assert!(timers.expire(t0 + 3999 * MS).is_empty());
        let due = timers.expire(t0 + 4000 * MS);
        assert_eq!(due, [TimerKind::Dwell { occupancy: Occupancy(1) }]);
        assert_eq!(playback.timer_expired(due[0]), Some(Occupancy(1)));
        assert_eq!(playback.timer_expired(due[0]), None);
        assert!(media.calls("i").is_empty());
    }

    #[test]
    fn hiding_image_before_dwell_cancels() {
        let mut media = RecordingMedia::new();
        let mut timers = Timers::new();
        let t0 = Instant::now();
        let mut playback = ItemPlayback::open(&image("i"), &mut media);
        playback.show(Occupancy(1), t0, &timings(), &mut timers);

        let _ = timers.expire(t0 + 3999 * MS);
        playback.hide(&mut timers);
        assert!(timers.expire(t0 + 10_000 * MS).is_empty());
        assert!(!playback.is_finished());
    }

    #[test]
    fn stale_dwell_expiry_is_ignored() {
        let mut media = RecordingMedia::new();
        let mut timers = Timers::new();
        let mut playback = ItemPlayback::open(&image("i"), &mut media);
        playback.show(Occupancy(2), Instant::now(), &timings(), &mut timers);
        assert_eq!(
            playback.timer_expired(TimerKind::Dwell {
                occupancy: Occupancy(1)
            }),
            None
        );
    }

    #[test]
    fn stall_timeout_finishes_silent_video() {
        let mut media = RecordingMedia::new();
        let mut timers = Timers::new();
        let t0 = Instant::now();
        let timings = PlaybackTimings {
            stall_timeout: Some(30_000 * MS),
            ..timings()
        };
        let mut playback = ItemPlayback::open(&video("v"), &mut media);
        playback.show(Occupancy(1), t0, &timings, &mut timers);

        let due = timers.expire(t0 + 30_000 * MS);
        assert_eq!(due, [TimerKind::Stall { occupancy: Occupancy(1) }]);
        assert_eq!(playback.timer_expired(due[0]), Some(Occupancy(1)));
        // A late natural end does not fire a second time.
        assert_eq!(playback.playback_ended(&mut timers), None);
    }

    #[test]
    fn natural_end_cancels_stall_timer() {
        let mut media = RecordingMedia::new();
        let mut timers = Timers::new();
        let timings = PlaybackTimings {
            stall_timeout: Some(30_000 * MS),
            ..timings()
        };
        let mut playback = ItemPlayback::open(&video("v"), &mut media);
        playback.show(Occupancy(1), Instant::now(), &timings, &mut timers);
        assert_eq!(timers.len(), 1);
        playback.playback_ended(&mut timers);
        assert!(timers.is_empty());
    }

    #[test]
    fn failed_open_leaves_video_without_media() {
        let mut media = RecordingMedia::failing();
        let mut timers = Timers::new();
        let mut playback = ItemPlayback::open(&video("v"), &mut media);
        playback.show(Occupancy(1), Instant::now(), &timings(), &mut timers);
        assert!(playback.is_visible());
        assert!(timers.is_empty());
        assert!(media.calls("v").is_empty());
    }
}
