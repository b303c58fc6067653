use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::Sender;
use loopfeed_core::{
    error::Error,
    feed::{FeedCommand, FeedEvent, LinkOpener},
    item::{Item, ItemId},
    playback::{MediaBackend, MediaControl},
    transition::{TransitionMode, TransitionRequest, Viewport},
};
use parking_lot::Mutex;

const ANIMATION_STEPS: u32 = 6;
const ANIMATION_LENGTH: Duration = Duration::from_millis(300);

/// What the terminal "screen" currently shows.  Shared between the viewport
/// and the stdin thread, which fakes swipes.
pub struct Screen {
    pub item_extent: f64,
    pub offset: f64,
    pub len: usize,
    /// Indices that have been rendered at least once and can be scrolled to.
    laid_out: HashSet<usize>,
}

impl Screen {
    pub fn new(item_extent: f64) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            item_extent,
            offset: 0.0,
            len: 0,
            laid_out: HashSet::from([0, 1]),
        }))
    }

    pub fn index(&self) -> usize {
        (self.offset / self.item_extent).round().max(0.0) as usize
    }

    fn render_around(&mut self, index: usize) {
        self.laid_out.insert(index);
        self.laid_out.insert(index + 1);
    }
}

/// Videos "play" by sleeping for a fixed length on a helper thread.
pub struct SimulatedMedia {
    events: Sender<FeedEvent>,
    length: Duration,
}

impl SimulatedMedia {
    pub fn new(events: Sender<FeedEvent>, length: Duration) -> Self {
        Self { events, length }
    }
}

impl MediaBackend for SimulatedMedia {
    fn open_video(&mut self, item: &Item) -> Result<Box<dyn MediaControl>, Error> {
        log::info!("opening {} ({})", item.content_url, item.name);
        Ok(Box::new(SimulatedVideo {
            id: item.id.clone(),
            events: self.events.clone(),
            length: self.length,
            generation: Arc::new(AtomicU64::new(0)),
        }))
    }
}

struct SimulatedVideo {
    id: ItemId,
    events: Sender<FeedEvent>,
    length: Duration,
    generation: Arc<AtomicU64>,
}

impl MediaControl for SimulatedVideo {
    fn play(&mut self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let events = self.events.clone();
        let id = self.id.clone();
        let length = self.length;
        thread::spawn(move || {
            thread::sleep(length);
            // Paused or restarted in the meantime.
            if current.load(Ordering::SeqCst) == generation {
                let _ = events.send(FeedEvent::Command(FeedCommand::PlaybackEnded { id }));
            }
        });
    }

    fn pause(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn seek_to_start(&mut self) {
        log::debug!("{}: rewind", self.id);
    }

    fn set_looping(&mut self, looping: bool) {
        log::debug!("{}: looping {}", self.id, looping);
    }
}

/// Targets that were never rendered fail the first time, like a lazily laid
/// out list would.
pub struct SimulatedViewport {
    events: Sender<FeedEvent>,
    screen: Arc<Mutex<Screen>>,
}

impl SimulatedViewport {
    pub fn new(events: Sender<FeedEvent>, screen: Arc<Mutex<Screen>>) -> Self {
        Self { events, screen }
    }
}

impl Viewport for SimulatedViewport {
    fn scroll_to(&mut self, request: &TransitionRequest) -> Result<(), Error> {
        let from = {
            let mut screen = self.screen.lock();
            if !screen.laid_out.contains(&request.index) {
                screen.render_around(request.index);
                return Err(Error::TransitionNotReady {
                    index: request.index,
                });
            }
            screen.render_around(request.index);
            screen.offset
        };
        match request.mode {
            TransitionMode::Instant => {
                scroll(&self.events, &self.screen, request.offset);
            }
            TransitionMode::Animated => {
                let events = self.events.clone();
                let screen = Arc::clone(&self.screen);
                let to = request.offset;
                thread::spawn(move || {
                    for step in 1..=ANIMATION_STEPS {
                        thread::sleep(ANIMATION_LENGTH / ANIMATION_STEPS);
                        let progress = f64::from(step) / f64::from(ANIMATION_STEPS);
                        scroll(&events, &screen, from + (to - from) * progress);
                    }
                });
            }
        }
        Ok(())
    }
}

/// Drag the screen by `delta` items, the way a finger would.
pub fn swipe(events: &Sender<FeedEvent>, screen: &Arc<Mutex<Screen>>, delta: isize) {
    let (from, to) = {
        let mut screen = screen.lock();
        if screen.len == 0 {
            return;
        }
        let target = screen
            .index()
            .saturating_add_signed(delta)
            .min(screen.len - 1);
        screen.render_around(target);
        (screen.offset, target as f64 * screen.item_extent)
    };
    let _ = events.send(FeedEvent::Command(FeedCommand::DragBegin));
    for step in 1..=ANIMATION_STEPS {
        let progress = f64::from(step) / f64::from(ANIMATION_STEPS);
        scroll(events, screen, from + (to - from) * progress);
    }
    let _ = events.send(FeedEvent::Command(FeedCommand::MomentumEnd));
}

fn scroll(events: &Sender<FeedEvent>, screen: &Mutex<Screen>, offset: f64) {
    screen.lock().offset = offset;
    let _ = events.send(FeedEvent::Command(FeedCommand::Scrolled { offset }));
}

pub struct SystemLinks;

impl LinkOpener for SystemLinks {
    fn open(&mut self, url: &str) -> Result<(), Error> {
        open::that(url).map_err(|err| Error::LinkError(Box::new(err)))
    }
}
