//! Recording collaborators and item fixtures for unit tests.

use std::{collections::HashMap, io, sync::Arc};

use parking_lot::Mutex;

use crate::{
    error::Error,
    feed::LinkOpener,
    item::{ContentType, Item, ItemId},
    playback::{MediaBackend, MediaControl},
    transition::{TransitionRequest, Viewport},
};

pub fn video(id: &str) -> Item {
    Item {
        id: ItemId::new(id),
        content_type: ContentType::Video,
        content_url: format!("https://cdn.example.com/{id}.mp4"),
        name: id.to_uppercase(),
        price: 10.0,
        description: String::new(),
        link_url: None,
    }
}

pub fn image(id: &str) -> Item {
    Item {
        id: ItemId::new(id),
        content_type: ContentType::Image,
        content_url: format!("https://cdn.example.com/{id}.jpg"),
        name: id.to_uppercase(),
        price: 5.0,
        description: String::new(),
        link_url: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCall {
    Play,
    Pause,
    SeekToStart,
    SetLooping(bool),
}

type CallLog = Arc<Mutex<HashMap<String, Vec<MediaCall>>>>;

#[derive(Clone)]
pub struct RecordingMedia {
    log: CallLog,
    fail: bool,
}

impl RecordingMedia {
    pub fn new() -> Self {
        Self {
            log: Arc::default(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self, id: &str) -> Vec<MediaCall> {
        self.log
            .lock()
            .get(id)
            .cloned()
            .unwrap_or_default()
    }
}

impl MediaBackend for RecordingMedia {
    fn open_video(&mut self, item: &Item) -> Result<Box<dyn MediaControl>, Error> {
        if self.fail {
            return Err(Error::MediaError(Box::new(io::Error::new(
                io::ErrorKind::Unsupported,
                "unsupported codec",
            ))));
        }
        Ok(Box::new(RecordingHandle {
            id: item.id.as_str().to_owned(),
            log: Arc::clone(&self.log),
        }))
    }
}

struct RecordingHandle {
    id: String,
    log: CallLog,
}

impl RecordingHandle {
    fn record(&self, call: MediaCall) {
        self.log
            .lock()
            .entry(self.id.clone())
            .or_default()
            .push(call);
    }
}

impl MediaControl for RecordingHandle {
    fn play(&mut self) {
        self.record(MediaCall::Play);
    }

    fn pause(&mut self) {
        self.record(MediaCall::Pause);
    }

    fn seek_to_start(&mut self) {
        self.record(MediaCall::SeekToStart);
    }

    fn set_looping(&mut self, looping: bool) {
        self.record(MediaCall::SetLooping(looping));
    }
}

#[derive(Default)]
struct ViewportState {
    requests: Vec<TransitionRequest>,
    failures_left: usize,
}

/// Records transition requests.  The next `n` requests after `fail_next(n)`
/// fail as not laid out.
#[derive(Clone, Default)]
pub struct RecordingViewport {
    state: Arc<Mutex<ViewportState>>,
}

impl RecordingViewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: usize) {
        self.state.lock().failures_left = n;
    }

    pub fn requests(&self) -> Vec<TransitionRequest> {
        self.state.lock().requests.clone()
    }
}

impl Viewport for RecordingViewport {
    fn scroll_to(&mut self, request: &TransitionRequest) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.requests.push(*request);
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(Error::TransitionNotReady {
                index: request.index,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingLinks {
    opened: Arc<Mutex<Vec<String>>>,
}

impl RecordingLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

impl LinkOpener for RecordingLinks {
    fn open(&mut self, url: &str) -> Result<(), Error> {
        self.opened.lock().push(url.to_owned());
        Ok(())
    }
}
