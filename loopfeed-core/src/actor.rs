use std::{
    fmt::Display,
    io,
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, SendError, Sender};

/// What the actor loop should do after a message has been handled.
pub enum Act<T: Actor> {
    /// Block until the next message arrives.
    Continue,
    /// Block until the next message arrives or `deadline` passes, in which case
    /// `timeout_msg` is handled instead.
    WaitUntil {
        deadline: Instant,
        timeout_msg: T::Message,
    },
    Shutdown,
}

pub trait Actor: Sized {
    type Message: Send + 'static;
    type Error: Display;

    /// Handle one message.  `now` is sampled by the loop right before the call,
    /// so timer-driven actors never read the clock themselves.
    fn handle(&mut self, msg: Self::Message, now: Instant) -> Result<Act<Self>, Self::Error>;

    fn process(mut self, recv: Receiver<Self::Message>) {
        let mut act = Act::Continue;
        loop {
            let msg = match act {
                Act::Continue => match recv.recv() {
                    Ok(msg) => msg,
                    Err(_) => {
                        break;
                    }
                },
                Act::WaitUntil {
                    deadline,
                    timeout_msg,
                } => match recv.recv_deadline(deadline) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => timeout_msg,
                    Err(RecvTimeoutError::Disconnected) => {
                        break;
                    }
                },
                Act::Shutdown => {
                    break;
                }
            };
            act = match self.handle(msg, Instant::now()) {
                Ok(act) => act,
                Err(err) => {
                    log::error!("actor stopped: {}", err);
                    break;
                }
            };
        }
    }

    /// Run the actor on its own named thread.  The factory receives a sender
    /// into the actor's own inbox, so collaborators built inside it can post
    /// events back.
    fn spawn<F>(name: &str, cap: Capacity, factory: F) -> io::Result<ActorHandle<Self::Message>>
    where
        F: FnOnce(Sender<Self::Message>) -> Self + Send + 'static,
    {
        let (send, recv) = cap.to_channel();
        let thread = thread::Builder::new().name(name.to_owned()).spawn({
            let send = send.clone();
            move || factory(send).process(recv)
        })?;
        Ok(ActorHandle {
            sender: send,
            thread,
        })
    }
}

pub struct ActorHandle<M> {
    thread: JoinHandle<()>,
    sender: Sender<M>,
}

impl<M> ActorHandle<M> {
    pub fn sender(&self) -> Sender<M> {
        self.sender.clone()
    }

    pub fn join(self) {
        drop(self.sender);
        let _ = self.thread.join();
    }

    pub fn send(&self, msg: M) -> Result<(), SendError<M>> {
        self.sender.send(msg)
    }
}

pub enum Capacity {
    Sync,
    Bounded(usize),
    Unbounded,
}

impl Capacity {
    pub fn to_channel<T>(&self) -> (Sender<T>, Receiver<T>) {
        match self {
            Capacity::Sync => bounded(0),
            Capacity::Bounded(cap) => bounded(*cap),
            Capacity::Unbounded => unbounded(),
        }
    }
}
