#![allow(clippy::new_without_default)]

pub mod actor;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod feed;
pub mod item;
pub mod playback;
pub mod source;
pub mod timer;
pub mod transition;
pub mod util;
pub mod visibility;

#[cfg(test)]
mod testing;
