use std::{error, fmt, io};

use crate::item::ItemId;

#[derive(Debug)]
pub enum Error {
    EmptyContentUrl { id: ItemId },
    DuplicateItemId { id: ItemId },
    TransitionNotReady { index: usize },
    MediaError(Box<dyn error::Error + Send>),
    LinkError(Box<dyn error::Error + Send>),
    JsonError(Box<dyn error::Error + Send>),
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyContentUrl { id } => write!(f, "Item {id} has no content URL"),
            Self::DuplicateItemId { id } => write!(f, "Duplicate item id {id}"),
            Self::TransitionNotReady { index } => {
                write!(f, "Transition target {index} is not laid out yet")
            }
            Self::MediaError(err) | Self::LinkError(err) | Self::JsonError(err) => err.fmt(f),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::JsonError(Box::new(err))
    }
}
