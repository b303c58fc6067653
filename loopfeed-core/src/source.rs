use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use crate::{
    error::Error,
    item::{validate_items, Item},
};

/// One reading of the item source.  `Loading` is distinct from a resolved,
/// empty sequence: the feed renders nothing interactive while loading.
#[derive(Clone, Debug, PartialEq)]
pub enum Snapshot {
    Loading,
    Ready(Vec<Item>),
}

impl Snapshot {
    pub fn items(&self) -> Option<&[Item]> {
        match self {
            Snapshot::Loading => None,
            Snapshot::Ready(items) => Some(items),
        }
    }
}

pub fn parse_products(json: &str) -> Result<Vec<Item>, Error> {
    let items: Vec<Item> = serde_json::from_str(json)?;
    validate_items(&items)?;
    Ok(items)
}

/// Reads the product list from a JSON file.  A missing file reads as
/// `Loading`, so a host can start before the export lands.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Snapshot, Error> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("product file {:?} not there yet", self.path);
                return Ok(Snapshot::Loading);
            }
            Err(err) => return Err(err.into()),
        };
        let items: Vec<Item> = serde_json::from_reader(BufReader::new(file))?;
        validate_items(&items)?;
        log::info!("read {} products from {:?}", items.len(), self.path);
        Ok(Snapshot::Ready(items))
    }
}
