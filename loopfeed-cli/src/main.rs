mod simulate;

use std::{
    env,
    io::{self, BufRead},
    path::PathBuf,
    process,
    time::Duration,
};

use loopfeed_core::{
    actor::{Actor, Capacity},
    config::FeedConfig,
    error::Error,
    feed::{Collaborators, Feed, FeedCommand, FeedEvent},
    source::{FileSource, Snapshot},
};

use crate::simulate::{swipe, Screen, SimulatedMedia, SimulatedViewport, SystemLinks};

const CONFIG_ENV_VAR: &str = "LOOPFEED_CONFIG";
const VIDEO_LENGTH_ENV_VAR: &str = "LOOPFEED_VIDEO_SECS";
const DEFAULT_VIDEO_LENGTH: Duration = Duration::from_secs(8);

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(products) = args.get(1) else {
        eprintln!("usage: loopfeed-cli <products.json> [config.json]");
        process::exit(2);
    };
    let config_path = args
        .get(2)
        .map(PathBuf::from)
        .or_else(|| env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

    if let Err(err) = start(FileSource::new(products), config_path) {
        log::error!("{}", err);
        process::exit(1);
    }
}

fn start(source: FileSource, config_path: Option<PathBuf>) -> Result<(), Error> {
    let config = match config_path {
        Some(path) => FeedConfig::load(&path)?,
        None => FeedConfig::default(),
    };
    let video_length = video_length();
    let screen = Screen::new(config.item_extent);

    let feed = Feed::spawn("feed", Capacity::Unbounded, {
        let screen = screen.clone();
        move |this| {
            let collaborators = Collaborators {
                media: Box::new(SimulatedMedia::new(this.clone(), video_length)),
                viewport: Box::new(SimulatedViewport::new(this.clone(), screen)),
                links: Box::new(SystemLinks),
            };
            Feed::new(config, collaborators, this)
        }
    })?;
    let sender = feed.sender();

    let load = |snapshot: Snapshot| {
        if let Some(items) = snapshot.items() {
            screen.lock().len = items.len();
        }
        let _ = sender.send(FeedEvent::Command(FeedCommand::Load(snapshot)));
    };
    load(source.read()?);

    for line in io::stdin().lock().lines() {
        let command = match line.as_ref().map(|s| s.trim()) {
            Ok("n") => {
                swipe(&sender, &screen, 1);
                continue;
            }
            Ok("p") => {
                swipe(&sender, &screen, -1);
                continue;
            }
            Ok("d") => FeedCommand::DragBegin,
            Ok("e") => FeedCommand::MomentumEnd,
            Ok("l") => FeedCommand::LongPress {
                index: screen.lock().index(),
            },
            Ok("r") => {
                match source.read() {
                    Ok(snapshot) => load(snapshot),
                    Err(err) => {
                        log::error!("keeping previous products, {:?}: {}", source.path(), err)
                    }
                }
                continue;
            }
            Ok("q") | Err(_) => break,
            _ => {
                log::warn!("unknown command, use n/p/d/e/l/r/q");
                continue;
            }
        };
        let _ = sender.send(FeedEvent::Command(command));
    }

    let _ = sender.send(FeedEvent::Command(FeedCommand::Shutdown));
    drop(sender);
    feed.join();
    Ok(())
}

fn video_length() -> Duration {
    env::var(VIDEO_LENGTH_ENV_VAR)
        .ok()
        .and_then(|secs| secs.parse().ok())
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_VIDEO_LENGTH)
}
