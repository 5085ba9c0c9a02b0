//! Core types module

mod config;
mod library;
mod now_playing;

pub use config::{RemoteConfig, RemoteConfigBuilder};
pub use library::LibraryDatabase;
pub use now_playing::{NowPlaying, NowPlayingIds, PlayState, RepeatMode};
