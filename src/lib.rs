pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod media;
pub mod playback;
pub mod query;
pub mod session;
pub mod tasks {
    pub mod loader;
    pub mod viewer;
}
