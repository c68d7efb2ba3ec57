pub mod carousel;
pub mod config;
pub mod error;
pub mod events;
pub mod tasks {
    pub mod loader;
    pub mod viewer;
}
