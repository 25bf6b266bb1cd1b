pub mod cancel;
pub mod config;
pub mod download;
pub mod events;
pub mod extract;
pub mod http;
pub mod installer;
pub mod resolver;
pub mod version;
