pub mod category;
pub mod clock;
pub mod config;
pub mod error;
pub mod item;
pub mod snapshot;
pub mod user;
