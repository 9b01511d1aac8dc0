pub mod api;
pub mod clock;
pub mod db;
pub mod logging;
pub mod model;
pub mod schedule;
pub mod slug;

pub use clock::LocalClock;
