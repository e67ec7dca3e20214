pub mod app;
pub mod clock;
pub mod config;
pub mod daily;
pub mod errors;
pub mod habits;
pub mod handlers;
pub mod migrate;
pub mod models;
pub mod state;
pub mod stats;
pub mod storage;
pub mod ticker;
pub mod timer;
pub mod tracker;
pub mod transfer;
pub mod ui;

pub use app::router;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use state::AppState;
pub use storage::{FileStorage, MemoryStorage, Repository};
pub use tracker::Tracker;
