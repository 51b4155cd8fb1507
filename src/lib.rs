pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduler;
pub mod services;

pub use clock::{Clock, FixedClock, SystemClock};
pub use db::Database;
pub use error::CoreError;
pub use model::{Card, KnowledgeLevel, Progress, ReviewEvent, ReviewOutcome};
pub use services::review::ReviewProcessor;
pub use services::stats::{StatsScope, StatsSnapshot};
