pub mod catalog;
pub mod due;
pub mod history;
pub mod progress;
pub mod review;
pub mod stats;
pub mod users;
