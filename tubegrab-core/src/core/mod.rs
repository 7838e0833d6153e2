pub mod events;
pub mod format;
pub mod progress;
