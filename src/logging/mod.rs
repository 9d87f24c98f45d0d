pub mod event_logger;
pub mod events;
