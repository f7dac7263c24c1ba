pub mod event_bus;
pub mod persistence;

pub use event_bus::EventBus;
