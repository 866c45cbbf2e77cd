//! App - wiring a queue from configuration and injected ports.

pub mod builder;

pub use self::builder::QueueBuilder;
