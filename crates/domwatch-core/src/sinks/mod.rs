// # Built-in Notification Sinks

pub mod log;

pub use log::{LogSink, LogSinkFactory};
