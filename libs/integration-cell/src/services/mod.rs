pub mod calendar;
pub mod notifier;
