pub mod alerts;
pub mod driver;
pub mod protocol;
pub mod state;

pub use driver::{Monitor, MonitorHandle, SubscriberId, Subscription};
