//! Concrete implementations of the engine's collaborator traits: the UPI gateway adapter and the push-notification
//! relay.
mod gateway;
mod push;

pub use gateway::UpiGateway;
pub use push::{LogPushSender, NotificationRelay};
