//! AMQP integration for the matchmaking service
//!
//! Match outcomes can be published to a topic exchange so that services
//! outside this process learn about new sessions without polling.

pub mod connection;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::{AmqpConfig, AmqpConnection};
pub use messages::*;
pub use publisher::{AmqpMatchNotifier, PublisherConfig};
