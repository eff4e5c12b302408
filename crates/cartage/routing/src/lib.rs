//! Topic subscription routing.
//!
//! Resolves a unit of work's topic to the set of subscriber ingress
//! endpoints the transport fans the packet out to, and records each
//! resolved downstream function as an interest party in the episode
//! finalisation registry along the way.

pub mod router;
pub mod subscriptions;

pub use router::TopicRouter;
pub use subscriptions::SubscriptionIndex;
