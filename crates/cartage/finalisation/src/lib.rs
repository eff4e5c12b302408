//! Episode finalisation registry.
//!
//! Tracks, per upstream episode, which downstream processor functions are
//! expected to pick up its output and whether each has registered a
//! successor episode of its own. An episode whose every interested consumer
//! has taken over is finalised and safe to archive.

pub mod registry;

pub use registry::{
    DownstreamRegistration, DownstreamRegistrationStatus, EpisodeFinalisationRegistry,
};
