//! Host-facing plumbing
//!
//! - Planar audio buffers for the offline effect path
//! - Lock-free coefficient hand-off from a control thread

pub mod buffer;
pub mod handoff;

pub use buffer::{AudioBuffer, ChannelLayout};
pub use handoff::{Delivery, ReverbController};
