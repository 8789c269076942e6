//! # Audio Module
//!
//! Playback core for one Discord guild at a time.
//!
//! ## Architecture
//!
//! ### [`queue`] - Queue Management
//! - Ordered tracks with a cursor on the current one
//! - Repeat modes and shuffle of the pending tail
//!
//! ### [`player`] - Playback Controller
//! - Connection lifecycle and playback state machine
//! - Reacts to node events to decide what plays next
//! - Volume, equalizer and seek directives
//!
//! ### [`selector`] - Track Selection
//! - Lets the requester pick one of up to five search results
//!
//! ### [`registry`] - Session Registry
//! - One controller per guild behind its own mutex
//! - Drains the node event channel
//!
//! [`equalizer`] and [`timestamp`] hold the value parsing used by the controller.

pub mod equalizer;
pub mod player;
pub mod queue;
pub mod registry;
pub mod selector;
pub mod timestamp;

pub use self::{
    player::{PlaybackController, PlayerState},
    queue::{Queue, RepeatMode},
    registry::SessionRegistry,
    selector::{Requester, TrackSelector},
};
