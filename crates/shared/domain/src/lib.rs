//! # Domain Models
//!
//! Plain data shared by every bridge crate: the bootstrap configuration, the
//! appservice registration artifact and the room types exchanged with bridge logic.
//! Keep it lean: no I/O, networking, or heavy logic.

pub mod config;
pub mod registration;
pub mod room;
