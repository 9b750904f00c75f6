//! Stream consumers for the two phases of a turn.
//!
//! Both consumers race every pending read against the turn token's
//! cancellation, so an interrupt wakes a suspended read immediately, and both
//! re-check token currency after every read before applying its result. A
//! consumer never applies a chunk for a token that is no longer current.

pub mod audio;
pub mod text;

pub use audio::consume as consume_audio;
pub use text::consume as consume_text;
