//! Wire encoding for the socket messaging protocol.

pub mod text;

pub use text::*;
