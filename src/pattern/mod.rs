//! Pattern compilation: mixed literal/placeholder templates parsed
//! into ordered segments with typed, named slots.

mod compiler;
mod segment;

pub use compiler::{Pattern, PatternError};
pub use segment::{Greediness, Placeholder, PlaceholderKind, Segment};
