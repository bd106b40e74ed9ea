//! Rendering helpers: date separators, time labels and timestamp reveal.

mod formatter;
mod reveal;

pub use formatter::Formatter;
pub use reveal::TimestampReveal;
