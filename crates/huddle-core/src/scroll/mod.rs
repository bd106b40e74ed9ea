//! Scroll anchoring for the conversation feed.
//!
//! # Module Structure
//!
//! - `controller`: State machine deciding pagination, anchor correction and
//!   auto-scroll (`ScrollAnchorController`)
//! - `state`: Bookkeeping owned by the controller (`ScrollState`, `ScrollPhase`)
//! - `viewport`: Geometry in, commands out (`Viewport`, `ScrollCommand`)

mod controller;
mod state;
mod viewport;

pub use controller::ScrollAnchorController;
pub use state::{ScrollPhase, ScrollState};
pub use viewport::{ScrollCommand, Viewport};
