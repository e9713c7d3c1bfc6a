//! The three pipeline roles: writer, reviewer, arbitrator.
//!
//! All of them talk to the language model through the `TextGenerator` seam
//! and expect strict JSON back (prose only for arbitration guidance).

pub mod arbitrator;
pub mod json;
pub mod reviewer;
pub mod writer;

pub use arbitrator::Arbitrator;
pub use reviewer::{Reviewer, ReviewerProfile};
pub use writer::Writer;
