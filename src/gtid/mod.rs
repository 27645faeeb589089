//! GTID set model
//!
//! A GTID set is kept as the ordered list of `<uuid>:<intervals>` tokens it
//! was parsed from, so that serializing it back produces the same text.
//! Set algebra (union, subtract) works on a normalized view and returns new
//! sets in first-seen UUID order.

mod errors;
mod set;

pub use errors::{GtidError, GtidErrorKind, GtidResult};
pub use set::{GtidEntry, GtidSet, Interval};
