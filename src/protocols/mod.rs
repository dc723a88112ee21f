//! Protocol implementations.
//!
//! - `resp`: Redis RESP2 codec and frame reader

pub mod resp;
