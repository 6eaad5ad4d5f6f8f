//! Route handlers, grouped by resource.

pub mod links;
pub mod parishioners;
pub mod public;
pub mod review;
