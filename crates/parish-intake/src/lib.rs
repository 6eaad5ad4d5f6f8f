//! The public intake gate: everything between an anonymous form POST and a
//! PENDING submission record.
//!
//! Checks run in a fixed order and short-circuit on the first failure. The
//! gate never touches storage; callers look up the link, hand it in, and
//! persist whatever [`gate::build_submission`] returns.

pub mod captcha;
pub mod client_ip;
pub mod error;
pub mod gate;
pub mod rate_limit;
pub mod sanitize;

pub use error::{Rejection, Result};
