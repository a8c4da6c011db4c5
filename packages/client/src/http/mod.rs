//! Target normalization
//!
//! Converts URLs, strings and structured options into canonical authorities.

pub mod authority;
pub mod into_target;

pub use authority::{Authority, Scheme};
pub use into_target::{IntoTarget, RequestOptions};
