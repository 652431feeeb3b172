//! Data model for extracted recipes
//!
//! - `Recipe`: the normalized record produced by the extractor
//! - `RecipeDuration`: an ISO-8601 duration kept alongside its parsed value

mod duration;
mod recipe;

pub use duration::{parse_iso8601_duration, DurationParseError, RecipeDuration};
pub use recipe::Recipe;
