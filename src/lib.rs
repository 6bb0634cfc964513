//! Attributes per-stream view counts from YouTube and Vimeo to the two
//! weekly service slots, merges both platforms per date, and upserts the
//! result into a date-keyed SQLite table.

pub mod attribute;
pub mod config;
pub mod db;
pub mod export;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod providers;
pub mod publish;
pub mod server;
