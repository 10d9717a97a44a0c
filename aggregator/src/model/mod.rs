//! Document models
pub mod advisory;
pub mod metadata;
pub mod rolie;
