//! Command handlers grouped by concern.

pub(crate) mod cooldown;
pub(crate) mod export;
pub(crate) mod favorites;
pub(crate) mod history;
pub(crate) mod report;
