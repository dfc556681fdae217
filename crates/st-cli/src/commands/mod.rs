//! Implementations of the screentime actions.

pub mod clear;
pub mod export;
pub mod report;
pub mod start;
pub mod status;
pub mod stop;
pub mod track;
pub mod util;
