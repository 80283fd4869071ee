#![forbid(unsafe_code)]

pub mod initialize;
pub mod model;
pub mod rollup;
pub mod time;

pub use time::Clock;
