#![forbid(unsafe_code)]

pub mod model;
pub mod time;
pub mod timer;

pub use time::Clock;
pub use timer::Timer;
