//! 具体的投递接收端

pub mod json_lines;
pub mod recording;

pub use json_lines::{DecisionRecord, JsonLinesSink};
pub use recording::RecordingSink;
