//! CLI 命令处理

pub mod event;
pub mod inspect;
pub mod output;
pub mod replay;
pub mod serve;

pub use event::*;
pub use inspect::*;
pub use output::*;
pub use replay::*;
pub use serve::*;
