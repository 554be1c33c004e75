//! CLI 命令的输出格式化

use anyhow::{Context, Result};
use serde::Serialize;

/// `--pretty` 时输出格式化 JSON，否则输出单行紧凑 JSON
pub fn format_output<T: Serialize>(data: &T, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    };
    text.context("Failed to encode output")
}
