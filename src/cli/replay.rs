//! Replay 命令 - 将录制的 JSONL 事件日志回放给引擎
//!
//! 时间是模拟的：每个事件执行前时钟先跳到它的 `atMs`，
//! 因此定时器行为可以复现。

use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::event::InboundEvent;
use crate::config::SignalConfig;
use crate::engine::SignalEngine;
use crate::notification::{DecisionDispatcher, DeliverySink, JsonLinesSink};
use crate::timer::ManualClock;

#[derive(Args)]
pub struct ReplayArgs {
    /// 事件日志，每行一个 JSON 对象（`-` 或省略时读 stdin）
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// 配置文件（默认按查找顺序）
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// 启动时开启发送者过滤
    #[arg(long)]
    pub filter: bool,
}

/// 回放结束后的统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub skipped: usize,
    pub decisions: usize,
}

pub fn handle_replay(args: ReplayArgs) -> Result<()> {
    let mut config = SignalConfig::load(args.config.as_deref())?;
    if args.filter {
        config = config.with_sender_filter(true);
    }

    let reader = open_input(args.input.as_deref())?;
    let sink = Arc::new(JsonLinesSink::stdout(config.conversation_url_base.clone()));
    let summary = replay(reader, config, sink)?;

    info!(
        events = summary.events,
        skipped = summary.skipped,
        decisions = summary.decisions,
        "Replay finished"
    );
    Ok(())
}

/// 用新引擎处理 `reader` 中的事件，决策发送到 `sink`
pub fn replay<R: BufRead>(
    reader: R,
    config: SignalConfig,
    sink: Arc<dyn DeliverySink>,
) -> Result<ReplaySummary> {
    let clock = ManualClock::new();
    let dispatcher = DecisionDispatcher::new().with_sink(sink);
    let mut engine = SignalEngine::new(config, clock.clone(), dispatcher);
    let mut summary = ReplaySummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read event log")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let event = match InboundEvent::parse(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping unreadable event");
                summary.skipped += 1;
                continue;
            }
        };

        if let Some(at) = event.at() {
            clock.set_elapsed(at);
        }
        summary.events += 1;
        summary.decisions += event.kind.apply(&mut engine).len();
    }

    Ok(summary)
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        None => Ok(Box::new(BufReader::new(io::stdin()))),
        Some(p) if p == Path::new("-") => Ok(Box::new(BufReader::new(io::stdin()))),
        Some(p) => {
            let file = File::open(p)
                .with_context(|| format!("Failed to open event log: {}", p.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}
