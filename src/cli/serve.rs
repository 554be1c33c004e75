//! Serve 命令 - 按真实时间实时运行引擎
//!
//! 从 stdin 读取事件直到 EOF 或 Ctrl-C。定时器自行触发，
//! 来电安静下来后无需更多输入也会结束。

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::actor::{spawn_engine, EngineHandle};
use crate::cli::event::InboundEvent;
use crate::config::SignalConfig;
use crate::engine::SignalEngine;
use crate::notification::{DecisionDispatcher, JsonLinesSink};

#[derive(Args)]
pub struct ServeArgs {
    /// 配置文件（默认按查找顺序）
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// 启动时开启发送者过滤
    #[arg(long)]
    pub filter: bool,

    /// 只记录决策日志，不输出
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let mut config = SignalConfig::load(args.config.as_deref())?;
    if args.filter {
        config = config.with_sender_filter(true);
    }

    let sink = Arc::new(JsonLinesSink::stdout(config.conversation_url_base.clone()));
    let dispatcher = DecisionDispatcher::new()
        .with_dry_run(args.dry_run)
        .with_sink(sink);
    let (handle, task) = spawn_engine(SignalEngine::with_system_clock(config, dispatcher));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("Input closed");
                    break;
                };
                forward(&handle, &line)?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    let snapshot = handle.snapshot().await?;
    info!(
        unread = snapshot.badge.last_unread_count,
        active_call = snapshot.has_active_call,
        "Shutting down"
    );
    handle.shutdown()?;
    task.await.context("Signal engine task panicked")?;
    Ok(())
}

fn forward(handle: &EngineHandle, line: &str) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    match InboundEvent::parse(line) {
        Ok(event) => {
            if let Some(input) = event.kind.into_input() {
                handle.send(input)?;
            }
        }
        Err(e) => warn!(error = %e, "Skipping unreadable event"),
    }
    Ok(())
}
