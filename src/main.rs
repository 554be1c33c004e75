//! Messenger Signal CLI
//!
//! 回放录制的页面信号、基于 stdin 实时运行引擎，或查看标题与配置的解读方式

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use messenger_signal::cli::{
    handle_classify, handle_config, handle_replay, handle_serve, ClassifyArgs, ConfigArgs,
    ReplayArgs, ServeArgs,
};

#[derive(Parser)]
#[command(name = "msig")]
#[command(about = "Messenger Signal - 从页面信号推导角标、来电与通知决策")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 在模拟时间上回放 JSONL 事件日志
    Replay(ReplayArgs),
    /// 实时运行引擎，从 stdin 读取事件
    Serve(ServeArgs),
    /// 查看页面标题的分类结果
    Classify(ClassifyArgs),
    /// 打印生效的配置
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // 决策输出到 stdout，日志输出到 stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("messenger_signal=info,msig=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay(args) => handle_replay(args),
        Commands::Serve(args) => handle_serve(args).await,
        Commands::Classify(args) => handle_classify(args),
        Commands::Config(args) => handle_config(args),
    }
}
