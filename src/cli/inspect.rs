//! Classify / Config 命令 - 查看引擎如何解读输入

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::classifier::{KeywordClassifier, SignalClassifier, TitleClass};
use crate::cli::output::format_output;
use crate::config::SignalConfig;

#[derive(Args)]
pub struct ClassifyArgs {
    /// 要分类的页面标题
    pub title: String,

    /// 配置文件（默认按查找顺序）
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// 格式化输出 JSON
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// 配置文件（默认按查找顺序）
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// 单个标题的分类结果
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyOutput {
    pub title: String,
    pub class: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_digits: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_keyword: Option<String>,
    pub blocked_sender: bool,
}

pub fn classify(title: &str, classifier: &dyn SignalClassifier) -> ClassifyOutput {
    let (class, unread_digits) = match classifier.classify_title(title) {
        TitleClass::Count(digits) => ("count", Some(digits)),
        TitleClass::Typing => ("typing", None),
        TitleClass::Call => ("call", None),
        TitleClass::Home => ("home", None),
        TitleClass::Other => ("other", None),
    };
    ClassifyOutput {
        title: title.to_string(),
        class,
        unread_digits,
        call_keyword: classifier.match_call(title),
        blocked_sender: classifier.is_blocked_sender(title),
    }
}

pub fn handle_classify(args: ClassifyArgs) -> Result<()> {
    let config = SignalConfig::load(args.config.as_deref())?;
    let classifier = KeywordClassifier::new(&config);
    let output = classify(&args.title, &classifier);
    println!("{}", format_output(&output, args.pretty)?);
    Ok(())
}

pub fn handle_config(args: ConfigArgs) -> Result<()> {
    let config = SignalConfig::load(args.config.as_deref())?;
    println!("{}", format_output(&config, true)?);
    Ok(())
}
