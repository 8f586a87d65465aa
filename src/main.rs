//! Page Pilot 命令行
//!
//! 入口：初始化日志、加载配置、启动 Chrome，然后执行一条指令或回答一个问题。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use page_pilot::config::load_config;
use page_pilot::driver::{ChromeDriver, PageDriver};
use page_pilot::{observability, Agent};

#[derive(Parser, Debug)]
#[command(name = "page-pilot", about = "Drive a web page with natural-language instructions")]
struct Args {
    /// 配置文件路径（默认 config/default.toml）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 执行前先打开的页面
    #[arg(short, long)]
    url: Option<String>,

    /// 只根据截图回答问题，不执行动作
    #[arg(short, long)]
    query: bool,

    /// 自然语言指令（或 --query 时的问题）
    instruction: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init("info");
    let args = Args::parse();

    let cfg = load_config(args.config).context("Failed to load config")?;
    let driver = Arc::new(
        ChromeDriver::launch(&cfg.browser)
            .await
            .context("Failed to launch browser")?,
    );
    if let Some(url) = &args.url {
        driver.navigate(url).await.context("Failed to open url")?;
    }

    let agent = Agent::from_config(&cfg, driver);
    if args.query {
        let answer = agent.ai_query(&args.instruction).await?;
        println!("{answer}");
    } else {
        let outcome = agent.ai_action(&args.instruction).await?;
        println!(
            "done in {} attempt(s), {} action(s) performed ({:?})",
            outcome.attempts, outcome.performed, outcome.source
        );
    }
    Ok(())
}
