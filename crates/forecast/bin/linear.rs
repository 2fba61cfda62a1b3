//! 训练岭回归并导出预测
//!
//! ```text
//! linear --config linear.json --train data/train.txt --predict data/test_A.txt
//! ```

use clap::Parser;
use forecast::{load_json, log_level, LinearConfig, LinearForecaster};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "linear")]
#[command(about = "Ridge regression on calendar and holiday features", long_about = None)]
struct Cli {
    /// JSON 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 训练集
    #[arg(long)]
    train: Option<PathBuf>,

    /// 预测集
    #[arg(long)]
    predict: Option<PathBuf>,

    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[arg(short, long)]
    model_name: Option<String>,

    /// 第一条预测替换成训练集最后一天的销量
    #[arg(long)]
    patch_boundary: bool,

    #[arg(long)]
    skip_validation: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose))
        .init();

    let mut config: LinearConfig = match &cli.config {
        Some(path) => load_json(path)?,
        None => LinearConfig::default(),
    };
    if let Some(train) = cli.train {
        config.train_path = train;
    }
    if let Some(predict) = cli.predict {
        config.predict_path = predict;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(name) = cli.model_name {
        config.model_name = name;
    }
    if cli.patch_boundary {
        config.patch_boundary = true;
    }
    if cli.skip_validation {
        config.run_validation = false;
    }

    let forecaster = LinearForecaster::new(config)?;
    let mut oracle = forecaster.http_oracle()?;
    let summary = forecaster.run(&mut oracle).await?;

    if let Some(report) = &summary.validation {
        println!("validation (alpha {}): {}", report.alpha, report.metrics);
    }
    println!(
        "trained on {} rows with alpha {}, {} predictions written to {}",
        summary.train_rows,
        summary.alpha,
        summary.predictions.len(),
        summary.series_path.display()
    );
    Ok(())
}
