//! 多个模型输出的加权平均
//!
//! ```text
//! average --config average.json
//! ```

use clap::Parser;
use forecast::{load_json, log_level, EnsembleConfig, EnsembleWorkflow};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "average")]
#[command(about = "Weighted average of several prediction files", long_about = None)]
struct Cli {
    /// JSON 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 主键参考表
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// 不使用参考表，以第一个模型的主键为准
    #[arg(long, conflicts_with = "reference")]
    no_reference: bool,

    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[arg(short, long)]
    model_name: Option<String>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose))
        .init();

    let mut config: EnsembleConfig = match &cli.config {
        Some(path) => load_json(path)?,
        None => EnsembleConfig::default(),
    };
    if let Some(reference) = cli.reference {
        config.reference_path = Some(reference);
    }
    if cli.no_reference {
        config.reference_path = None;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(name) = cli.model_name {
        config.model_name = name;
    }

    let summary = EnsembleWorkflow::new(config)?.run()?;
    println!(
        "blended {} rows from {:?} into {}",
        summary.rows.len(),
        summary.members,
        summary.series_path.display()
    );
    Ok(())
}
