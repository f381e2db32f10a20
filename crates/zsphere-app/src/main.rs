//! ZSphere 命令行入口
//!
//! - `replay`  回放构造文件并打印节点表
//! - `convert` 在 `.json` 与 `.zsph` 之间转换
//! - `check`   回放后重新生成脚本，验证往返一致

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use zsphere_core::config::KernelConfig;
use zsphere_core::node::Node;
use zsphere_core::session::Session;
use zsphere_file::{native, ConstructionDocument};

/// ZSphere - 球面几何构造工具
#[derive(Parser, Debug)]
#[command(name = "zsphere")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    /// 覆盖文档中内核参数的 JSON 文件
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 回放构造文件并打印节点表
    Replay {
        file: PathBuf,

        /// 同时列出隐藏的节点
        #[arg(short, long)]
        all: bool,
    },

    /// 转换文件格式（按扩展名选择）
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// 新标题
        #[arg(short, long)]
        title: Option<String>,
    },

    /// 回放并验证脚本往返一致
    Check { file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => Some(load_config(path)?),
        None => None,
    };

    match cli.command {
        Commands::Replay { file, all } => replay(&file, config, all),
        Commands::Convert {
            input,
            output,
            title,
        } => convert(&input, &output, title),
        Commands::Check { file } => check(&file, config),
    }
}

fn load_config(path: &Path) -> Result<KernelConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

/// 加载文档并回放，`config` 覆盖文档自带的参数
fn open(path: &Path, config: Option<KernelConfig>) -> Result<(ConstructionDocument, Session)> {
    let mut document = zsphere_file::load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    if let Some(config) = config {
        document.config = config;
    }
    let session = document
        .to_session()
        .with_context(|| format!("failed to replay {}", path.display()))?;
    Ok((document, session))
}

fn replay(path: &Path, config: Option<KernelConfig>, all: bool) -> Result<()> {
    let (document, session) = open(path, config)?;
    info!(
        "Replayed '{}': {} entries, {} opcodes",
        document.metadata.title,
        document.script.len(),
        document.opcode_count()
    );

    println!(
        "{:<8} {:<22} {:<7} {:<7} {}",
        "NAME", "TYPE", "EXISTS", "SHOWN", "VALUE"
    );
    for node in session.graph().attached().filter(|n| all || n.showing) {
        println!(
            "{:<8} {:<22} {:<7} {:<7} {}",
            node.name,
            node.entity_kind().type_name(),
            node.exists,
            node.showing,
            describe(node, session.precision())
        );
    }
    Ok(())
}

fn describe(node: &Node, precision: usize) -> String {
    if let Some(v) = node.location() {
        format!(
            "({:.p$}, {:.p$}, {:.p$})",
            v.x,
            v.y,
            v.z,
            p = precision.min(6)
        )
    } else if let Some(value) = node.value() {
        format!("{:.p$}", value, p = precision.min(6))
    } else {
        String::new()
    }
}

fn convert(input: &Path, output: &Path, title: Option<String>) -> Result<()> {
    let mut document = zsphere_file::load(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    if let Some(title) = title {
        document.metadata.title = title;
    }
    zsphere_file::save(&document, output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    info!("Converted {} -> {}", input.display(), output.display());
    Ok(())
}

fn check(path: &Path, config: Option<KernelConfig>) -> Result<()> {
    let (document, session) = open(path, config)?;

    let script = session.script();
    if script != document.script {
        let first = script
            .iter()
            .zip(&document.script)
            .position(|(a, b)| a != b)
            .unwrap_or(script.len().min(document.script.len()));
        bail!(
            "script mismatch at entry {first}: file has {} entries, replay produced {}",
            document.script.len(),
            script.len()
        );
    }

    // 原生格式往返
    let bytes = native::to_bytes(&document)?;
    let reread = native::read_from(&mut bytes.as_slice())?;
    if reread.script != document.script {
        bail!("native encoding does not reproduce the script");
    }

    info!(
        "Check passed: {} entries, {} nodes",
        script.len(),
        session.graph().attached().count()
    );
    println!("ok");
    Ok(())
}
