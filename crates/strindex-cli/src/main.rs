use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use strindex_core::{load_options, write_json, DataSource, IndexOptions, MemoryBuffer, StringIndex};
use tracing::info;

mod script;

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "strindex", version, about = "Incremental printable-string index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 扫描文件中的可打印串并输出 JSON 数组
    Scan {
        /// 输入文件
        #[arg(long)]
        input: PathBuf,

        /// 输出文件（JSON 数组）
        #[arg(long, default_value = "./result.json")]
        output: PathBuf,

        /// 最大线程数（"auto"=CPU 核心数）
        #[arg(long, default_value = "auto")]
        threads: String,

        /// 最短字符串长度（覆盖配置文件）
        #[arg(long)]
        min_length: Option<usize>,

        /// 配置文件路径（TOML）
        #[arg(long)]
        config: Option<PathBuf>,

        /// 扫描开始后依次执行的编辑脚本（TOML）
        #[arg(long)]
        edits: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { input, output, threads, min_length, config, edits } => {
            info!(?input, ?output, "starting scan");

            let mut opts = match &config {
                Some(path) => load_options(path).context("load config")?,
                None => IndexOptions::default(),
            };
            if let Some(t) = parse_threads(&threads) {
                opts.threads = Some(t);
            }
            if let Some(n) = min_length {
                anyhow::ensure!(n >= 1, "--min-length must be at least 1");
                opts.min_string_length = n;
            }

            let data = std::fs::read(&input).with_context(|| format!("read input {}", input.display()))?;
            let buffer = Arc::new(MemoryBuffer::from(data));
            let index = StringIndex::attach(&buffer, opts);

            if let Some(path) = edits {
                let steps = script::load(&path).context("load edit script")?;
                info!(steps = steps.len(), "replaying edits");
                for step in &steps {
                    step.apply(&buffer).with_context(|| format!("apply edit {step:?}"))?;
                }
            }

            index.wait_idle();
            let stats = index.stats();

            // 以缓冲方式打开输出文件，按 JSON 数组流式写入
            let mut out = BufWriter::new(File::create(&output).context("create output file")?);
            let written = write_json(&index, &mut out).context("write results")?;
            out.flush().ok();

            info!(
                bytes = buffer.buffer_length(),
                strings = stats.strings,
                min_length = index.options().min_string_length,
                outputs_written = written,
                "scan finished"
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 支持通过环境变量 RUST_LOG 控制日志等级，如：RUST_LOG=debug
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 解析线程参数："auto" 或非法值返回 None
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_argument() {
        assert_eq!(parse_threads("auto"), None);
        assert_eq!(parse_threads("AUTO"), None);
        assert_eq!(parse_threads("3"), Some(3));
        assert_eq!(parse_threads("0"), None);
        assert_eq!(parse_threads("many"), None);
    }

    #[test]
    fn cli_parses_scan() {
        let cli = Cli::try_parse_from(["strindex", "scan", "--input", "a.bin", "--min-length", "6"]).unwrap();
        match cli.command {
            Commands::Scan { input, min_length, threads, .. } => {
                assert_eq!(input, PathBuf::from("a.bin"));
                assert_eq!(min_length, Some(6));
                assert_eq!(threads, "auto");
            }
        }
    }
}
