//! 多流 dumbbell 实验
//!
//! N 个源（默认 3）错开启动、共享瓶颈；除拥塞窗口与队列长度外还记录瓶颈丢包
//! （序号 + 目的端口）。

use std::process::ExitCode;

use aqmsim_rs::scenario::{MultiFlowArgs, ScenarioArgs, ScenarioParams, run_scenario};
use clap::Parser;
use tracing::error;

#[derive(Debug, Parser)]
#[command(
    name = "multi-flow",
    about = "Dumbbell 多流实验：错开启动的批量流共享一个瓶颈，比较排队策略"
)]
struct Args {
    #[command(flatten)]
    scenario: ScenarioArgs,

    #[command(flatten)]
    multi: MultiFlowArgs,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.scenario.logging { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let params = args
        .multi
        .apply(args.scenario.apply(ScenarioParams::multi_flow()));
    let cfg = match params.validate() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "配置错误");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run_scenario(&cfg) {
        Ok(report) => {
            println!(
                "done @ {}s\n  qdisc: {} drops={} tx_pkts={}",
                report.stop_time_s,
                report.bottleneck.qdisc,
                report.bottleneck.drops,
                report.bottleneck.tx_pkts,
            );
            for f in &report.flows {
                println!(
                    "  flow {} (port {}): start={}s stop={}s acked_bytes={} sink_rx_bytes={} retransmits={} timeouts={}",
                    f.index,
                    f.sink_port,
                    f.start_s,
                    f.stop_s,
                    f.bytes_acked,
                    f.sink_rx_bytes,
                    f.retransmits,
                    f.timeouts,
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(%e, "运行失败");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
