//! 单流 dumbbell 实验
//!
//! 一个源经网关向 sink 批量发送，比较瓶颈链路上的排队策略；
//! 输出拥塞窗口与瓶颈队列长度 trace，可选 pcap。

use std::process::ExitCode;

use aqmsim_rs::scenario::{ScenarioArgs, ScenarioParams, run_scenario};
use clap::Parser;
use tracing::error;

#[derive(Debug, Parser)]
#[command(
    name = "single-flow",
    about = "Dumbbell 单流实验：source -> gateway -> sink，瓶颈挂载 PfifoFast/CoDel/RED/FqCoDel"
)]
struct Args {
    #[command(flatten)]
    scenario: ScenarioArgs,
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

    let params = args.scenario.apply(ScenarioParams::single_flow());
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
            let f = &report.flows[0];
            println!(
                "done @ {}s\n  qdisc: {} drops={} tx_pkts={}\n  tcp: {} acked_bytes={} sink_rx_bytes={} retransmits={} timeouts={}",
                report.stop_time_s,
                report.bottleneck.qdisc,
                report.bottleneck.drops,
                report.bottleneck.tx_pkts,
                report.tcp,
                f.bytes_acked,
                f.sink_rx_bytes,
                f.retransmits,
                f.timeouts,
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(%e, "运行失败");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
