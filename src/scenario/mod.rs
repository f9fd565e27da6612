//! 实验场景
//!
//! 命令行参数 -> 校验后的 `ScenarioConfig` -> 构建拓扑、安装应用与 trace -> 运行 -> 报告。

mod args;
mod params;
mod run;

pub use args::{MultiFlowArgs, ScenarioArgs};
pub use params::{FlowSpec, SINK_BASE_PORT, SOURCE_BASE_PORT, ScenarioConfig, ScenarioParams};
pub use run::{BottleneckReport, FlowReport, ScenarioReport, run_scenario};
