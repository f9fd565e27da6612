//! 错误类型

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::net::TraceSource;

/// 配置解析/校验错误：在仿真时间推进之前就终止运行。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "invalid queue disc type `{0}`: use --queue-disc-type=PfifoFast, --queue-disc-type=CoDel, --queue-disc-type=RED or --queue-disc-type=FqCoDel"
    )]
    UnknownQueueDisc(String),

    #[error("unknown TCP variant `{0}`: use NewReno or LinuxReno")]
    UnknownTcpVariant(String),

    #[error("invalid data rate `{0}` (expected e.g. `5Mbps`, `100kbps`, `1Gbps`)")]
    InvalidDataRate(String),

    #[error("invalid time `{0}` (expected e.g. `25ms`, `1s`, `500us`)")]
    InvalidTime(String),

    #[error("RED thresholds must satisfy 0 <= min < max (got min={min_th}, max={max_th})")]
    InvalidRedThresholds { min_th: f64, max_th: f64 },

    #[error(
        "invalid RED queue weight {0}: use a value in (0, 1], -1 (auto), -2 (from RTT) or -3 (fast)"
    )]
    InvalidRedWeight(f64),

    #[error("{what} must be greater than zero")]
    Zero { what: &'static str },

    #[error("flow index {index} is out of range for {flows} flow(s)")]
    FlowIndexOutOfRange { index: usize, flows: usize },

    #[error("{0}")]
    Invalid(String),
}

/// trace 订阅与输出错误
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("trace source {0:?} does not exist in this topology")]
    UnknownSource(TraceSource),

    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 运行一个实验场景时可能出现的错误
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error("failed to write run summary {path}: {source}")]
    Summary {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize run summary: {0}")]
    Json(#[from] serde_json::Error),
}
