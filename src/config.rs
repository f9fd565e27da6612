//! 命令行字符串解析：数据率（`5Mbps`）与时间（`25ms`）。

use crate::error::ConfigError;
use crate::sim::SimTime;

/// 拆分 "数值 + 单位"，数值允许小数。
fn split_number(s: &str) -> Option<(f64, &str)> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|&(_, c)| !(c.is_ascii_digit() || c == '.'))
        .map_or(s.len(), |(i, _)| i);
    let (num, unit) = s.split_at(end);
    let value: f64 = num.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value, unit.trim()))
}

/// 解析数据率，返回 bit/s。
///
/// 支持 `bps`、`b/s`、`kbps`（或 `Kbps`）、`Mbps`、`Gbps`，以及字节单位 `Bps`、`KBps`、`MBps`、`GBps`。
pub fn parse_data_rate(s: &str) -> Result<u64, ConfigError> {
    let err = || ConfigError::InvalidDataRate(s.to_string());
    let (value, unit) = split_number(s).ok_or_else(err)?;
    let mult: f64 = match unit {
        "bps" | "b/s" => 1.0,
        "kbps" | "Kbps" | "kb/s" | "Kb/s" => 1e3,
        "Mbps" | "Mb/s" => 1e6,
        "Gbps" | "Gb/s" => 1e9,
        "Bps" | "B/s" => 8.0,
        "KBps" | "kBps" | "KB/s" | "kB/s" => 8e3,
        "MBps" | "MB/s" => 8e6,
        "GBps" | "GB/s" => 8e9,
        _ => return Err(err()),
    };
    let bps = (value * mult).round();
    if bps >= u64::MAX as f64 {
        return Err(err());
    }
    Ok(bps as u64)
}

/// 解析时间，支持 `s`、`ms`、`us`、`ns`；不带单位时按秒处理。
pub fn parse_time(s: &str) -> Result<SimTime, ConfigError> {
    let err = || ConfigError::InvalidTime(s.to_string());
    let (value, unit) = split_number(s).ok_or_else(err)?;
    let nanos_per_unit: f64 = match unit {
        "" | "s" => 1e9,
        "ms" => 1e6,
        "us" => 1e3,
        "ns" => 1.0,
        _ => return Err(err()),
    };
    let ns = (value * nanos_per_unit).round();
    if ns >= u64::MAX as f64 {
        return Err(err());
    }
    Ok(SimTime(ns as u64))
}
