//! 场景参数与校验

use std::path::PathBuf;

use tracing::warn;

use crate::config::{parse_data_rate, parse_time};
use crate::error::ConfigError;
use crate::proto::tcp::{TcpConfig, TcpVariant};
use crate::queue::{QueueDiscConfig, QueueDiscKind, RedParams, RedWeight};
use crate::sim::SimTime;
use crate::topo::dumbbell::DumbbellOpts;
use crate::trace::TraceFiles;

/// sink 端口从 50000 开始，第 i 条流使用 50000 + i
pub const SINK_BASE_PORT: u16 = 50000;
/// 源端临时端口起点
pub const SOURCE_BASE_PORT: u16 = 49153;

/// 命令行给出的原始参数（速率/时间仍是字符串）
#[derive(Debug, Clone)]
pub struct ScenarioParams {
    pub name: &'static str,
    pub bottleneck_bandwidth: String,
    pub bottleneck_delay: String,
    pub access_bandwidth: String,
    pub access_delay: String,
    pub queue_disc_type: String,
    pub queue_disc_size: u32,
    pub queue_size: u32,
    pub pkt_size: u32,
    pub start_time: f64,
    pub sim_duration: f64,
    pub red_min_th: f64,
    pub red_max_th: f64,
    /// RED 平均队长权重，见 `RedWeight::from_code`
    pub red_q_w: f64,
    pub is_pcap_enabled: bool,
    pub pcap_file_name: String,
    pub cwnd_tr_file_name: String,
    pub buf_tr_file_name: String,
    pub drop_tr_file_name: String,
    pub tcp_type_id: String,
    pub seed: u64,
    pub flows: usize,
    /// 第 i 条流在 `i * flow_stagger` 秒启动
    pub flow_stagger: f64,
    /// 发送端比全局停止时刻提前停止的秒数
    pub drain_time: f64,
    pub cwnd_flow: usize,
    pub drop_with_port: bool,
    pub summary_json: Option<PathBuf>,
}

impl ScenarioParams {
    /// 单流实验默认值
    pub fn single_flow() -> Self {
        Self {
            name: "single_flow",
            bottleneck_bandwidth: "2Mbps".to_string(),
            bottleneck_delay: "25ms".to_string(),
            access_bandwidth: "6Mbps".to_string(),
            access_delay: "25ms".to_string(),
            queue_disc_type: "CoDel".to_string(),
            queue_disc_size: 125,
            queue_size: 10,
            pkt_size: 1458,
            start_time: 0.1,
            sim_duration: 60.0,
            red_min_th: 5.0,
            red_max_th: 15.0,
            red_q_w: 0.002,
            is_pcap_enabled: true,
            pcap_file_name: "CD-bw2Mb-b125p".to_string(),
            cwnd_tr_file_name: "CD-bw2Mb-b125p-cwn.tr".to_string(),
            buf_tr_file_name: "CD-bw2Mb-b125p-buf.tr".to_string(),
            drop_tr_file_name: String::new(),
            tcp_type_id: "ns3::TcpNewReno".to_string(),
            seed: 1,
            flows: 1,
            flow_stagger: 0.0,
            drain_time: 3.0,
            cwnd_flow: 0,
            drop_with_port: false,
            summary_json: None,
        }
    }

    /// 多流实验默认值
    pub fn multi_flow() -> Self {
        Self {
            name: "multi_flow",
            bottleneck_bandwidth: "9Mbps".to_string(),
            bottleneck_delay: "20ms".to_string(),
            access_bandwidth: "15Mbps".to_string(),
            access_delay: "20ms".to_string(),
            // 多流实验默认使用 FQ-CoDel（不启用 ECN）
            queue_disc_type: "FqCoDel".to_string(),
            queue_disc_size: 4500,
            pkt_size: 1440,
            sim_duration: 180.0,
            pcap_file_name: "CD-multiflow".to_string(),
            cwnd_tr_file_name: "CD-multiflow-cwn.tr".to_string(),
            buf_tr_file_name: "CD-multiflow-buf.tr".to_string(),
            drop_tr_file_name: "CD-multiflow-drp.tr".to_string(),
            tcp_type_id: "ns3::TcpLinuxReno".to_string(),
            flows: 3,
            flow_stagger: 60.0,
            drop_with_port: true,
            ..Self::single_flow()
        }
    }

    /// 校验并转换为类型化配置；任何错误都发生在仿真开始之前。
    pub fn validate(&self) -> Result<ScenarioConfig, ConfigError> {
        let kind: QueueDiscKind = self.queue_disc_type.parse()?;
        let variant: TcpVariant = self.tcp_type_id.parse()?;

        let bottleneck_bps = parse_data_rate(&self.bottleneck_bandwidth)?;
        let bottleneck_delay = parse_time(&self.bottleneck_delay)?;
        let access_bps = parse_data_rate(&self.access_bandwidth)?;
        let access_delay = parse_time(&self.access_delay)?;

        if self.pkt_size == 0 {
            return Err(ConfigError::Zero {
                what: "packet size",
            });
        }
        if self.queue_size == 0 {
            return Err(ConfigError::Zero {
                what: "device queue size",
            });
        }
        if self.flows == 0 {
            return Err(ConfigError::Zero {
                what: "number of flows",
            });
        }
        if self.cwnd_flow >= self.flows {
            return Err(ConfigError::FlowIndexOutOfRange {
                index: self.cwnd_flow,
                flows: self.flows,
            });
        }
        let sink_ports_end = SINK_BASE_PORT as usize + self.flows;
        if sink_ports_end > u16::MAX as usize + 1 {
            return Err(ConfigError::Invalid(format!(
                "{} flows do not fit in the port range starting at {SINK_BASE_PORT}",
                self.flows
            )));
        }
        for (what, v) in [
            ("start time", self.start_time),
            ("flow stagger", self.flow_stagger),
            ("drain time", self.drain_time),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{what} must be a non-negative number of seconds (got {v})"
                )));
            }
        }
        if !self.sim_duration.is_finite() || self.sim_duration <= 0.0 {
            return Err(ConfigError::Zero {
                what: "simulation duration",
            });
        }

        let red = RedParams {
            min_th: self.red_min_th,
            max_th: self.red_max_th,
            weight: RedWeight::from_code(self.red_q_w),
            mean_pkt_size: self.pkt_size,
            link_bandwidth_bps: bottleneck_bps,
            link_delay: bottleneck_delay,
            seed: self.seed,
            ..RedParams::default()
        };
        let qdisc = QueueDiscConfig::new(kind, self.queue_disc_size, red, self.seed)?;

        let stop_time = SimTime::from_secs_f64(self.start_time + self.sim_duration);
        let app_stop = stop_time.saturating_sub(SimTime::from_secs_f64(self.drain_time));
        if app_stop == SimTime::ZERO {
            warn!(%stop_time, drain_time = self.drain_time, "发送端停止时刻为 0，不会产生流量");
        }
        let flows = (0..self.flows)
            .map(|i| FlowSpec {
                index: i,
                sink_port: SINK_BASE_PORT + i as u16,
                source_port: SOURCE_BASE_PORT.wrapping_add(i as u16),
                start: SimTime::from_secs_f64(i as f64 * self.flow_stagger),
                stop: app_stop,
            })
            .collect();

        let tcp = TcpConfig {
            segment_size: self.pkt_size,
            variant,
            ..TcpConfig::default()
        };

        let traces = TraceFiles {
            cwnd: self.cwnd_tr_file_name.clone(),
            buf: self.buf_tr_file_name.clone(),
            drop: self.drop_tr_file_name.clone(),
            pcap_prefix: self.is_pcap_enabled.then(|| self.pcap_file_name.clone()),
        };

        Ok(ScenarioConfig {
            name: self.name,
            topology: DumbbellOpts {
                flows: self.flows,
                access_bps,
                access_delay,
                bottleneck_bps,
                bottleneck_delay,
                device_queue_pkts: self.queue_size as usize,
                bottleneck: qdisc,
            },
            tcp,
            pkt_size: self.pkt_size,
            flows,
            stop_time,
            cwnd_flow: self.cwnd_flow,
            drop_with_port: self.drop_with_port,
            traces,
            summary_json: self.summary_json.clone(),
        })
    }
}

/// 一条批量传输流
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSpec {
    pub index: usize,
    pub sink_port: u16,
    pub source_port: u16,
    pub start: SimTime,
    pub stop: SimTime,
}

/// 校验后的场景配置
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub name: &'static str,
    pub topology: DumbbellOpts,
    pub tcp: TcpConfig,
    pub pkt_size: u32,
    pub flows: Vec<FlowSpec>,
    /// 全局停止时刻（sink 同时停止）
    pub stop_time: SimTime,
    pub cwnd_flow: usize,
    pub drop_with_port: bool,
    pub traces: TraceFiles,
    pub summary_json: Option<PathBuf>,
}
