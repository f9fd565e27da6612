//! 两个实验程序共用的命令行参数
//!
//! 未给出的参数保持场景默认值（见 `ScenarioParams::single_flow` / `multi_flow`）。

use std::path::PathBuf;

use clap::Args;

use super::params::ScenarioParams;

#[derive(Debug, Clone, Default, Args)]
pub struct ScenarioArgs {
    /// 瓶颈链路带宽，如 `2Mbps`
    #[arg(long)]
    pub bottleneck_bandwidth: Option<String>,

    /// 瓶颈链路单向时延，如 `25ms`
    #[arg(long)]
    pub bottleneck_delay: Option<String>,

    /// 访问链路带宽
    #[arg(long)]
    pub access_bandwidth: Option<String>,

    #[arg(long)]
    pub access_delay: Option<String>,

    /// 瓶颈排队策略：PfifoFast（DropTail）、CoDel、RED 或 FqCoDel
    #[arg(long)]
    pub queue_disc_type: Option<String>,

    /// 瓶颈排队策略容量（包）
    #[arg(long)]
    pub queue_disc_size: Option<u32>,

    /// 设备发送队列容量（包）
    #[arg(long)]
    pub queue_size: Option<u32>,

    /// 应用每次写入的字节数，同时作为 TCP MSS
    #[arg(long)]
    pub pkt_size: Option<u32>,

    /// 起始时间（秒）；停止时刻 = start_time + sim_duration
    #[arg(long)]
    pub start_time: Option<f64>,

    /// 仿真时长（秒）
    #[arg(long)]
    pub sim_duration: Option<f64>,

    /// RED 最小阈值（包）
    #[arg(long)]
    pub red_min_th: Option<f64>,

    /// RED 最大阈值（包）
    #[arg(long)]
    pub red_max_th: Option<f64>,

    /// RED 平均队长权重：正数为固定值，-1 自动，-2 按 RTT，-3 快速
    #[arg(long, allow_negative_numbers = true)]
    pub red_q_w: Option<f64>,

    /// 是否在源主机访问设备上抓包
    #[arg(long)]
    pub is_pcap_enabled: Option<bool>,

    #[arg(long)]
    pub pcap_file_name: Option<String>,

    /// 拥塞窗口 trace 文件；空字符串表示不输出
    #[arg(long)]
    pub cwnd_tr_file_name: Option<String>,

    /// 瓶颈队列长度 trace 文件；空字符串表示不输出
    #[arg(long)]
    pub buf_tr_file_name: Option<String>,

    /// 瓶颈丢包 trace 文件；空字符串表示不输出
    #[arg(long)]
    pub drop_tr_file_name: Option<String>,

    /// 打开 debug 级别日志
    #[arg(long, default_value_t = false)]
    pub logging: bool,

    /// TCP 变体，如 `ns3::TcpNewReno`、`TcpLinuxReno`
    #[arg(long)]
    pub tcp_type_id: Option<String>,

    /// RED 随机数种子（同时用作 FQ-CoDel 哈希扰动）
    #[arg(long)]
    pub seed: Option<u64>,

    /// 运行摘要 JSON 输出路径
    #[arg(long)]
    pub summary_json: Option<PathBuf>,
}

impl ScenarioArgs {
    /// 用命令行给出的值覆盖场景默认值。
    pub fn apply(&self, mut p: ScenarioParams) -> ScenarioParams {
        fn set<T: Clone>(dst: &mut T, src: &Option<T>) {
            if let Some(v) = src {
                *dst = v.clone();
            }
        }
        set(&mut p.bottleneck_bandwidth, &self.bottleneck_bandwidth);
        set(&mut p.bottleneck_delay, &self.bottleneck_delay);
        set(&mut p.access_bandwidth, &self.access_bandwidth);
        set(&mut p.access_delay, &self.access_delay);
        set(&mut p.queue_disc_type, &self.queue_disc_type);
        set(&mut p.queue_disc_size, &self.queue_disc_size);
        set(&mut p.queue_size, &self.queue_size);
        set(&mut p.pkt_size, &self.pkt_size);
        set(&mut p.start_time, &self.start_time);
        set(&mut p.sim_duration, &self.sim_duration);
        set(&mut p.red_min_th, &self.red_min_th);
        set(&mut p.red_max_th, &self.red_max_th);
        set(&mut p.red_q_w, &self.red_q_w);
        set(&mut p.is_pcap_enabled, &self.is_pcap_enabled);
        set(&mut p.pcap_file_name, &self.pcap_file_name);
        set(&mut p.cwnd_tr_file_name, &self.cwnd_tr_file_name);
        set(&mut p.buf_tr_file_name, &self.buf_tr_file_name);
        set(&mut p.drop_tr_file_name, &self.drop_tr_file_name);
        set(&mut p.tcp_type_id, &self.tcp_type_id);
        set(&mut p.seed, &self.seed);
        if self.summary_json.is_some() {
            p.summary_json = self.summary_json.clone();
        }
        p
    }
}

/// 多流实验特有的参数
#[derive(Debug, Clone, Default, Args)]
pub struct MultiFlowArgs {
    /// 流数量（默认 3）
    #[arg(long)]
    pub flows: Option<usize>,

    /// 相邻两条流的启动间隔（秒，默认 60）
    #[arg(long)]
    pub flow_stagger: Option<f64>,

    /// 发送端在全局停止前多少秒停止（默认 3）
    #[arg(long)]
    pub drain_time: Option<f64>,

    /// 记录哪条流的拥塞窗口（从 0 开始，默认 0）
    #[arg(long)]
    pub cwnd_flow: Option<usize>,
}

impl MultiFlowArgs {
    pub fn apply(&self, mut p: ScenarioParams) -> ScenarioParams {
        if let Some(v) = self.flows {
            p.flows = v;
        }
        if let Some(v) = self.flow_stagger {
            p.flow_stagger = v;
        }
        if let Some(v) = self.drain_time {
            p.drain_time = v;
        }
        if let Some(v) = self.cwnd_flow {
            p.cwnd_flow = v;
        }
        p
    }
}
