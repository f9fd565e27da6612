//! 运行一个场景并汇总结果

use std::fs;

use serde::Serialize;
use tracing::{info, instrument};

use super::params::ScenarioConfig;
use crate::app::{BulkSend, PacketSink};
use crate::error::ScenarioError;
use crate::net::NetWorld;
use crate::proto::tcp::TcpVariant;
use crate::queue::QueueDiscKind;
use crate::sim::{SimTime, Simulator};
use crate::topo::dumbbell::build_dumbbell;
use crate::trace::{MeasurementCollector, TraceTargets, TraceTotals};

#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub index: usize,
    pub source_node: usize,
    pub sink_port: u16,
    pub start_s: f64,
    pub stop_s: f64,
    pub bytes_acked: u64,
    pub sink_rx_bytes: u64,
    pub retransmits: u64,
    pub timeouts: u64,
    pub final_cwnd: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BottleneckReport {
    pub qdisc: QueueDiscKind,
    pub limit_pkts: u32,
    pub tx_pkts: u64,
    pub tx_bytes: u64,
    pub drops: u64,
    pub final_backlog_pkts: usize,
}

/// 一次运行的结果摘要（可选地写成 JSON）
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: &'static str,
    pub tcp: TcpVariant,
    pub stop_time_s: f64,
    pub events: u64,
    pub flows: Vec<FlowReport>,
    pub bottleneck: BottleneckReport,
    pub delivered_pkts: u64,
    pub dropped_pkts: u64,
    pub traces: TraceTotals,
}

/// 构建拓扑、安装应用与测量、运行到停止时刻，最后刷新所有输出。
#[instrument(skip(cfg), fields(scenario = cfg.name))]
pub fn run_scenario(cfg: &ScenarioConfig) -> Result<ScenarioReport, ScenarioError> {
    let mut sim = Simulator::default();
    let mut world = NetWorld::default();

    let topo = build_dumbbell(&mut world.net, &cfg.topology)?;

    let mut sinks = Vec::with_capacity(cfg.flows.len());
    for (flow, &src) in cfg.flows.iter().zip(&topo.sources) {
        let sink = PacketSink {
            node: topo.sink,
            port: flow.sink_port,
            start: SimTime::ZERO,
            stop: cfg.stop_time,
        };
        sink.install(&mut world.net, &mut sim);
        sinks.push(sink);

        BulkSend {
            conn_id: flow.index as u64,
            local: (src, flow.source_port),
            remote: (topo.sink, flow.sink_port),
            send_size: cfg.pkt_size,
            max_bytes: 0,
            start: flow.start,
            stop: flow.stop,
            tcp: cfg.tcp.clone(),
        }
        .install(&mut world.net, &mut sim);
    }

    let targets = TraceTargets {
        cwnd_conn: cfg.cwnd_flow as u64,
        queue_link: topo.bottleneck,
        drop_with_port: cfg.drop_with_port,
        pcap_devices: topo
            .sources
            .iter()
            .zip(&topo.access_links)
            .map(|(&node, &(up, _))| (node, up))
            .collect(),
    };
    let collector = MeasurementCollector::attach(&mut world.net, &targets, &cfg.traces)?;

    info!(
        flows = cfg.flows.len(),
        qdisc = %cfg.topology.bottleneck.kind(),
        tcp = %cfg.tcp.variant,
        stop_time = %cfg.stop_time,
        "🚦 开始实验"
    );
    let summary = sim.run_until(cfg.stop_time, &mut world);
    let traces = collector.finish()?;

    let net = &world.net;
    let flows = cfg
        .flows
        .iter()
        .zip(&topo.sources)
        .zip(&sinks)
        .map(|((flow, src), sink)| {
            let conn = net.tcp.get(flow.index as u64);
            FlowReport {
                index: flow.index,
                source_node: src.0,
                sink_port: flow.sink_port,
                start_s: flow.start.as_secs_f64(),
                stop_s: flow.stop.as_secs_f64(),
                bytes_acked: conn.map_or(0, |c| c.bytes_acked()),
                sink_rx_bytes: sink.rx_bytes(net),
                retransmits: conn.map_or(0, |c| c.retransmits()),
                timeouts: conn.map_or(0, |c| c.timeouts()),
                final_cwnd: conn.map_or(0, |c| c.cwnd()),
            }
        })
        .collect::<Vec<_>>();

    let bottleneck = net
        .link(topo.bottleneck)
        .map(|l| BottleneckReport {
            qdisc: l.qdisc().kind(),
            limit_pkts: l.qdisc().limit_pkts(),
            tx_pkts: l.tx_pkts(),
            tx_bytes: l.tx_bytes(),
            drops: l.drops(),
            final_backlog_pkts: l.qdisc().len(),
        })
        .expect("bottleneck link exists");

    for f in &flows {
        info!(
            flow = f.index,
            bytes_acked = f.bytes_acked,
            sink_rx_bytes = f.sink_rx_bytes,
            retransmits = f.retransmits,
            timeouts = f.timeouts,
            "📊 流统计"
        );
    }
    info!(
        tx_pkts = bottleneck.tx_pkts,
        drops = bottleneck.drops,
        "📊 瓶颈队列统计"
    );

    let report = ScenarioReport {
        scenario: cfg.name,
        tcp: cfg.tcp.variant,
        stop_time_s: cfg.stop_time.as_secs_f64(),
        events: summary.events,
        flows,
        bottleneck,
        delivered_pkts: net.stats.delivered_pkts,
        dropped_pkts: net.stats.dropped_pkts,
        traces,
    };

    if let Some(path) = &cfg.summary_json {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).map_err(|source| ScenarioError::Summary {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "写出运行摘要");
    }

    Ok(report)
}
