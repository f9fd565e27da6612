//! Dumbbell 拓扑构建
//!
//! ```text
//!   src_1 ──┐
//!   src_2 ──┼── gateway ══ sink
//!   src_N ──┘
//! ```
//!
//! 访问链路（源 <-> 网关）使用 1000 包的尾丢弃 FIFO，瓶颈链路（网关 <-> sink）
//! 两个方向都挂载配置的排队策略。节点创建顺序：网关、各源、sink。

use std::net::Ipv4Addr;

use tracing::info;

use crate::error::ConfigError;
use crate::net::{Ipv4AddressHelper, LinkId, Network, NodeId};
use crate::queue::{ACCESS_QUEUE_PKTS, FifoQueueDisc, QueueDiscConfig};
use crate::sim::SimTime;

/// Dumbbell 拓扑配置选项
#[derive(Debug, Clone)]
pub struct DumbbellOpts {
    pub flows: usize,
    pub access_bps: u64,
    pub access_delay: SimTime,
    pub bottleneck_bps: u64,
    pub bottleneck_delay: SimTime,
    /// 每个设备发送队列的长度（包）
    pub device_queue_pkts: usize,
    pub bottleneck: QueueDiscConfig,
}

/// 构建结果：后续安装应用与 trace 时显式引用这些句柄。
#[derive(Debug, Clone)]
pub struct Dumbbell {
    pub gateway: NodeId,
    pub sources: Vec<NodeId>,
    pub sink: NodeId,
    /// 每个源的 (源 -> 网关, 网关 -> 源)
    pub access_links: Vec<(LinkId, LinkId)>,
    /// 网关 -> sink 方向（被观测的瓶颈队列）
    pub bottleneck: LinkId,
    /// sink -> 网关 方向
    pub bottleneck_rev: LinkId,
    pub sink_addr: Ipv4Addr,
}

/// 构建 dumbbell 拓扑
pub fn build_dumbbell(net: &mut Network, opts: &DumbbellOpts) -> Result<Dumbbell, ConfigError> {
    if opts.flows == 0 {
        return Err(ConfigError::Zero {
            what: "number of flows",
        });
    }
    if opts.access_bps == 0 {
        return Err(ConfigError::Zero {
            what: "access bandwidth",
        });
    }
    if opts.bottleneck_bps == 0 {
        return Err(ConfigError::Zero {
            what: "bottleneck bandwidth",
        });
    }

    let gateway = net.add_router("gateway");
    let sources: Vec<NodeId> = (0..opts.flows)
        .map(|i| net.add_host(format!("src{i}")))
        .collect();
    let sink = net.add_host("sink");

    let mut addrs = Ipv4AddressHelper::default();
    let mut access_links = Vec::with_capacity(sources.len());
    for &src in &sources {
        let pair = net.connect_p2p(src, gateway, opts.access_delay, opts.access_bps);
        addrs.new_network();
        net.assign_addresses(pair, &mut addrs);
        for link in [pair.0, pair.1] {
            net.set_queue_disc(link, Box::new(FifoQueueDisc::new(ACCESS_QUEUE_PKTS)));
            net.set_device_queue_limit(link, opts.device_queue_pkts);
        }
        access_links.push(pair);
    }

    let (bottleneck, bottleneck_rev) =
        net.connect_p2p(gateway, sink, opts.bottleneck_delay, opts.bottleneck_bps);
    addrs.new_network();
    let (_, sink_addr) = net.assign_addresses((bottleneck, bottleneck_rev), &mut addrs);
    for link in [bottleneck, bottleneck_rev] {
        net.set_queue_disc(link, opts.bottleneck.build());
        net.set_device_queue_limit(link, opts.device_queue_pkts);
    }

    info!(
        flows = opts.flows,
        qdisc = %opts.bottleneck.kind(),
        limit_pkts = opts.bottleneck.limit_pkts(),
        ?bottleneck,
        %sink_addr,
        "🏗️  dumbbell 拓扑已构建"
    );

    Ok(Dumbbell {
        gateway,
        sources,
        sink,
        access_links,
        bottleneck,
        bottleneck_rev,
        sink_addr,
    })
}
