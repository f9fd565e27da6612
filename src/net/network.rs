//! 网络拓扑管理
//!
//! 定义网络拓扑结构，包含节点、链路、数据包转发、队列驱动和统计信息。

use std::collections::HashMap;
use std::net::Ipv4Addr;

use super::addr::Ipv4AddressHelper;
use super::deliver_packet::DeliverPacket;
use super::id::{LinkId, NodeId};
use super::link::Link;
use super::link_ready::LinkReady;
use super::node::{Host, Node, NodeKind, Router};
use super::packet::{IPV4_HEADER_BYTES, Packet, TCP_HEADER_BYTES};
use super::routing::RoutingTable;
use super::stats::Stats;
use super::trace_hub::{TraceCallback, TraceHub, TraceSource, TraceValue};
use super::transport::TcpSegment;
use crate::error::TraceError;
use crate::proto::tcp::TcpStack;
use crate::queue::QueueDisc;
use crate::sim::{SimTime, Simulator};
use tracing::{debug, trace};

/// 点到点链路帧头（协议字段）长度
pub const P2P_HEADER_BYTES: u32 = 2;

/// 网络拓扑
#[derive(Default)]
pub struct Network {
    nodes: Vec<Option<Box<dyn Node>>>,
    node_names: Vec<String>,
    node_kinds: Vec<NodeKind>,
    node_addrs: Vec<Option<Ipv4Addr>>,
    next_device: Vec<u32>,
    links: Vec<Link>,
    edges: HashMap<(NodeId, NodeId), LinkId>,
    adj: Vec<Vec<NodeId>>,
    rev_adj: Vec<Vec<NodeId>>,
    routing: RoutingTable,
    next_pkt_id: u64,
    drop_buf: Vec<Packet>,
    pub tcp: TcpStack,
    pub traces: TraceHub,
    pub stats: Stats,
}

impl Network {
    fn push_node(&mut self, node: Box<dyn Node>, name: String, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(node));
        self.node_names.push(name);
        self.node_kinds.push(kind);
        self.node_addrs.push(None);
        // 0 号设备是回环
        self.next_device.push(1);
        self.adj.push(Vec::new());
        self.rev_adj.push(Vec::new());
        self.routing.mark_dirty();
        id
    }

    /// 添加主机节点
    pub fn add_host(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        let id = NodeId(self.nodes.len());
        self.push_node(Box::new(Host::new(id, name.clone())), name, NodeKind::Host)
    }

    /// 添加路由器节点
    pub fn add_router(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        let id = NodeId(self.nodes.len());
        self.push_node(Box::new(Router::new(id, name.clone())), name, NodeKind::Router)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.node_names.get(id.0).map(String::as_str)
    }

    pub fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node_kinds.get(id.0).copied()
    }

    /// 节点的主地址（第一个被分配地址的设备）
    pub fn node_addr(&self, id: NodeId) -> Option<Ipv4Addr> {
        self.node_addrs.get(id.0).copied().flatten()
    }

    /// 连接两个节点（创建单向链路，占用 `from` 上的一个新设备）
    pub fn connect(
        &mut self,
        from: NodeId,
        to: NodeId,
        latency: SimTime,
        bandwidth_bps: u64,
    ) -> LinkId {
        let id = LinkId(self.links.len());
        let mut link = Link::new(id, from, to, latency, bandwidth_bps);
        link.device_index = self.next_device[from.0];
        self.next_device[from.0] += 1;
        self.links.push(link);
        self.edges.insert((from, to), id);
        self.adj[from.0].push(to);
        self.rev_adj[to.0].push(from);
        self.routing.mark_dirty();
        id
    }

    /// 创建一条双向点到点链路，返回 (a->b, b->a)。
    pub fn connect_p2p(
        &mut self,
        a: NodeId,
        b: NodeId,
        latency: SimTime,
        bandwidth_bps: u64,
    ) -> (LinkId, LinkId) {
        let ab = self.connect(a, b, latency, bandwidth_bps);
        let ba = self.connect(b, a, latency, bandwidth_bps);
        (ab, ba)
    }

    /// 为一条双向链路的两端分配同一子网内的地址。
    pub fn assign_addresses(
        &mut self,
        (ab, ba): (LinkId, LinkId),
        helper: &mut Ipv4AddressHelper,
    ) -> (Ipv4Addr, Ipv4Addr) {
        let mut assign = |net: &mut Network, link: LinkId| {
            let addr = helper.assign();
            let from = net.links[link.0].from;
            net.links[link.0].addr = Some(addr);
            if net.node_addrs[from.0].is_none() {
                net.node_addrs[from.0] = Some(addr);
            }
            addr
        };
        let a = assign(self, ab);
        let b = assign(self, ba);
        (a, b)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    pub fn link_between(&self, from: NodeId, to: NodeId) -> Option<LinkId> {
        self.edges.get(&(from, to)).copied()
    }

    /// 替换链路上的排队策略
    pub fn set_queue_disc(&mut self, link: LinkId, qdisc: Box<dyn QueueDisc>) {
        self.links[link.0].qdisc = qdisc;
    }

    /// 设置链路设备队列的长度（包，至少为 1）
    pub fn set_device_queue_limit(&mut self, link: LinkId, pkts: usize) {
        self.links[link.0].device_limit = pkts.max(1);
    }

    /// 创建一个 TCP 数据包，`payload` 为 TCP 载荷字节数。
    #[allow(clippy::too_many_arguments)]
    pub fn make_packet(
        &mut self,
        flow_id: u64,
        src: NodeId,
        dst: NodeId,
        src_port: u16,
        dst_port: u16,
        tcp: TcpSegment,
        payload: u32,
    ) -> Packet {
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        Packet {
            id,
            flow_id,
            size_bytes: payload.saturating_add(IPV4_HEADER_BYTES + TCP_HEADER_BYTES),
            src,
            dst,
            ip_src: self.node_addr(src).unwrap_or(Ipv4Addr::UNSPECIFIED),
            ip_dst: self.node_addr(dst).unwrap_or(Ipv4Addr::UNSPECIFIED),
            src_port,
            dst_port,
            tcp,
            enqueued_at: SimTime::ZERO,
        }
    }

    /// 订阅一个信号源；源必须存在于当前拓扑/协议栈中。
    pub fn trace_connect(
        &mut self,
        source: TraceSource,
        cb: TraceCallback,
    ) -> Result<(), TraceError> {
        if !self.has_trace_source(source) {
            return Err(TraceError::UnknownSource(source));
        }
        debug!(?source, "连接 trace 回调");
        self.traces.subscribe(source, cb);
        Ok(())
    }

    pub fn has_trace_source(&self, source: TraceSource) -> bool {
        match source {
            TraceSource::CongestionWindow(conn) => self.tcp.get(conn).is_some(),
            TraceSource::PacketsInQueue(link) | TraceSource::Drop(link) => {
                link.0 < self.links.len()
            }
            TraceSource::NodeTx(node) | TraceSource::NodeRx(node) => node.0 < self.nodes.len(),
        }
    }

    /// 将数据包交付给节点处理
    #[tracing::instrument(skip(self, sim, pkt), fields(pkt_id = pkt.id, to = ?to))]
    pub fn deliver(&mut self, to: NodeId, pkt: Packet, sim: &mut Simulator) {
        self.traces
            .fire(TraceSource::NodeRx(to), sim.now(), TraceValue::Packet(&pkt));

        // 暂时把节点取出来，避免 &mut self 与 &mut node 的重叠借用。
        let mut node = self.nodes[to.0].take().expect("node exists");
        node.on_packet(pkt, sim, self);
        self.nodes[to.0] = Some(node);
    }

    /// 从指定节点转发数据包：查路由、进入出口链路的排队策略。
    #[tracing::instrument(skip(self, sim, pkt), fields(pkt_id = pkt.id, from = ?from))]
    pub fn forward_from(&mut self, from: NodeId, pkt: Packet, sim: &mut Simulator) {
        self.routing.ensure_built(&self.adj, &self.rev_adj);
        let next = self
            .routing
            .next_hop(from, pkt.dst)
            .unwrap_or_else(|| panic!("no route from {:?} to {:?}", from, pkt.dst));
        let link_id = *self
            .edges
            .get(&(from, next))
            .unwrap_or_else(|| panic!("no link from {:?} to {:?}", from, next));
        trace!(pkt_id = pkt.id, ?from, ?next, ?link_id, "🚀 转发数据包");

        let now = sim.now();
        let mut drops = std::mem::take(&mut self.drop_buf);
        let link = &mut self.links[link_id.0];
        let old = link.qdisc.len();
        link.qdisc.enqueue(pkt, now, &mut drops);
        let new = link.qdisc.len();
        self.report_queue_change(link_id, now, old, new, &mut drops);
        self.drop_buf = drops;

        self.service_link(link_id, sim);
    }

    pub(crate) fn on_link_ready(&mut self, link_id: LinkId, sim: &mut Simulator) {
        self.links[link_id.0].busy = false;
        self.service_link(link_id, sim);
    }

    fn service_link(&mut self, link_id: LinkId, sim: &mut Simulator) {
        self.refill_device_queue(link_id, sim.now());
        self.start_tx_if_idle(link_id, sim);
        self.refill_device_queue(link_id, sim.now());
    }

    /// 设备队列有空位时从 qdisc 取包。
    fn refill_device_queue(&mut self, link_id: LinkId, now: SimTime) {
        loop {
            let mut drops = std::mem::take(&mut self.drop_buf);
            let link = &mut self.links[link_id.0];
            if link.device_queue.len() >= link.device_limit {
                self.drop_buf = drops;
                return;
            }
            let old = link.qdisc.len();
            let pkt = link.qdisc.dequeue(now, &mut drops);
            let new = link.qdisc.len();
            let got = pkt.is_some();
            if let Some(pkt) = pkt {
                link.device_queue.push_back(pkt);
            }
            self.report_queue_change(link_id, now, old, new, &mut drops);
            self.drop_buf = drops;
            if !got {
                return;
            }
        }
    }

    fn start_tx_if_idle(&mut self, link_id: LinkId, sim: &mut Simulator) {
        let now = sim.now();
        let link = &mut self.links[link_id.0];
        if link.busy {
            return;
        }
        let Some(pkt) = link.device_queue.pop_front() else {
            return;
        };
        link.busy = true;
        let depart = now.saturating_add(link.tx_time(pkt.size_bytes + P2P_HEADER_BYTES));
        let arrive = depart.saturating_add(link.latency);
        link.tx_pkts += 1;
        link.tx_bytes += pkt.size_bytes as u64;
        let (from, to) = (link.from, link.to);

        trace!(pkt_id = pkt.id, ?link_id, ?depart, ?arrive, "开始发送");
        self.traces
            .fire(TraceSource::NodeTx(from), now, TraceValue::Packet(&pkt));

        sim.schedule(depart, LinkReady { link_id });
        sim.schedule(arrive, DeliverPacket { to, pkt });
    }

    fn report_queue_change(
        &mut self,
        link_id: LinkId,
        now: SimTime,
        old: usize,
        new: usize,
        drops: &mut Vec<Packet>,
    ) {
        for pkt in drops.drain(..) {
            self.links[link_id.0].drops += 1;
            self.stats.dropped_pkts += 1;
            self.stats.dropped_bytes += pkt.size_bytes as u64;
            debug!(
                ?link_id,
                pkt_id = pkt.id,
                flow_id = pkt.flow_id,
                seq = pkt.tcp.header_seq(),
                "🗑️  qdisc 丢包"
            );
            self.traces
                .fire(TraceSource::Drop(link_id), now, TraceValue::Packet(&pkt));
        }
        if old != new {
            self.traces.fire(
                TraceSource::PacketsInQueue(link_id),
                now,
                TraceValue::Count { old, new },
            );
        }
    }
}
