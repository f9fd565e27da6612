//! Protocol dispatch hooks for the network.

use crate::sim::Simulator;
use tracing::trace;

use super::{Network, NodeId, Packet};

impl Network {
    /// 数据包送达目的地时的处理：统计后交给 TCP 协议栈。
    #[tracing::instrument(skip(self, sim, pkt), fields(pkt_id = pkt.id, flow_id = pkt.flow_id))]
    pub(crate) fn on_delivered(&mut self, at: NodeId, pkt: Packet, sim: &mut Simulator) {
        self.stats.delivered_pkts += 1;
        self.stats.delivered_bytes += pkt.size_bytes as u64;
        trace!(
            pkt_id = pkt.id,
            flow_id = pkt.flow_id,
            delivered_pkts = self.stats.delivered_pkts,
            "✅ 数据包送达目的地"
        );

        // 规避同时借用 `self` 与 `self.tcp`
        let mut tcp = std::mem::take(&mut self.tcp);
        tcp.on_segment(at, &pkt, sim, self);
        self.tcp = tcp;
    }
}
