//! 节点类型
//!
//! 定义网络节点，包括节点 trait 和具体实现（主机、路由器）。

use super::id::NodeId;
use super::network::Network;
use super::packet::Packet;
use crate::sim::Simulator;
use tracing::trace;

/// 节点种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Host,
    Router,
}

/// 节点接口
pub trait Node: Send {
    /// 获取节点标识符
    fn id(&self) -> NodeId;

    /// 获取节点名称
    fn name(&self) -> &str;

    fn kind(&self) -> NodeKind;

    /// 处理到达的数据包
    fn on_packet(&mut self, pkt: Packet, sim: &mut Simulator, net: &mut Network);
}

/// 主机节点：目的地是自己的包交给传输层，否则继续转发。
#[derive(Debug)]
pub struct Host {
    id: NodeId,
    name: String,
}

impl Host {
    /// 创建新主机
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Node for Host {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Host
    }

    fn on_packet(&mut self, pkt: Packet, sim: &mut Simulator, net: &mut Network) {
        trace!(node = %self.name, pkt_id = pkt.id, "🖥️  Host 处理数据包");
        if self.id != pkt.dst {
            net.forward_from(self.id, pkt, sim);
        } else {
            net.on_delivered(self.id, pkt, sim);
        }
    }
}

/// 路由器（网关）节点：只转发。
#[derive(Debug)]
pub struct Router {
    id: NodeId,
    name: String,
}

impl Router {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Node for Router {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Router
    }

    fn on_packet(&mut self, pkt: Packet, sim: &mut Simulator, net: &mut Network) {
        trace!(node = %self.name, pkt_id = pkt.id, "🔀 Router 转发数据包");
        if self.id != pkt.dst {
            net.forward_from(self.id, pkt, sim);
        } else {
            net.on_delivered(self.id, pkt, sim);
        }
    }
}
