//! 接收端应用：在端口上接收数据并计数。

use tracing::debug;

use crate::net::{NetWorld, Network, NodeId};
use crate::sim::{Event, SimTime, Simulator, World};

#[derive(Debug, Clone, Copy)]
pub struct PacketSink {
    pub node: NodeId,
    pub port: u16,
    pub start: SimTime,
    pub stop: SimTime,
}

impl PacketSink {
    pub fn install(self, net: &mut Network, sim: &mut Simulator) {
        net.tcp.bind(self.node, self.port);
        sim.schedule(
            self.start,
            SinkStart {
                node: self.node,
                port: self.port,
            },
        );
        sim.schedule(
            self.stop,
            SinkStop {
                node: self.node,
                port: self.port,
            },
        );
    }

    /// 已接收（按序交付）的字节数
    pub fn rx_bytes(&self, net: &Network) -> u64 {
        net.tcp.listener(self.node, self.port).map_or(0, |l| l.rx_bytes())
    }
}

#[derive(Debug)]
pub struct SinkStart {
    pub node: NodeId,
    pub port: u16,
}

impl Event for SinkStart {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = NetWorld::downcast(world);
        debug!(node = ?self.node, port = self.port, now = %sim.now(), "PacketSink 开始监听");
        w.net.tcp.set_listening(self.node, self.port, true);
    }
}

#[derive(Debug)]
pub struct SinkStop {
    pub node: NodeId,
    pub port: u16,
}

impl Event for SinkStop {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = NetWorld::downcast(world);
        debug!(node = ?self.node, port = self.port, now = %sim.now(), "PacketSink 停止");
        w.net.tcp.set_listening(self.node, self.port, false);
    }
}
