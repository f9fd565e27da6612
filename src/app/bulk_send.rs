//! 批量发送应用
//!
//! 启动后尽可能快地向对端写数据（受 TCP 窗口约束），`max_bytes = 0` 表示不限量；
//! 停止后不再产生新数据，已发出数据的重传仍由 TCP 完成。

use tracing::{debug, info, warn};

use crate::net::{NetWorld, Network, NodeId};
use crate::proto::tcp::{TcpConfig, TcpConn, TcpConnId};
use crate::sim::{Event, SimTime, Simulator, World};

/// 批量发送应用的安装参数
#[derive(Debug, Clone)]
pub struct BulkSend {
    pub conn_id: TcpConnId,
    pub local: (NodeId, u16),
    pub remote: (NodeId, u16),
    /// 每次写入的大小，同时作为 TCP 的 MSS
    pub send_size: u32,
    /// 0 表示不限量
    pub max_bytes: u64,
    pub start: SimTime,
    pub stop: SimTime,
    pub tcp: TcpConfig,
}

impl BulkSend {
    /// 创建 TCP 连接并调度启停事件，返回连接 id。
    pub fn install(self, net: &mut Network, sim: &mut Simulator) -> TcpConnId {
        let cfg = TcpConfig {
            segment_size: self.send_size,
            ..self.tcp
        };
        let max_bytes = (self.max_bytes > 0).then_some(self.max_bytes);
        let conn = TcpConn::new(self.conn_id, self.local, self.remote, max_bytes, cfg);
        net.tcp.insert(conn);

        info!(
            conn_id = self.conn_id,
            src = ?self.local,
            dst = ?self.remote,
            start = %self.start,
            stop = %self.stop,
            "📦 安装 BulkSend"
        );
        // 停止时刻之后才到的启动不再生效
        if self.start < self.stop {
            sim.schedule(
                self.start,
                BulkSendStart {
                    conn_id: self.conn_id,
                },
            );
        } else {
            warn!(conn_id = self.conn_id, start = %self.start, stop = %self.stop, "启动时刻不早于停止时刻，该流不会发送数据");
        }
        sim.schedule(
            self.stop,
            BulkSendStop {
                conn_id: self.conn_id,
            },
        );
        self.conn_id
    }
}

/// 应用开始发送
#[derive(Debug)]
pub struct BulkSendStart {
    pub conn_id: TcpConnId,
}

impl Event for BulkSendStart {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = NetWorld::downcast(world);
        debug!(conn_id = self.conn_id, now = %sim.now(), "▶️  BulkSend 启动");
        let mut tcp = std::mem::take(&mut w.net.tcp);
        tcp.start_sending(self.conn_id, sim, &mut w.net);
        w.net.tcp = tcp;
    }
}

/// 应用停止发送新数据
#[derive(Debug)]
pub struct BulkSendStop {
    pub conn_id: TcpConnId,
}

impl Event for BulkSendStop {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = NetWorld::downcast(world);
        debug!(conn_id = self.conn_id, now = %sim.now(), "⏹️  BulkSend 停止");
        w.net.tcp.stop_sending(self.conn_id, sim.now());
    }
}
