//! 网络模拟模块
//!
//! 节点、链路、地址、数据包、路由、转发事件以及可订阅的 trace 信号。

mod addr;
mod deliver_packet;
mod id;
mod link;
mod link_ready;
mod net_world;
mod network;
mod network_proto;
mod node;
pub(crate) mod packet;
mod routing;
mod stats;
mod trace_hub;
mod transport;

pub use addr::Ipv4AddressHelper;
pub use deliver_packet::DeliverPacket;
pub use id::{LinkId, NodeId};
pub use link::{DEFAULT_DEVICE_QUEUE_PKTS, Link};
pub use link_ready::LinkReady;
pub use net_world::NetWorld;
pub use network::{Network, P2P_HEADER_BYTES};
pub use node::{Host, Node, NodeKind, Router};
pub use packet::{IPV4_HEADER_BYTES, Packet, TCP_HEADER_BYTES};
pub use routing::RoutingTable;
pub use stats::Stats;
pub use trace_hub::{TraceCallback, TraceHub, TraceSource, TraceValue};
pub use transport::TcpSegment;
