//! 数据包类型
//!
//! 仿真中的 IPv4/TCP 数据包。`size_bytes` 为 IP 包总长度（头部 + 载荷）。

use std::net::Ipv4Addr;

use super::id::NodeId;
use super::transport::TcpSegment;
use crate::sim::SimTime;

pub const IPV4_HEADER_BYTES: u32 = 20;
pub const TCP_HEADER_BYTES: u32 = 20;

/// 网络数据包
#[derive(Debug, Clone)]
pub struct Packet {
    pub id: u64,
    pub flow_id: u64,
    pub size_bytes: u32,
    pub src: NodeId,
    pub dst: NodeId,
    pub ip_src: Ipv4Addr,
    pub ip_dst: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub tcp: TcpSegment,
    /// 进入当前队列的时间（由队列在入队时写入，CoDel 用于计算逗留时间）
    pub enqueued_at: SimTime,
}

impl Packet {
    /// 五元组哈希（协议固定为 TCP），`salt` 用于扰动。
    pub fn flow_hash(&self, salt: u64) -> u64 {
        let addrs = ((u32::from(self.ip_src) as u64) << 32) | u32::from(self.ip_dst) as u64;
        let ports = ((self.src_port as u64) << 16) | self.dst_port as u64 | (6u64 << 32);
        mix64(mix64(addrs ^ salt) ^ ports)
    }
}

/// 一个简单、确定性的 64-bit mixing（splitmix64），保证每次运行哈希一致。
pub(crate) fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
