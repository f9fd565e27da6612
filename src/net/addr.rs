//! IPv4 地址分配
//!
//! 每条点到点链路占用一个 /24 子网：`new_network()` 切换到下一个子网，
//! `assign()` 在当前子网内依次分配主机地址（.1, .2, ...）。

use std::net::Ipv4Addr;

#[derive(Debug, Clone)]
pub struct Ipv4AddressHelper {
    network: u32,
    mask: u32,
    next_host: u32,
}

impl Ipv4AddressHelper {
    /// `base` 为起始网络地址，`prefix_len` 为掩码长度。
    pub fn new(base: Ipv4Addr, prefix_len: u8) -> Self {
        let prefix_len = prefix_len.min(30);
        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len as u32)
        };
        Self {
            network: u32::from(base) & mask,
            mask,
            next_host: 1,
        }
    }

    /// 切换到下一个子网（网络号 +1），主机号从 1 重新开始。
    pub fn new_network(&mut self) {
        let step = (!self.mask).wrapping_add(1);
        self.network = self.network.wrapping_add(step);
        self.next_host = 1;
    }

    /// 分配当前子网中的下一个地址。
    pub fn assign(&mut self) -> Ipv4Addr {
        let host = self.next_host & !self.mask;
        self.next_host = self.next_host.wrapping_add(1);
        Ipv4Addr::from(self.network | host)
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }
}

impl Default for Ipv4AddressHelper {
    fn default() -> Self {
        Self::new(Ipv4Addr::new(10, 0, 0, 0), 24)
    }
}
