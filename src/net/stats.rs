//! 统计信息

/// 网络统计信息
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub delivered_pkts: u64,
    pub delivered_bytes: u64,
    pub dropped_pkts: u64,
    pub dropped_bytes: u64,
}
