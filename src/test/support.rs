use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::net::{NodeId, Packet, TcpSegment};
use crate::sim::SimTime;

pub(super) fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "aqmsim-rs-unit-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// A data packet of `size_bytes` (IP total length) on the given ports.
pub(super) fn data_pkt(id: u64, size_bytes: u32, src_port: u16, dst_port: u16) -> Packet {
    Packet {
        id,
        flow_id: src_port as u64,
        size_bytes,
        src: NodeId(0),
        dst: NodeId(1),
        ip_src: Ipv4Addr::new(10, 0, 1, 1),
        ip_dst: Ipv4Addr::new(10, 0, 2, 2),
        src_port,
        dst_port,
        tcp: TcpSegment::Data {
            seq: id * 1460,
            len: 1460,
        },
        enqueued_at: SimTime::ZERO,
    }
}

/// Parses `<seconds>\t<value>[\t...]` lines into (time, columns).
pub(super) fn parse_trace(raw: &str) -> Vec<(f64, Vec<u64>)> {
    raw.lines()
        .map(|line| {
            let mut cols = line.split('\t');
            let t: f64 = cols
                .next()
                .expect("timestamp column")
                .parse()
                .expect("timestamp parses");
            let rest = cols.map(|c| c.parse().expect("value parses")).collect();
            (t, rest)
        })
        .collect()
}
