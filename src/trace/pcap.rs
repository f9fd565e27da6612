//! libpcap 格式抓包
//!
//! 链路类型 PPP（9）：每条记录为 2 字节 PPP 协议字段 + IPv4 头 + TCP 头，
//! 载荷不写入文件，记录头里的原始长度仍是完整帧长。

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::TraceError;
use crate::net::{P2P_HEADER_BYTES, Packet, TcpSegment};
use crate::sim::SimTime;

pub const PCAP_LINKTYPE_PPP: u32 = 9;
const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
const SNAPLEN: u32 = 65_535;
const PPP_PROTO_IPV4: u16 = 0x0021;

const TCP_FLAG_PSH: u8 = 0x08;
const TCP_FLAG_ACK: u8 = 0x10;

#[derive(Debug)]
pub struct PcapWriter {
    path: PathBuf,
    out: BufWriter<File>,
    records: u64,
    error: Option<io::Error>,
}

impl PcapWriter {
    /// 创建文件并写入全局头。
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| TraceError::Create {
            path: path.clone(),
            source,
        })?;
        let mut out = BufWriter::new(file);

        let mut hdr = Vec::with_capacity(24);
        hdr.extend_from_slice(&PCAP_MAGIC.to_le_bytes());
        hdr.extend_from_slice(&2u16.to_le_bytes());
        hdr.extend_from_slice(&4u16.to_le_bytes());
        hdr.extend_from_slice(&0i32.to_le_bytes()); // thiszone
        hdr.extend_from_slice(&0u32.to_le_bytes()); // sigfigs
        hdr.extend_from_slice(&SNAPLEN.to_le_bytes());
        hdr.extend_from_slice(&PCAP_LINKTYPE_PPP.to_le_bytes());
        out.write_all(&hdr).map_err(|source| TraceError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            out,
            records: 0,
            error: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn write_packet(&mut self, now: SimTime, pkt: &Packet) {
        if self.error.is_some() {
            return;
        }
        let frame = encode_headers(pkt);
        let orig_len = pkt.size_bytes + P2P_HEADER_BYTES;
        let secs = now.0 / 1_000_000_000;
        let usecs = (now.0 % 1_000_000_000) / 1_000;

        let mut rec = Vec::with_capacity(16 + frame.len());
        rec.extend_from_slice(&(secs as u32).to_le_bytes());
        rec.extend_from_slice(&(usecs as u32).to_le_bytes());
        rec.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        rec.extend_from_slice(&orig_len.to_le_bytes());
        rec.extend_from_slice(&frame);
        match self.out.write_all(&rec) {
            Ok(()) => self.records += 1,
            Err(e) => self.error = Some(e),
        }
    }

    pub fn finish(&mut self) -> Result<u64, TraceError> {
        if let Some(source) = self.error.take() {
            return Err(TraceError::Write {
                path: self.path.clone(),
                source,
            });
        }
        self.out.flush().map_err(|source| TraceError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.records)
    }
}

/// PPP + IPv4 + TCP 头（网络字节序）
pub(crate) fn encode_headers(pkt: &Packet) -> Vec<u8> {
    let mut buf = Vec::with_capacity(42);
    buf.extend_from_slice(&PPP_PROTO_IPV4.to_be_bytes());

    let mut ip = [0u8; 20];
    ip[0] = 0x45;
    ip[2..4].copy_from_slice(&(pkt.size_bytes.min(u16::MAX as u32) as u16).to_be_bytes());
    ip[4..6].copy_from_slice(&(pkt.id as u16).to_be_bytes());
    ip[8] = 64;
    ip[9] = 6;
    ip[12..16].copy_from_slice(&pkt.ip_src.octets());
    ip[16..20].copy_from_slice(&pkt.ip_dst.octets());
    let csum = ipv4_checksum(&ip);
    ip[10..12].copy_from_slice(&csum.to_be_bytes());
    buf.extend_from_slice(&ip);

    let mut tcp = [0u8; 20];
    tcp[0..2].copy_from_slice(&pkt.src_port.to_be_bytes());
    tcp[2..4].copy_from_slice(&pkt.dst_port.to_be_bytes());
    tcp[4..8].copy_from_slice(&pkt.tcp.header_seq().to_be_bytes());
    tcp[8..12].copy_from_slice(&pkt.tcp.header_ack().to_be_bytes());
    tcp[12] = 5 << 4;
    tcp[13] = match pkt.tcp {
        TcpSegment::Data { .. } => TCP_FLAG_PSH | TCP_FLAG_ACK,
        TcpSegment::Ack { .. } => TCP_FLAG_ACK,
    };
    tcp[14..16].copy_from_slice(&u16::MAX.to_be_bytes());
    buf.extend_from_slice(&tcp);
    buf
}

/// IPv4 头部校验和（反码和）
pub(crate) fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|c| u16::from_be_bytes([c[0], *c.get(1).unwrap_or(&0)]) as u32)
        .sum();
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
