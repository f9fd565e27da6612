//! TCP（简化版）协议实现
//!
//! 支持 dumbbell 批量传输实验所需的功能：
//! - 数据段/累计 ACK，接收端缓存乱序段
//! - Reno 系拥塞控制：慢启动；拥塞避免可选 NewReno 或 LinuxReno 计数方式
//! - 3 dupACK 快速重传 + NewReno 快速恢复（部分 ACK 继续重传）
//! - RFC 6298 RTO（Karn 采样，指数退避），超时后 go-back-N
//! - 接收窗口上限
//!
//! 不实现握手/FIN/SACK；连接在安装时即视为已建立。

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::net::{NetWorld, Network, NodeId, Packet, TcpSegment, TraceHub, TraceSource, TraceValue};
use crate::sim::{Event, SimTime, Simulator, World};

/// 一个 TCP 连接的唯一标识（同时作为数据包的 `flow_id`）。
pub type TcpConnId = u64;

/// 时钟粒度（RTO 计算中 rttvar 项的下限）
const CLOCK_GRANULARITY: SimTime = SimTime(1_000_000);

/// 拥塞避免阶段的窗口增长方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TcpVariant {
    /// 每个 ACK 增加 `mss * mss / cwnd` 字节
    NewReno,
    /// 累计确认满一个窗口的段数后增加一个 MSS
    LinuxReno,
}

impl TcpVariant {
    pub fn name(self) -> &'static str {
        match self {
            TcpVariant::NewReno => "NewReno",
            TcpVariant::LinuxReno => "LinuxReno",
        }
    }
}

impl fmt::Display for TcpVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TcpVariant {
    type Err = ConfigError;

    /// 接受 `NewReno`、`TcpNewReno`、`ns3::TcpNewReno` 等写法（不区分大小写）。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let short = lower.strip_prefix("ns3::").unwrap_or(&lower);
        let short = short.strip_prefix("tcp").unwrap_or(short);
        match short {
            "newreno" => Ok(TcpVariant::NewReno),
            "linuxreno" => Ok(TcpVariant::LinuxReno),
            _ => Err(ConfigError::UnknownTcpVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// MSS（数据段载荷大小，字节）
    pub segment_size: u32,
    /// 初始 cwnd（段数）
    pub init_cwnd_segments: u32,
    /// 初始 ssthresh（字节）
    pub init_ssthresh_bytes: u64,
    pub init_rto: SimTime,
    pub min_rto: SimTime,
    pub max_rto: SimTime,
    /// 接收端通告窗口（字节）
    pub rcv_wnd_bytes: u64,
    pub dupack_threshold: u32,
    pub variant: TcpVariant,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            segment_size: 1448,
            init_cwnd_segments: 10,
            init_ssthresh_bytes: u32::MAX as u64,
            init_rto: SimTime::from_secs(1),
            min_rto: SimTime::from_secs(1),
            max_rto: SimTime::from_secs(60),
            rcv_wnd_bytes: 131_072,
            dupack_threshold: 3,
            variant: TcpVariant::NewReno,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SentSeg {
    len: u32,
    sent_at: SimTime,
    retrans: bool,
}

#[derive(Debug, Clone)]
pub struct TcpConn {
    pub id: TcpConnId,
    pub src: NodeId,
    pub dst: NodeId,
    pub src_port: u16,
    pub dst_port: u16,
    pub cfg: TcpConfig,

    // application
    max_bytes: Option<u64>,
    sending: bool,

    // sender
    snd_una: u64,
    next_seq: u64,
    high_tx: u64,
    cwnd: u64,
    ssthresh: u64,
    cwnd_cnt: u64,
    dup_acks: u32,
    in_recovery: bool,
    recover: Option<u64>,
    srtt_ns: Option<f64>,
    rttvar_ns: f64,
    rto: SimTime,
    rto_gen: u64,
    rto_armed: bool,
    sent: BTreeMap<u64, SentSeg>,

    // receiver
    rcv_nxt: u64,
    ooo: BTreeMap<u64, u32>,

    // stats
    retransmits: u64,
    timeouts: u64,
    rx_bytes: u64,
    started_at: Option<SimTime>,
    stopped_at: Option<SimTime>,
}

impl TcpConn {
    /// `max_bytes` 为 None 表示无限量发送。
    pub fn new(
        id: TcpConnId,
        (src, src_port): (NodeId, u16),
        (dst, dst_port): (NodeId, u16),
        max_bytes: Option<u64>,
        cfg: TcpConfig,
    ) -> Self {
        let mss = cfg.segment_size.max(1) as u64;
        let cwnd = (cfg.init_cwnd_segments.max(1) as u64).saturating_mul(mss);
        let ssthresh = cfg.init_ssthresh_bytes.max(2 * mss);
        let rto = cfg.init_rto;
        Self {
            id,
            src,
            dst,
            src_port,
            dst_port,
            cfg,
            max_bytes,
            sending: false,
            snd_una: 0,
            next_seq: 0,
            high_tx: 0,
            cwnd,
            ssthresh,
            cwnd_cnt: 0,
            dup_acks: 0,
            in_recovery: false,
            recover: None,
            srtt_ns: None,
            rttvar_ns: 0.0,
            rto,
            rto_gen: 0,
            rto_armed: false,
            sent: BTreeMap::new(),
            rcv_nxt: 0,
            ooo: BTreeMap::new(),
            retransmits: 0,
            timeouts: 0,
            rx_bytes: 0,
            started_at: None,
            stopped_at: None,
        }
    }

    fn mss(&self) -> u64 {
        self.cfg.segment_size.max(1) as u64
    }

    pub fn cwnd(&self) -> u64 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> u64 {
        self.ssthresh
    }

    pub fn bytes_acked(&self) -> u64 {
        self.snd_una
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.next_seq - self.snd_una
    }

    /// 接收端按序交付给应用的字节数
    pub fn rx_bytes(&self) -> u64 {
        self.rx_bytes
    }

    pub fn retransmits(&self) -> u64 {
        self.retransmits
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn rto(&self) -> SimTime {
        self.rto
    }

    pub fn srtt(&self) -> Option<SimTime> {
        self.srtt_ns.map(|s| SimTime(s as u64))
    }

    pub fn in_recovery(&self) -> bool {
        self.in_recovery
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn started_at(&self) -> Option<SimTime> {
        self.started_at
    }

    pub fn stopped_at(&self) -> Option<SimTime> {
        self.stopped_at
    }

    fn set_cwnd(&mut self, new: u64, now: SimTime, traces: &mut TraceHub) {
        let old = self.cwnd;
        self.cwnd = new;
        if old != new {
            traces.fire(
                TraceSource::CongestionWindow(self.id),
                now,
                TraceValue::Window { old, new },
            );
        }
    }

    fn update_rtt(&mut self, sample: SimTime) {
        let r = sample.0 as f64;
        match self.srtt_ns {
            None => {
                self.srtt_ns = Some(r);
                self.rttvar_ns = r / 2.0;
            }
            Some(s) => {
                self.rttvar_ns = 0.75 * self.rttvar_ns + 0.25 * (s - r).abs();
                self.srtt_ns = Some(0.875 * s + 0.125 * r);
            }
        }
        let srtt = self.srtt_ns.unwrap_or(r);
        let rto = srtt + (4.0 * self.rttvar_ns).max(CLOCK_GRANULARITY.0 as f64);
        let rto = SimTime(rto as u64);
        self.rto = rto.max(self.cfg.min_rto).min(self.cfg.max_rto);
    }

    /// 拥塞避免/慢启动的窗口增长
    fn grow_cwnd(&mut self, newly_acked: u64, now: SimTime, traces: &mut TraceHub) {
        let mss = self.mss();
        let new = if self.cwnd < self.ssthresh {
            self.cwnd.saturating_add(newly_acked.min(mss))
        } else {
            match self.cfg.variant {
                TcpVariant::NewReno => {
                    let inc = (mss.saturating_mul(mss) / self.cwnd.max(1)).max(1);
                    self.cwnd.saturating_add(inc)
                }
                TcpVariant::LinuxReno => {
                    self.cwnd_cnt += (newly_acked / mss).max(1);
                    let w = (self.cwnd / mss).max(1);
                    if self.cwnd_cnt >= w {
                        let delta = self.cwnd_cnt / w;
                        self.cwnd_cnt -= delta * w;
                        self.cwnd.saturating_add(delta * mss)
                    } else {
                        self.cwnd
                    }
                }
            }
        };
        self.set_cwnd(new, now, traces);
    }

    fn arm_rto(&mut self, sim: &mut Simulator) {
        self.rto_gen = self.rto_gen.wrapping_add(1);
        self.rto_armed = true;
        sim.schedule_in(
            self.rto,
            TcpRto {
                conn_id: self.id,
                generation: self.rto_gen,
            },
        );
    }

    fn disarm_rto(&mut self) {
        self.rto_gen = self.rto_gen.wrapping_add(1);
        self.rto_armed = false;
    }

    /// 发送 `[seq, seq+len)`；`seq < high_tx` 时为重传。
    fn transmit(&mut self, seq: u64, len: u32, sim: &mut Simulator, net: &mut Network) {
        let now = sim.now();
        let retrans = seq < self.high_tx;
        if retrans {
            self.retransmits += 1;
        }
        self.sent.insert(
            seq,
            SentSeg {
                len,
                sent_at: now,
                retrans,
            },
        );
        self.high_tx = self.high_tx.max(seq + len as u64);
        trace!(conn_id = self.id, seq, len, retrans, "TCP 发送数据段");

        let pkt = net.make_packet(
            self.id,
            self.src,
            self.dst,
            self.src_port,
            self.dst_port,
            TcpSegment::Data { seq, len },
            len,
        );
        if !self.rto_armed {
            self.arm_rto(sim);
        }
        net.forward_from(self.src, pkt, sim);
    }

    fn retransmit_head(&mut self, sim: &mut Simulator, net: &mut Network) {
        let len = self
            .sent
            .get(&self.snd_una)
            .map(|s| s.len)
            .unwrap_or_else(|| self.mss().min(self.next_seq - self.snd_una) as u32);
        if len > 0 {
            self.transmit(self.snd_una, len, sim, net);
        }
    }

    /// 在窗口允许时发送：重传区间总是允许，新数据只在应用仍在发送时允许。
    fn send_if_possible(&mut self, sim: &mut Simulator, net: &mut Network) {
        let mss = self.mss();
        loop {
            let wnd = self.cwnd.min(self.cfg.rcv_wnd_bytes);
            let flight = self.next_seq - self.snd_una;
            if flight.saturating_add(mss) > wnd {
                break;
            }
            let is_new = self.next_seq >= self.high_tx;
            if is_new && !self.sending {
                break;
            }
            let remain = self
                .max_bytes
                .map_or(u64::MAX, |m| m.saturating_sub(self.next_seq));
            let len = mss.min(remain);
            if len == 0 {
                break;
            }
            let seq = self.next_seq;
            self.next_seq += len;
            self.transmit(seq, len as u32, sim, net);
        }
    }

    fn on_ack(&mut self, ack: u64, sim: &mut Simulator, net: &mut Network) {
        let now = sim.now();
        let mss = self.mss();

        if ack > self.snd_una {
            let newly_acked = ack - self.snd_una;

            // Karn：只用未重传过的段做 RTT 采样
            let mut sample_from = None;
            while let Some(entry) = self.sent.first_entry() {
                if *entry.key() + entry.get().len as u64 > ack {
                    break;
                }
                let seg = entry.remove();
                if !seg.retrans {
                    sample_from = Some(seg.sent_at);
                }
            }
            if let Some(t) = sample_from {
                self.update_rtt(now.saturating_sub(t));
            }

            self.snd_una = ack;
            // go-back-N 之后接收端可能确认到 next_seq 之后
            self.next_seq = self.next_seq.max(ack);
            self.dup_acks = 0;

            if self.in_recovery {
                if self.recover.is_none_or(|r| ack >= r) {
                    self.in_recovery = false;
                    debug!(conn_id = self.id, ack, "退出快速恢复");
                    self.set_cwnd(self.ssthresh, now, &mut net.traces);
                } else {
                    // 部分 ACK：继续重传下一个缺口，窗口收缩已确认量
                    let deflated = self.cwnd.saturating_sub(newly_acked).saturating_add(mss);
                    self.set_cwnd(deflated.max(mss), now, &mut net.traces);
                    self.disarm_rto();
                    self.retransmit_head(sim, net);
                }
            } else {
                self.grow_cwnd(newly_acked, now, &mut net.traces);
            }

            if self.rto_armed {
                self.disarm_rto();
            }
            self.send_if_possible(sim, net);
            if self.next_seq > self.snd_una && !self.rto_armed {
                self.arm_rto(sim);
            }
        } else if ack == self.snd_una && self.next_seq > self.snd_una {
            if self.in_recovery {
                let inflated = self.cwnd.saturating_add(mss);
                self.set_cwnd(inflated, now, &mut net.traces);
                self.send_if_possible(sim, net);
                return;
            }
            self.dup_acks += 1;
            if self.dup_acks == self.cfg.dupack_threshold && self.recover.is_none_or(|r| ack > r) {
                let flight = self.next_seq - self.snd_una;
                self.ssthresh = (flight / 2).max(2 * mss);
                self.recover = Some(self.high_tx);
                self.in_recovery = true;
                self.cwnd_cnt = 0;
                debug!(conn_id = self.id, seq = self.snd_una, ssthresh = self.ssthresh, "快速重传");
                self.set_cwnd(self.ssthresh + 3 * mss, now, &mut net.traces);
                self.disarm_rto();
                self.retransmit_head(sim, net);
            }
        }
    }

    fn on_timeout(&mut self, sim: &mut Simulator, net: &mut Network) {
        let now = sim.now();
        let mss = self.mss();
        self.rto_armed = false;
        if self.next_seq == self.snd_una {
            return;
        }

        self.timeouts += 1;
        let flight = self.next_seq - self.snd_una;
        self.ssthresh = (flight / 2).max(2 * mss);
        self.set_cwnd(mss, now, &mut net.traces);
        self.in_recovery = false;
        self.dup_acks = 0;
        self.cwnd_cnt = 0;
        self.recover = Some(self.high_tx);
        self.rto = SimTime(self.rto.0.saturating_mul(2)).min(self.cfg.max_rto);
        debug!(conn_id = self.id, seq = self.snd_una, rto = ?self.rto, "RTO 超时，回到慢启动");

        // go-back-N：从最早未确认处重新发送
        self.sent.clear();
        self.next_seq = self.snd_una;
        self.send_if_possible(sim, net);
        if self.next_seq > self.snd_una && !self.rto_armed {
            self.arm_rto(sim);
        }
    }
}

/// 接收端监听的端口
#[derive(Debug, Clone, Default)]
pub struct Listener {
    open: bool,
    rx_bytes: u64,
}

impl Listener {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn rx_bytes(&self) -> u64 {
        self.rx_bytes
    }
}

#[derive(Debug, Default)]
pub struct TcpStack {
    conns: BTreeMap<TcpConnId, TcpConn>,
    listeners: HashMap<(NodeId, u16), Listener>,
}

impl TcpStack {
    pub fn insert(&mut self, conn: TcpConn) {
        self.conns.insert(conn.id, conn);
    }

    pub fn get(&self, id: TcpConnId) -> Option<&TcpConn> {
        self.conns.get(&id)
    }

    pub fn get_mut(&mut self, id: TcpConnId) -> Option<&mut TcpConn> {
        self.conns.get_mut(&id)
    }

    /// 在节点上登记一个端口（初始关闭）。
    pub fn bind(&mut self, node: NodeId, port: u16) {
        self.listeners.entry((node, port)).or_default();
    }

    pub fn set_listening(&mut self, node: NodeId, port: u16, open: bool) {
        self.listeners.entry((node, port)).or_default().open = open;
    }

    pub fn listener(&self, node: NodeId, port: u16) -> Option<&Listener> {
        self.listeners.get(&(node, port))
    }

    pub fn start_sending(&mut self, id: TcpConnId, sim: &mut Simulator, net: &mut Network) {
        let Some(conn) = self.conns.get_mut(&id) else {
            return;
        };
        conn.sending = true;
        conn.started_at.get_or_insert(sim.now());
        conn.send_if_possible(sim, net);
    }

    pub fn stop_sending(&mut self, id: TcpConnId, now: SimTime) {
        if let Some(conn) = self.conns.get_mut(&id) {
            conn.sending = false;
            conn.stopped_at = Some(now);
        }
    }

    pub fn on_segment(&mut self, at: NodeId, pkt: &Packet, sim: &mut Simulator, net: &mut Network) {
        let Some(conn) = self.conns.get_mut(&pkt.flow_id) else {
            return;
        };
        match pkt.tcp {
            TcpSegment::Data { seq, len } => {
                if at != conn.dst {
                    return;
                }
                let Some(listener) = self.listeners.get_mut(&(at, conn.dst_port)) else {
                    return;
                };
                if !listener.open {
                    return;
                }

                let before = conn.rcv_nxt;
                if seq == conn.rcv_nxt {
                    conn.rcv_nxt += len as u64;
                    while let Some(l) = conn.ooo.remove(&conn.rcv_nxt) {
                        conn.rcv_nxt += l as u64;
                    }
                } else if seq > conn.rcv_nxt
                    && seq + len as u64 <= conn.rcv_nxt + conn.cfg.rcv_wnd_bytes
                {
                    conn.ooo.insert(seq, len);
                }
                let delivered = conn.rcv_nxt - before;
                conn.rx_bytes += delivered;
                listener.rx_bytes += delivered;

                // 无论是否乱序，都发累计 ACK（dupACK 体现为 ack 不前进）
                let ack = conn.rcv_nxt;
                let ack_pkt = net.make_packet(
                    conn.id,
                    conn.dst,
                    conn.src,
                    conn.dst_port,
                    conn.src_port,
                    TcpSegment::Ack { ack },
                    0,
                );
                net.forward_from(conn.dst, ack_pkt, sim);
            }
            TcpSegment::Ack { ack } => {
                if at != conn.src {
                    return;
                }
                conn.on_ack(ack, sim, net);
            }
        }
    }

    fn on_rto(&mut self, id: TcpConnId, generation: u64, sim: &mut Simulator, net: &mut Network) {
        let Some(conn) = self.conns.get_mut(&id) else {
            return;
        };
        if !conn.rto_armed || conn.rto_gen != generation {
            return;
        }
        conn.on_timeout(sim, net);
    }
}

/// TCP RTO 事件：只有最新一次设置的定时器有效
#[derive(Debug)]
pub struct TcpRto {
    pub conn_id: TcpConnId,
    pub generation: u64,
}

impl Event for TcpRto {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let TcpRto {
            conn_id,
            generation,
        } = *self;
        let w = NetWorld::downcast(world);

        // 规避同时借用 `w.net` 与 `w.net.tcp`
        let mut tcp = std::mem::take(&mut w.net.tcp);
        tcp.on_rto(conn_id, generation, sim, &mut w.net);
        w.net.tcp = tcp;
    }
}
