//! RED（Random Early Detection）
//!
//! 入队时用指数加权平均估计队列长度 `avg`：
//! - `avg < min_th`：不丢包；
//! - `min_th <= avg < max_th`：按 `max_p` 线性插值的概率提前丢包；
//! - gentle 模式下 `max_th <= avg < 2 * max_th` 概率从 `max_p` 线性增长到 1；
//! - 更高则强制丢包。队列达到硬上限同样强制丢包。
//!
//! 随机数来自按种子初始化的 `StdRng`，相同参数的两次运行结果一致。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ConfigError;
use crate::net::Packet;
use crate::sim::SimTime;

use super::codel::PacketFifo;
use super::{QueueDisc, QueueDiscKind};

/// 平均队长的权重 `q_w` 的取值方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RedWeight {
    Fixed(f64),
    /// `1 - exp(-1 / C)`，C 为链路每秒可发送的平均大小包数
    Auto,
    /// 按估计 RTT（由链路时延推出）选择，时间常数约为 10 个 RTT
    FromRtt,
    /// `1 - exp(-10 / C)`
    Fast,
}

impl RedWeight {
    /// 命令行取值：正数为固定权重，-1/-2/-3 分别为 Auto/FromRtt/Fast。
    pub fn from_code(code: f64) -> Self {
        if code == -1.0 {
            RedWeight::Auto
        } else if code == -2.0 {
            RedWeight::FromRtt
        } else if code == -3.0 {
            RedWeight::Fast
        } else {
            RedWeight::Fixed(code)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedParams {
    pub min_th: f64,
    pub max_th: f64,
    pub weight: RedWeight,
    /// `max_p = 1 / l_interm`
    pub l_interm: f64,
    pub gentle: bool,
    /// 两次丢包之间尽量拉开间隔
    pub wait: bool,
    pub mean_pkt_size: u32,
    pub link_bandwidth_bps: u64,
    pub link_delay: SimTime,
    pub seed: u64,
}

impl Default for RedParams {
    fn default() -> Self {
        Self {
            min_th: 5.0,
            max_th: 15.0,
            weight: RedWeight::Fixed(0.002),
            l_interm: 50.0,
            gentle: true,
            wait: true,
            mean_pkt_size: 500,
            link_bandwidth_bps: 1_500_000,
            link_delay: SimTime::from_millis(20),
            seed: 1,
        }
    }
}

impl RedParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = self.min_th.is_finite()
            && self.max_th.is_finite()
            && self.min_th >= 0.0
            && self.min_th < self.max_th;
        if !ok {
            return Err(ConfigError::InvalidRedThresholds {
                min_th: self.min_th,
                max_th: self.max_th,
            });
        }
        if let RedWeight::Fixed(w) = self.weight {
            if !(w > 0.0 && w <= 1.0) {
                return Err(ConfigError::InvalidRedWeight(w));
            }
        }
        if self.link_bandwidth_bps == 0 {
            return Err(ConfigError::Zero {
                what: "RED link bandwidth",
            });
        }
        if self.mean_pkt_size == 0 {
            return Err(ConfigError::Zero {
                what: "RED mean packet size",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedDrop {
    Early,
    Forced,
}

#[derive(Debug)]
pub struct RedQueueDisc {
    limit_pkts: u32,
    params: RedParams,
    fifo: PacketFifo,
    rng: StdRng,

    q_w: f64,
    /// 链路每秒可发送的平均大小包数
    ptc: f64,
    max_p: f64,

    avg: f64,
    count: u64,
    old: bool,
    idle: bool,
    idle_since: SimTime,

    early_drops: u64,
    forced_drops: u64,
}

impl RedQueueDisc {
    pub fn new(limit_pkts: u32, params: RedParams) -> Self {
        let ptc = params.link_bandwidth_bps as f64 / (8.0 * params.mean_pkt_size.max(1) as f64);
        let q_w = match params.weight {
            RedWeight::Fixed(w) => w,
            RedWeight::Auto => 1.0 - (-1.0 / ptc).exp(),
            RedWeight::FromRtt => {
                let rtt = (3.0 * (params.link_delay.as_secs_f64() + 1.0 / ptc)).max(0.1);
                1.0 - (-1.0 / (10.0 * rtt * ptc)).exp()
            }
            RedWeight::Fast => 1.0 - (-10.0 / ptc).exp(),
        };
        let max_p = 1.0 / params.l_interm;
        let rng = StdRng::seed_from_u64(params.seed);
        Self {
            limit_pkts,
            params,
            fifo: PacketFifo::default(),
            rng,
            q_w,
            ptc,
            max_p,
            avg: 0.0,
            count: 0,
            old: false,
            idle: true,
            idle_since: SimTime::ZERO,
            early_drops: 0,
            forced_drops: 0,
        }
    }

    /// 当前的平均队长估计（包）
    pub fn avg(&self) -> f64 {
        self.avg
    }

    pub fn q_w(&self) -> f64 {
        self.q_w
    }

    pub fn early_drops(&self) -> u64 {
        self.early_drops
    }

    pub fn forced_drops(&self) -> u64 {
        self.forced_drops
    }

    fn estimate(&mut self, n_queued: usize, now: SimTime) {
        // 空闲期间按链路可发送的包数衰减，相当于空闲时有 m 个长度为 0 的样本。
        let mut m = 0.0;
        if self.idle {
            self.idle = false;
            m = (self.ptc * now.saturating_sub(self.idle_since).as_secs_f64()).floor();
        }
        self.avg = self.avg * (1.0 - self.q_w).powf(m + 1.0) + self.q_w * n_queued as f64;
    }

    /// 未经 count 修正的丢包概率
    fn base_probability(&self) -> f64 {
        let RedParams {
            min_th,
            max_th,
            gentle,
            ..
        } = self.params;
        let p = if gentle && self.avg >= max_th {
            (1.0 - self.max_p) / max_th * self.avg + (2.0 * self.max_p - 1.0)
        } else if !gentle && self.avg >= max_th {
            1.0
        } else {
            let a = self.max_p / (max_th - min_th);
            a * self.avg - min_th * a
        };
        p.clamp(0.0, 1.0)
    }

    /// 用自上次丢包以来的到达数修正概率，使丢包在时间上更均匀。
    fn modify_probability(&self, p: f64) -> f64 {
        let c = self.count as f64;
        let p = if self.params.wait {
            if c * p < 1.0 {
                0.0
            } else if c * p < 2.0 {
                p / (2.0 - c * p)
            } else {
                1.0
            }
        } else if c * p < 1.0 {
            p / (1.0 - c * p)
        } else {
            1.0
        };
        p.min(1.0)
    }

    fn drop_early(&mut self) -> bool {
        let p = self.modify_probability(self.base_probability());
        let u: f64 = self.rng.random();
        u <= p
    }
}

impl QueueDisc for RedQueueDisc {
    fn enqueue(&mut self, mut pkt: Packet, now: SimTime, drops: &mut Vec<Packet>) -> bool {
        let n_queued = self.fifo.len();
        self.estimate(n_queued, now);
        self.count = self.count.saturating_add(1);

        let RedParams {
            min_th,
            max_th,
            gentle,
            ..
        } = self.params;
        let mut verdict = None;
        if self.avg >= min_th && n_queued > 1 {
            let hard = if gentle { 2.0 * max_th } else { max_th };
            if self.avg >= hard {
                verdict = Some(RedDrop::Forced);
            } else if !self.old {
                // 刚越过 min_th：重新开始计数，本次不丢。
                self.old = true;
                self.count = 1;
            } else if self.drop_early() {
                verdict = Some(RedDrop::Early);
            }
        } else {
            self.old = false;
        }
        if n_queued >= self.limit_pkts as usize {
            verdict = Some(RedDrop::Forced);
        }

        match verdict {
            Some(RedDrop::Early) => {
                self.count = 0;
                self.early_drops += 1;
                drops.push(pkt);
                false
            }
            Some(RedDrop::Forced) => {
                self.forced_drops += 1;
                drops.push(pkt);
                false
            }
            None => {
                pkt.enqueued_at = now;
                self.fifo.push(pkt);
                true
            }
        }
    }

    fn dequeue(&mut self, now: SimTime, _drops: &mut Vec<Packet>) -> Option<Packet> {
        let pkt = self.fifo.pop();
        if pkt.is_none() {
            self.idle = true;
            self.idle_since = now;
        }
        pkt
    }

    fn len(&self) -> usize {
        self.fifo.len()
    }

    fn bytes(&self) -> u64 {
        self.fifo.bytes()
    }

    fn limit_pkts(&self) -> u32 {
        self.limit_pkts
    }

    fn kind(&self) -> QueueDiscKind {
        QueueDiscKind::Red
    }
}
