//! CoDel（Controlled Delay）
//!
//! 出队时测量每个包的逗留时间：逗留时间持续超过 `target` 达一个 `interval`
//! 后进入丢包状态，之后按 `interval / sqrt(count)` 的节奏继续丢包，
//! 直到逗留时间回落到 `target` 以下。

use std::collections::VecDeque;

use crate::net::Packet;
use crate::sim::SimTime;

use super::{QueueDisc, QueueDiscKind};

#[derive(Debug, Clone)]
pub struct CoDelParams {
    /// 可接受的最小逗留时间
    pub target: SimTime,
    /// 观察窗口
    pub interval: SimTime,
    /// 队列字节数低于该值时不判定为拥塞（一个 MTU）
    pub min_bytes: u64,
}

impl Default for CoDelParams {
    fn default() -> Self {
        Self {
            target: SimTime::from_millis(5),
            interval: SimTime::from_millis(100),
            min_bytes: 1500,
        }
    }
}

/// 按到达顺序保存的包及其总字节数。
#[derive(Debug, Default)]
pub(crate) struct PacketFifo {
    q: VecDeque<Packet>,
    bytes: u64,
}

impl PacketFifo {
    pub(crate) fn push(&mut self, pkt: Packet) {
        self.bytes = self.bytes.saturating_add(pkt.size_bytes as u64);
        self.q.push_back(pkt);
    }

    pub(crate) fn pop(&mut self) -> Option<Packet> {
        let pkt = self.q.pop_front()?;
        self.bytes = self.bytes.saturating_sub(pkt.size_bytes as u64);
        Some(pkt)
    }

    pub(crate) fn len(&self) -> usize {
        self.q.len()
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// CoDel 控制状态，与包存储分离，FQ-CoDel 为每个子流持有一份。
#[derive(Debug, Clone, Default)]
pub struct CoDelState {
    count: u32,
    last_count: u32,
    dropping: bool,
    first_above_time: Option<SimTime>,
    drop_next: SimTime,
    drops: u64,
}

impl CoDelState {
    pub fn is_dropping(&self) -> bool {
        self.dropping
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// 该状态机累计丢弃的包数
    pub fn drops(&self) -> u64 {
        self.drops
    }

    fn control_law(&self, t: SimTime, interval: SimTime) -> SimTime {
        let step = interval.0 as f64 / (self.count.max(1) as f64).sqrt();
        t.saturating_add(SimTime(step as u64))
    }

    /// 取出队头，并判断该包是否满足丢弃条件。
    fn take(
        &mut self,
        fifo: &mut PacketFifo,
        now: SimTime,
        params: &CoDelParams,
    ) -> (Option<Packet>, bool) {
        let Some(pkt) = fifo.pop() else {
            self.first_above_time = None;
            return (None, false);
        };
        let sojourn = now.saturating_sub(pkt.enqueued_at);
        let mut ok_to_drop = false;
        if sojourn < params.target || fifo.bytes() < params.min_bytes {
            self.first_above_time = None;
        } else {
            match self.first_above_time {
                None => self.first_above_time = Some(now.saturating_add(params.interval)),
                Some(t) if now >= t => ok_to_drop = true,
                Some(_) => {}
            }
        }
        (Some(pkt), ok_to_drop)
    }

    pub(crate) fn dequeue(
        &mut self,
        fifo: &mut PacketFifo,
        now: SimTime,
        params: &CoDelParams,
        drops: &mut Vec<Packet>,
    ) -> Option<Packet> {
        let (mut pkt, ok_to_drop) = self.take(fifo, now, params);
        if pkt.is_none() {
            self.dropping = false;
            return None;
        }

        if self.dropping {
            if !ok_to_drop {
                self.dropping = false;
            }
            while self.dropping && now >= self.drop_next {
                if let Some(p) = pkt.take() {
                    drops.push(p);
                    self.drops += 1;
                }
                self.count = self.count.saturating_add(1);
                let (next, next_ok) = self.take(fifo, now, params);
                pkt = next;
                if next_ok {
                    self.drop_next = self.control_law(self.drop_next, params.interval);
                } else {
                    self.dropping = false;
                }
            }
        } else if ok_to_drop {
            if let Some(p) = pkt.take() {
                drops.push(p);
                self.drops += 1;
            }
            let (next, _) = self.take(fifo, now, params);
            pkt = next;
            self.dropping = true;

            // 若距上一次丢包周期不久，沿用上一周期的丢包率作为起点。
            let delta = self.count.saturating_sub(self.last_count);
            let recent = now.saturating_sub(self.drop_next).0 < params.interval.0.saturating_mul(16);
            self.count = if delta > 1 && recent { delta } else { 1 };
            self.last_count = self.count;
            self.drop_next = self.control_law(now, params.interval);
        }
        pkt
    }
}

#[derive(Debug)]
pub struct CoDelQueueDisc {
    limit_pkts: u32,
    params: CoDelParams,
    fifo: PacketFifo,
    state: CoDelState,
}

impl CoDelQueueDisc {
    pub fn new(limit_pkts: u32, params: CoDelParams) -> Self {
        Self {
            limit_pkts,
            params,
            fifo: PacketFifo::default(),
            state: CoDelState::default(),
        }
    }

    pub fn state(&self) -> &CoDelState {
        &self.state
    }
}

impl QueueDisc for CoDelQueueDisc {
    fn enqueue(&mut self, mut pkt: Packet, now: SimTime, drops: &mut Vec<Packet>) -> bool {
        if self.fifo.len() >= self.limit_pkts as usize {
            drops.push(pkt);
            return false;
        }
        pkt.enqueued_at = now;
        self.fifo.push(pkt);
        true
    }

    fn dequeue(&mut self, now: SimTime, drops: &mut Vec<Packet>) -> Option<Packet> {
        self.state.dequeue(&mut self.fifo, now, &self.params, drops)
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
        QueueDiscKind::CoDel
    }
}
