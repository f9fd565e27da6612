//! 尾丢弃 FIFO
//!
//! 队列已满（包数达到上限）时直接丢弃新到达的 packet。

use std::collections::VecDeque;

use crate::net::Packet;
use crate::sim::SimTime;

use super::{QueueDisc, QueueDiscKind};

#[derive(Debug)]
pub struct FifoQueueDisc {
    limit_pkts: u32,
    cur_bytes: u64,
    q: VecDeque<Packet>,
}

impl FifoQueueDisc {
    pub fn new(limit_pkts: u32) -> Self {
        Self {
            limit_pkts,
            cur_bytes: 0,
            q: VecDeque::new(),
        }
    }
}

impl QueueDisc for FifoQueueDisc {
    fn enqueue(&mut self, mut pkt: Packet, now: SimTime, drops: &mut Vec<Packet>) -> bool {
        if self.q.len() >= self.limit_pkts as usize {
            drops.push(pkt);
            return false;
        }
        pkt.enqueued_at = now;
        self.cur_bytes = self.cur_bytes.saturating_add(pkt.size_bytes as u64);
        self.q.push_back(pkt);
        true
    }

    fn dequeue(&mut self, _now: SimTime, _drops: &mut Vec<Packet>) -> Option<Packet> {
        let pkt = self.q.pop_front()?;
        self.cur_bytes = self.cur_bytes.saturating_sub(pkt.size_bytes as u64);
        Some(pkt)
    }

    fn len(&self) -> usize {
        self.q.len()
    }

    fn bytes(&self) -> u64 {
        self.cur_bytes
    }

    fn limit_pkts(&self) -> u32 {
        self.limit_pkts
    }

    fn kind(&self) -> QueueDiscKind {
        QueueDiscKind::PfifoFast
    }
}
