//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列。

use super::event::Event;
use super::time::SimTime;
use super::world::World;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info, trace};

/// 调度事件，包含执行时间、序列号和事件对象。
struct ScheduledEvent {
    at: SimTime,
    seq: u64,
    ev: Box<dyn Event>,
}

// BinaryHeap 是 max-heap；需要最小时间优先（同一时刻按调度顺序），因此反向比较。
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
            .reverse()
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

/// 一次运行的结果摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub events: u64,
    pub final_time: SimTime,
}

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    executed: u64,
    q: BinaryHeap<ScheduledEvent>,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 已执行的事件总数
    pub fn events_executed(&self) -> u64 {
        self.executed
    }

    /// 尚未执行的事件数
    pub fn pending(&self) -> usize {
        self.q.len()
    }

    /// 调度事件在指定时间执行。早于当前时间的请求会被钳制到当前时间。
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) {
        let at = at.max(self.now);
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        trace!(now = ?self.now, ?at, seq, event_type = std::any::type_name::<E>(), "调度事件");
        self.q.push(ScheduledEvent {
            at,
            seq,
            ev: Box::new(ev),
        });
    }

    /// 在 `delay` 之后执行事件。
    pub fn schedule_in<E: Event>(&mut self, delay: SimTime, ev: E) {
        let at = self.now.saturating_add(delay);
        self.schedule(at, ev);
    }

    /// 运行直到事件队列为空或到达 `until`（时间戳等于 `until` 的事件仍会执行）。
    #[tracing::instrument(skip(self, world))]
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) -> RunSummary {
        info!(now = ?self.now, queue_size = self.q.len(), "▶️  开始运行仿真");

        let start_count = self.executed;
        while let Some(top) = self.q.peek() {
            if top.at > until {
                break;
            }
            let Some(item) = self.q.pop() else {
                break;
            };
            self.now = item.at;
            self.executed += 1;
            item.ev.execute(self, world);
            world.on_tick(self);
        }
        if until != SimTime::MAX {
            self.now = self.now.max(until);
        }

        let summary = RunSummary {
            events: self.executed - start_count,
            final_time: self.now,
        };
        debug!(remaining = self.q.len(), "剩余未执行事件");
        info!(
            total_events = summary.events,
            final_time = ?summary.final_time,
            "✅ 仿真完成"
        );
        summary
    }

    /// 运行所有事件直到队列为空。
    pub fn run(&mut self, world: &mut dyn World) -> RunSummary {
        self.run_until(SimTime::MAX, world)
    }
}
