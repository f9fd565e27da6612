//! 全局路由
//!
//! 按最短跳数为每个 (from, dst) 预计算下一跳。拓扑变化后标记为 dirty，
//! 下一次查询前重新计算。等价路径中取邻接表里最先出现的一条，保证确定性。

use std::collections::{HashMap, VecDeque};

use super::id::NodeId;

#[derive(Debug, Default, Clone)]
pub struct RoutingTable {
    dirty: bool,
    next_hop: HashMap<(NodeId, NodeId), NodeId>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self {
            dirty: true,
            next_hop: HashMap::new(),
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 确保路由表基于当前拓扑是最新的。
    ///
    /// `adj[from]` 为从 `from` 出发的所有出边邻居；
    /// `rev_adj[to]` 为所有能到达 `to` 的前驱节点集合。
    pub fn ensure_built(&mut self, adj: &[Vec<NodeId>], rev_adj: &[Vec<NodeId>]) {
        if !self.dirty {
            return;
        }

        let n = adj.len();
        self.next_hop.clear();

        // 对每个 dst 在反向图上做 BFS，得到到 dst 的最短跳数 dist[*]，
        // 然后对每个 from 选出满足 dist[next] = dist[from] - 1 的第一个邻居。
        let mut dist: Vec<usize> = vec![usize::MAX; n];
        let mut q: VecDeque<NodeId> = VecDeque::new();

        for dst_idx in 0..n {
            dist.fill(usize::MAX);
            q.clear();

            dist[dst_idx] = 0;
            q.push_back(NodeId(dst_idx));

            while let Some(v) = q.pop_front() {
                let dv = dist[v.0];
                for &pred in &rev_adj[v.0] {
                    if dist[pred.0] == usize::MAX {
                        dist[pred.0] = dv + 1;
                        q.push_back(pred);
                    }
                }
            }

            for from_idx in 0..n {
                let df = dist[from_idx];
                if from_idx == dst_idx || df == usize::MAX {
                    continue;
                }
                if let Some(&nh) = adj[from_idx].iter().find(|nh| dist[nh.0] == df - 1) {
                    self.next_hop.insert((NodeId(from_idx), NodeId(dst_idx)), nh);
                }
            }
        }

        self.dirty = false;
    }

    /// 获取 (from, dst) 的下一跳。
    pub fn next_hop(&self, from: NodeId, dst: NodeId) -> Option<NodeId> {
        self.next_hop.get(&(from, dst)).copied()
    }
}
