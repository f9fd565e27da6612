//! 瓶颈排队策略配置：四选一，每种带各自的参数。

use crate::error::ConfigError;

use super::{
    CoDelParams, CoDelQueueDisc, FifoQueueDisc, FqCoDelParams, FqCoDelQueueDisc, QueueDisc,
    QueueDiscKind, RedParams, RedQueueDisc,
};

#[derive(Debug, Clone)]
pub enum QueueDiscConfig {
    PfifoFast { limit_pkts: u32 },
    CoDel { limit_pkts: u32, params: CoDelParams },
    Red { limit_pkts: u32, params: RedParams },
    FqCoDel { limit_pkts: u32, params: FqCoDelParams },
}

impl QueueDiscConfig {
    /// 按种类选择配置路径；`red` 只在 RED 下使用，`seed` 同时用作 FQ-CoDel 的哈希扰动。
    pub fn new(
        kind: QueueDiscKind,
        limit_pkts: u32,
        red: RedParams,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        if limit_pkts == 0 {
            return Err(ConfigError::Zero {
                what: "queue disc size",
            });
        }
        let cfg = match kind {
            QueueDiscKind::PfifoFast => QueueDiscConfig::PfifoFast { limit_pkts },
            QueueDiscKind::CoDel => QueueDiscConfig::CoDel {
                limit_pkts,
                params: CoDelParams::default(),
            },
            QueueDiscKind::Red => {
                red.validate()?;
                QueueDiscConfig::Red {
                    limit_pkts,
                    params: red,
                }
            }
            QueueDiscKind::FqCoDel => QueueDiscConfig::FqCoDel {
                limit_pkts,
                params: FqCoDelParams {
                    perturbation: seed,
                    ..FqCoDelParams::default()
                },
            },
        };
        Ok(cfg)
    }

    pub fn kind(&self) -> QueueDiscKind {
        match self {
            QueueDiscConfig::PfifoFast { .. } => QueueDiscKind::PfifoFast,
            QueueDiscConfig::CoDel { .. } => QueueDiscKind::CoDel,
            QueueDiscConfig::Red { .. } => QueueDiscKind::Red,
            QueueDiscConfig::FqCoDel { .. } => QueueDiscKind::FqCoDel,
        }
    }

    pub fn limit_pkts(&self) -> u32 {
        match *self {
            QueueDiscConfig::PfifoFast { limit_pkts }
            | QueueDiscConfig::CoDel { limit_pkts, .. }
            | QueueDiscConfig::Red { limit_pkts, .. }
            | QueueDiscConfig::FqCoDel { limit_pkts, .. } => limit_pkts,
        }
    }

    /// 构造一个新的队列实例（每个方向各一份）。
    pub fn build(&self) -> Box<dyn QueueDisc> {
        match self {
            QueueDiscConfig::PfifoFast { limit_pkts } => Box::new(FifoQueueDisc::new(*limit_pkts)),
            QueueDiscConfig::CoDel { limit_pkts, params } => {
                Box::new(CoDelQueueDisc::new(*limit_pkts, params.clone()))
            }
            QueueDiscConfig::Red { limit_pkts, params } => {
                Box::new(RedQueueDisc::new(*limit_pkts, params.clone()))
            }
            QueueDiscConfig::FqCoDel { limit_pkts, params } => {
                Box::new(FqCoDelQueueDisc::new(*limit_pkts, params.clone()))
            }
        }
    }
}
