//! 网络世界实现

use super::network::Network;
use crate::sim::World;
use std::any::Any;

/// 默认的网络世界实现：持有 Network（包括协议栈与 trace 订阅）。
#[derive(Default)]
pub struct NetWorld {
    pub net: Network,
}

impl NetWorld {
    /// 从 `dyn World` 中取回 `NetWorld`；事件只会在 `NetWorld` 中运行。
    pub(crate) fn downcast(world: &mut dyn World) -> &mut NetWorld {
        world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld")
    }
}

impl World for NetWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
