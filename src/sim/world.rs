//! 世界 trait

use super::simulator::Simulator;
use std::any::Any;

/// 仿真世界：由业务层实现（例如网络拓扑、协议栈、trace 订阅）。
pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// 每个事件执行完成后回调。
    fn on_tick(&mut self, _sim: &mut Simulator) {}
}
