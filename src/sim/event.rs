//! 事件 trait

use super::simulator::Simulator;
use super::world::World;

/// 事件：可被调度执行。`self: Box<Self>` 允许事件在执行时交出所携带数据的所有权。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);
}
