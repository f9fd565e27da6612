//! 应用层
//!
//! 批量发送（BulkSend）与接收端（PacketSink），都通过启停事件驱动 TCP 连接。

mod bulk_send;
mod packet_sink;

pub use bulk_send::{BulkSend, BulkSendStart, BulkSendStop};
pub use packet_sink::{PacketSink, SinkStart, SinkStop};
