//! 测量输出
//!
//! 文本 trace（`时间\t值`）、pcap 抓包，以及把它们挂到网络 trace 信号上的收集器。

mod collector;
mod pcap;
mod stream;

pub use collector::{MeasurementCollector, TraceFiles, TraceTargets, TraceTotals};
pub use pcap::{PCAP_LINKTYPE_PPP, PcapWriter};
pub use stream::AsciiTraceStream;
