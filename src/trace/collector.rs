//! 测量收集器
//!
//! 把拥塞窗口、瓶颈队列长度、瓶颈丢包三个信号接到各自的文本文件，
//! 并可选地在源主机的访问设备上抓包。文件名为空的 trace 直接跳过。

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info};

use super::pcap::PcapWriter;
use super::stream::AsciiTraceStream;
use crate::error::TraceError;
use crate::net::{LinkId, Network, NodeId, TraceSource, TraceValue};
use crate::proto::tcp::TcpConnId;
use crate::sim::SimTime;

/// 输出文件名；空字符串表示不输出该 trace。
#[derive(Debug, Clone, Default)]
pub struct TraceFiles {
    pub cwnd: String,
    pub buf: String,
    pub drop: String,
    /// pcap 文件名前缀；None 表示不抓包
    pub pcap_prefix: Option<String>,
}

/// 被观测对象的显式引用，在连接回调时校验。
#[derive(Debug, Clone)]
pub struct TraceTargets {
    pub cwnd_conn: TcpConnId,
    pub queue_link: LinkId,
    /// 丢包行是否附带目的端口（多流实验）
    pub drop_with_port: bool,
    /// 需要抓包的设备：所在节点与其出链路
    pub pcap_devices: Vec<(NodeId, LinkId)>,
}

/// 运行结束时各输出写入的行数/记录数
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceTotals {
    pub cwnd_lines: Option<u64>,
    pub buf_lines: Option<u64>,
    pub drop_lines: Option<u64>,
    pub pcap_files: Vec<PathBuf>,
    pub pcap_records: u64,
}

type Shared<T> = Arc<Mutex<T>>;

#[derive(Debug, Default)]
pub struct MeasurementCollector {
    cwnd: Option<Shared<AsciiTraceStream>>,
    buf: Option<Shared<AsciiTraceStream>>,
    drop: Option<Shared<AsciiTraceStream>>,
    pcaps: Vec<Shared<PcapWriter>>,
}

impl MeasurementCollector {
    /// 校验所有引用后再创建文件并订阅信号。
    pub fn attach(
        net: &mut Network,
        targets: &TraceTargets,
        files: &TraceFiles,
    ) -> Result<Self, TraceError> {
        let mut sources = vec![
            TraceSource::CongestionWindow(targets.cwnd_conn),
            TraceSource::PacketsInQueue(targets.queue_link),
            TraceSource::Drop(targets.queue_link),
        ];
        if files.pcap_prefix.as_deref().is_some_and(|p| !p.is_empty()) {
            sources.extend(
                targets
                    .pcap_devices
                    .iter()
                    .map(|&(node, _)| TraceSource::NodeTx(node)),
            );
        }
        if let Some(bad) = sources.into_iter().find(|s| !net.has_trace_source(*s)) {
            return Err(TraceError::UnknownSource(bad));
        }

        let mut collector = MeasurementCollector::default();

        if let Some(stream) = open_stream("cwnd", &files.cwnd)? {
            net.trace_connect(
                TraceSource::CongestionWindow(targets.cwnd_conn),
                Box::new({
                    let stream = stream.clone();
                    move |now: SimTime, value: &TraceValue<'_>| {
                        if let TraceValue::Window { new, .. } = value {
                            stream
                                .lock()
                                .expect("trace stream lock")
                                .write_line(format_args!("{now}\t{new}"));
                        }
                    }
                }),
            )?;
            collector.cwnd = Some(stream);
        }

        if let Some(stream) = open_stream("buf", &files.buf)? {
            net.trace_connect(
                TraceSource::PacketsInQueue(targets.queue_link),
                Box::new({
                    let stream = stream.clone();
                    move |now: SimTime, value: &TraceValue<'_>| {
                        if let TraceValue::Count { new, .. } = value {
                            stream
                                .lock()
                                .expect("trace stream lock")
                                .write_line(format_args!("{now}\t{new}"));
                        }
                    }
                }),
            )?;
            collector.buf = Some(stream);
        }

        if let Some(stream) = open_stream("drop", &files.drop)? {
            let with_port = targets.drop_with_port;
            net.trace_connect(
                TraceSource::Drop(targets.queue_link),
                Box::new({
                    let stream = stream.clone();
                    move |now: SimTime, value: &TraceValue<'_>| {
                        let TraceValue::Packet(pkt) = value else {
                            return;
                        };
                        let mut s = stream.lock().expect("trace stream lock");
                        let seq = pkt.tcp.header_seq();
                        if with_port {
                            s.write_line(format_args!("{now}\t{seq}\t{}", pkt.dst_port));
                        } else {
                            s.write_line(format_args!("{now}\t{seq}"));
                        }
                    }
                }),
            )?;
            collector.drop = Some(stream);
        }

        match files.pcap_prefix.as_deref() {
            Some("") => debug!("No pcap file name provided"),
            Some(prefix) => collector.open_pcaps(net, targets, prefix)?,
            None => {}
        }

        Ok(collector)
    }

    fn open_pcaps(
        &mut self,
        net: &mut Network,
        targets: &TraceTargets,
        prefix: &str,
    ) -> Result<(), TraceError> {
        for &(node, link) in &targets.pcap_devices {
            let device = net.link(link).map_or(0, |l| l.device_index);
            let path = format!("{prefix}-{}-{device}.pcap", node.0);
            let writer = Arc::new(Mutex::new(PcapWriter::create(&path)?));
            for source in [TraceSource::NodeTx(node), TraceSource::NodeRx(node)] {
                let writer = writer.clone();
                net.trace_connect(
                    source,
                    Box::new(move |now: SimTime, value: &TraceValue<'_>| {
                        if let TraceValue::Packet(pkt) = value {
                            writer
                                .lock()
                                .expect("pcap writer lock")
                                .write_packet(now, pkt);
                        }
                    }),
                )?;
            }
            info!(%path, ?node, "📼 启用 pcap 抓包");
            self.pcaps.push(writer);
        }
        Ok(())
    }

    /// 刷新所有输出，返回每个输出的写入量；遇到的第一个 I/O 错误会被返回。
    pub fn finish(self) -> Result<TraceTotals, TraceError> {
        let mut totals = TraceTotals {
            cwnd_lines: finish_stream(self.cwnd)?,
            buf_lines: finish_stream(self.buf)?,
            drop_lines: finish_stream(self.drop)?,
            ..TraceTotals::default()
        };
        for writer in self.pcaps {
            let mut w = writer.lock().expect("pcap writer lock");
            totals.pcap_records += w.finish()?;
            totals.pcap_files.push(w.path().to_path_buf());
        }
        Ok(totals)
    }
}

fn open_stream(what: &str, file: &str) -> Result<Option<Shared<AsciiTraceStream>>, TraceError> {
    if file.is_empty() {
        debug!("No trace file for {what} provided");
        return Ok(None);
    }
    let stream = AsciiTraceStream::create(file)?;
    info!(path = %file, "📝 输出 {what} trace");
    Ok(Some(Arc::new(Mutex::new(stream))))
}

fn finish_stream(stream: Option<Shared<AsciiTraceStream>>) -> Result<Option<u64>, TraceError> {
    let Some(stream) = stream else {
        return Ok(None);
    };
    let mut s = stream.lock().expect("trace stream lock");
    s.finish().map(Some)
}
