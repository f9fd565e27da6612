use std::fs;

use super::support::{data_pkt, parse_trace, unique_temp_dir};
use crate::error::TraceError;
use crate::net::{NetWorld, TraceSource};
use crate::proto::tcp::{TcpConfig, TcpConn};
use crate::queue::{QueueDiscConfig, QueueDiscKind, RedParams};
use crate::sim::SimTime;
use crate::topo::dumbbell::{Dumbbell, DumbbellOpts, build_dumbbell};
use crate::trace::{
    AsciiTraceStream, MeasurementCollector, PCAP_LINKTYPE_PPP, PcapWriter, TraceFiles,
    TraceTargets,
};

fn small_dumbbell(world: &mut NetWorld) -> Dumbbell {
    let opts = DumbbellOpts {
        flows: 1,
        access_bps: 6_000_000,
        access_delay: SimTime::from_millis(25),
        bottleneck_bps: 2_000_000,
        bottleneck_delay: SimTime::from_millis(25),
        device_queue_pkts: 10,
        bottleneck: QueueDiscConfig::new(QueueDiscKind::CoDel, 125, RedParams::default(), 1)
            .expect("valid"),
    };
    build_dumbbell(&mut world.net, &opts).expect("build")
}

fn targets(topo: &Dumbbell, cwnd_conn: u64) -> TraceTargets {
    TraceTargets {
        cwnd_conn,
        queue_link: topo.bottleneck,
        drop_with_port: false,
        pcap_devices: vec![(topo.sources[0], topo.access_links[0].0)],
    }
}

#[test]
fn unknown_cwnd_source_fails_before_any_file_is_created() {
    let dir = unique_temp_dir("unknown-src");
    let mut world = NetWorld::default();
    let topo = small_dumbbell(&mut world);

    let files = TraceFiles {
        cwnd: dir.join("cwnd.tr").display().to_string(),
        buf: dir.join("buf.tr").display().to_string(),
        drop: dir.join("drop.tr").display().to_string(),
        pcap_prefix: Some(dir.join("cap").display().to_string()),
    };
    // 还没有安装任何 TCP 连接
    let err = MeasurementCollector::attach(&mut world.net, &targets(&topo, 0), &files)
        .expect_err("no connection 0");
    assert!(matches!(
        err,
        TraceError::UnknownSource(TraceSource::CongestionWindow(0))
    ));
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
}

#[test]
fn empty_file_names_disable_outputs() {
    let dir = unique_temp_dir("empty-names");
    let mut world = NetWorld::default();
    let topo = small_dumbbell(&mut world);

    world.net.tcp.insert(TcpConn::new(
        0,
        (topo.sources[0], 49153),
        (topo.sink, 50000),
        None,
        TcpConfig::default(),
    ));
    let t = targets(&topo, 0);

    let collector =
        MeasurementCollector::attach(&mut world.net, &t, &TraceFiles::default()).expect("attach");
    let totals = collector.finish().expect("finish");
    assert_eq!(totals.cwnd_lines, None);
    assert_eq!(totals.buf_lines, None);
    assert_eq!(totals.drop_lines, None);
    assert!(totals.pcap_files.is_empty());
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
}

#[test]
fn empty_pcap_prefix_captures_nothing() {
    let mut world = NetWorld::default();
    let topo = small_dumbbell(&mut world);
    world.net.tcp.insert(TcpConn::new(
        0,
        (topo.sources[0], 49153),
        (topo.sink, 50000),
        None,
        TcpConfig::default(),
    ));
    let t = targets(&topo, 0);

    let files = TraceFiles {
        pcap_prefix: Some(String::new()),
        ..TraceFiles::default()
    };
    let collector = MeasurementCollector::attach(&mut world.net, &t, &files).expect("attach");
    let totals = collector.finish().expect("finish");
    assert!(totals.pcap_files.is_empty());
    assert_eq!(totals.pcap_records, 0);
}

#[test]
fn ascii_stream_counts_lines() {
    let dir = unique_temp_dir("ascii");
    let path = dir.join("x.tr");
    let mut s = AsciiTraceStream::create(&path).expect("create");
    s.write_line(format_args!("{}\t{}", SimTime::from_millis(100), 14480));
    s.write_line(format_args!("{}\t{}", SimTime::from_millis(1500), 2896));
    assert_eq!(s.lines(), 2);
    assert_eq!(s.finish().expect("finish"), 2);

    let raw = fs::read_to_string(&path).unwrap();
    assert_eq!(raw, "0.1\t14480\n1.5\t2896\n");
    assert_eq!(
        parse_trace(&raw),
        vec![(0.1, vec![14480]), (1.5, vec![2896])]
    );
}

#[test]
fn ascii_stream_reports_unwritable_path() {
    let dir = unique_temp_dir("ascii-bad");
    let err = AsciiTraceStream::create(dir.join("missing").join("x.tr")).expect_err("no dir");
    assert!(matches!(err, TraceError::Create { .. }));
}

#[test]
fn pcap_header_and_record_layout() {
    let dir = unique_temp_dir("pcap");
    let path = dir.join("cap-1-1.pcap");
    let mut w = PcapWriter::create(&path).expect("create");
    let pkt = data_pkt(3, 1500, 49153, 50000);
    w.write_packet(SimTime(2_500_123_456), &pkt);
    assert_eq!(w.records(), 1);
    assert_eq!(w.finish().expect("finish"), 1);

    let bytes = fs::read(&path).unwrap();
    let le32 = |off: usize| u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
    let be16 = |off: usize| u16::from_be_bytes(bytes[off..off + 2].try_into().unwrap());

    assert_eq!(le32(0), 0xa1b2_c3d4);
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 2);
    assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), 4);
    assert_eq!(le32(16), 65_535);
    assert_eq!(le32(20), PCAP_LINKTYPE_PPP);

    // 记录头
    assert_eq!(le32(24), 2);
    assert_eq!(le32(28), 500_123);
    assert_eq!(le32(32), 42);
    assert_eq!(le32(36), 1502);
    assert_eq!(bytes.len(), 24 + 16 + 42);

    let frame = &bytes[40..];
    assert_eq!(be16(40), 0x0021);
    let ip = &frame[2..22];
    assert_eq!(ip[0], 0x45);
    assert_eq!(u16::from_be_bytes([ip[2], ip[3]]), 1500);
    assert_eq!(ip[9], 6);
    assert_eq!(&ip[12..16], &[10, 0, 1, 1]);
    assert_eq!(&ip[16..20], &[10, 0, 2, 2]);
    assert_eq!(ones_complement_sum(ip), 0xffff);

    let tcp = &frame[22..42];
    assert_eq!(u16::from_be_bytes([tcp[0], tcp[1]]), 49153);
    assert_eq!(u16::from_be_bytes([tcp[2], tcp[3]]), 50000);
    assert_eq!(
        u32::from_be_bytes([tcp[4], tcp[5], tcp[6], tcp[7]]),
        3 * 1460
    );
}

fn ones_complement_sum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]) as u32)
        .sum();
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}
