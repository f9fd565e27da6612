use std::fs;
use std::path::Path;

use super::support::{parse_trace, unique_temp_dir};
use crate::proto::tcp::TcpVariant;
use crate::queue::{QueueDiscConfig, QueueDiscKind, RedWeight};
use crate::scenario::{
    MultiFlowArgs, SINK_BASE_PORT, ScenarioArgs, ScenarioParams, ScenarioReport, run_scenario,
};
use crate::sim::SimTime;

fn in_dir(dir: &Path, name: &str) -> String {
    dir.join(name).display().to_string()
}

/// 短时、小队列的单流场景，保证出现丢包。
fn short_single_flow(dir: &Path) -> ScenarioParams {
    ScenarioParams {
        queue_disc_type: "PfifoFast".to_string(),
        queue_disc_size: 20,
        sim_duration: 3.0,
        drain_time: 0.5,
        pcap_file_name: in_dir(dir, "cap"),
        cwnd_tr_file_name: in_dir(dir, "cwnd.tr"),
        buf_tr_file_name: in_dir(dir, "buf.tr"),
        drop_tr_file_name: in_dir(dir, "drop.tr"),
        ..ScenarioParams::single_flow()
    }
}

fn short_multi_flow(dir: &Path) -> ScenarioParams {
    ScenarioParams {
        bottleneck_bandwidth: "2Mbps".to_string(),
        queue_disc_type: "PfifoFast".to_string(),
        queue_disc_size: 20,
        sim_duration: 3.0,
        flow_stagger: 0.5,
        drain_time: 0.5,
        is_pcap_enabled: false,
        cwnd_tr_file_name: in_dir(dir, "cwnd.tr"),
        buf_tr_file_name: in_dir(dir, "buf.tr"),
        drop_tr_file_name: in_dir(dir, "drop.tr"),
        ..ScenarioParams::multi_flow()
    }
}

fn run(params: &ScenarioParams) -> ScenarioReport {
    let cfg = params.validate().expect("valid params");
    run_scenario(&cfg).expect("run")
}

#[test]
fn single_flow_defaults_validate() {
    let cfg = ScenarioParams::single_flow().validate().expect("defaults");
    assert_eq!(cfg.stop_time, SimTime::from_secs_f64(60.1));
    assert_eq!(cfg.flows.len(), 1);
    assert_eq!(cfg.flows[0].start, SimTime::ZERO);
    assert_eq!(cfg.flows[0].stop, SimTime::from_secs_f64(57.1));
    assert_eq!(cfg.flows[0].sink_port, SINK_BASE_PORT);
    assert_eq!(cfg.tcp.variant, TcpVariant::NewReno);
    assert_eq!(cfg.tcp.segment_size, 1458);
    assert_eq!(cfg.topology.bottleneck.kind(), QueueDiscKind::CoDel);
    assert_eq!(cfg.topology.bottleneck.limit_pkts(), 125);
    assert_eq!(cfg.topology.bottleneck_bps, 2_000_000);
    assert_eq!(cfg.topology.access_bps, 6_000_000);
    assert_eq!(cfg.topology.device_queue_pkts, 10);
    assert_eq!(cfg.traces.cwnd, "CD-bw2Mb-b125p-cwn.tr");
    assert_eq!(cfg.traces.drop, "");
    assert_eq!(cfg.traces.pcap_prefix.as_deref(), Some("CD-bw2Mb-b125p"));
}

#[test]
fn multi_flow_defaults_stagger_starts() {
    let cfg = ScenarioParams::multi_flow().validate().expect("defaults");
    let starts: Vec<_> = cfg.flows.iter().map(|f| f.start).collect();
    assert_eq!(
        starts,
        vec![SimTime::ZERO, SimTime::from_secs(60), SimTime::from_secs(120)]
    );
    assert!(cfg.flows.iter().all(|f| f.stop == SimTime::from_secs_f64(177.1)));
    let ports: Vec<_> = cfg.flows.iter().map(|f| f.sink_port).collect();
    assert_eq!(ports, vec![50000, 50001, 50002]);
    assert_eq!(cfg.tcp.variant, TcpVariant::LinuxReno);
    assert_eq!(cfg.topology.bottleneck.kind(), QueueDiscKind::FqCoDel);
    assert_eq!(cfg.topology.bottleneck.limit_pkts(), 4500);
    assert!(cfg.drop_with_port);
}

#[test]
fn cli_overrides_apply_on_top_of_defaults() {
    let args = ScenarioArgs {
        queue_disc_type: Some("RED".to_string()),
        red_min_th: Some(10.0),
        red_max_th: Some(30.0),
        drop_tr_file_name: Some("x-drp.tr".to_string()),
        ..ScenarioArgs::default()
    };
    let multi = MultiFlowArgs {
        flows: Some(5),
        cwnd_flow: Some(4),
        ..MultiFlowArgs::default()
    };
    let p = multi.apply(args.apply(ScenarioParams::multi_flow()));
    assert_eq!(p.bottleneck_bandwidth, "9Mbps");
    let cfg = p.validate().expect("valid");
    assert_eq!(cfg.topology.bottleneck.kind(), QueueDiscKind::Red);
    assert_eq!(cfg.flows.len(), 5);
    assert_eq!(cfg.cwnd_flow, 4);
    assert_eq!(cfg.traces.drop, "x-drp.tr");
}

#[test]
fn invalid_params_are_rejected() {
    let bad_qdisc = ScenarioParams {
        queue_disc_type: "Fifo".to_string(),
        ..ScenarioParams::single_flow()
    };
    let err = bad_qdisc.validate().unwrap_err();
    assert!(err.to_string().contains("invalid queue disc type"));

    let bad_flow = ScenarioParams {
        cwnd_flow: 3,
        ..ScenarioParams::multi_flow()
    };
    let err = bad_flow.validate().unwrap_err();
    assert!(err.to_string().contains("flow index 3 is out of range"));

    let bad_red = ScenarioParams {
        queue_disc_type: "RED".to_string(),
        red_min_th: 20.0,
        red_max_th: 10.0,
        ..ScenarioParams::single_flow()
    };
    assert!(bad_red.validate().unwrap_err().to_string().contains("RED thresholds"));

    let bad_rate = ScenarioParams {
        bottleneck_bandwidth: "fast".to_string(),
        ..ScenarioParams::single_flow()
    };
    assert!(bad_rate.validate().is_err());

    let bad_tcp = ScenarioParams {
        tcp_type_id: "ns3::TcpVegas".to_string(),
        ..ScenarioParams::single_flow()
    };
    assert!(bad_tcp.validate().is_err());

    let zero_duration = ScenarioParams {
        sim_duration: 0.0,
        ..ScenarioParams::single_flow()
    };
    assert!(zero_duration.validate().is_err());
}

#[test]
fn red_weight_code_reaches_queue_config() {
    let args = ScenarioArgs {
        queue_disc_type: Some("RED".to_string()),
        red_q_w: Some(-2.0),
        bottleneck_delay: Some("40ms".to_string()),
        ..ScenarioArgs::default()
    };
    let cfg = args
        .apply(ScenarioParams::single_flow())
        .validate()
        .expect("valid");
    let QueueDiscConfig::Red { params, .. } = &cfg.topology.bottleneck else {
        panic!("expected RED, got {:?}", cfg.topology.bottleneck);
    };
    assert_eq!(params.weight, RedWeight::FromRtt);
    assert_eq!(params.link_delay, SimTime::from_millis(40));
    assert_eq!(params.link_bandwidth_bps, 2_000_000);
    assert_eq!(params.mean_pkt_size, 1458);

    let bad = ScenarioParams {
        queue_disc_type: "RED".to_string(),
        red_q_w: -4.0,
        ..ScenarioParams::single_flow()
    };
    assert!(
        bad.validate()
            .unwrap_err()
            .to_string()
            .contains("invalid RED queue weight")
    );
}

#[test]
fn red_thresholds_are_ignored_for_other_disciplines() {
    let p = ScenarioParams {
        red_min_th: 20.0,
        red_max_th: 10.0,
        ..ScenarioParams::single_flow()
    };
    assert!(p.validate().is_ok());
}

#[test]
fn single_flow_run_writes_ordered_traces() {
    let dir = unique_temp_dir("single-run");
    let report = run(&short_single_flow(&dir));

    assert_eq!(report.flows.len(), 1);
    let flow = &report.flows[0];
    assert!(flow.bytes_acked > 0);
    assert!(flow.sink_rx_bytes >= flow.bytes_acked);
    assert!(report.bottleneck.drops > 0);
    assert_eq!(report.traces.drop_lines, Some(report.bottleneck.drops));

    for name in ["cwnd.tr", "buf.tr", "drop.tr"] {
        let raw = fs::read_to_string(dir.join(name)).expect(name);
        let rows = parse_trace(&raw);
        assert!(!rows.is_empty(), "{name} is empty");
        assert!(
            rows.windows(2).all(|w| w[0].0 <= w[1].0),
            "{name} timestamps go backwards"
        );
        assert!(rows.iter().all(|(t, cols)| *t <= 3.1 && cols.len() == 1));
    }

    // 队列长度不超过瓶颈容量
    let buf = parse_trace(&fs::read_to_string(dir.join("buf.tr")).unwrap());
    assert!(buf.iter().all(|(_, c)| c[0] <= 20));

    let pcap = dir.join("cap-1-1.pcap");
    assert!(pcap.exists());
    assert_eq!(report.traces.pcap_files, vec![pcap]);
    assert!(report.traces.pcap_records > 0);
}

#[test]
fn reruns_are_byte_identical() {
    let a = unique_temp_dir("rerun-a");
    let b = unique_temp_dir("rerun-b");
    for dir in [&a, &b] {
        let p = ScenarioParams {
            queue_disc_type: "RED".to_string(),
            queue_disc_size: 30,
            ..short_single_flow(dir)
        };
        run(&p);
    }
    for name in ["cwnd.tr", "buf.tr", "drop.tr", "cap-1-1.pcap"] {
        let x = fs::read(a.join(name)).expect(name);
        let y = fs::read(b.join(name)).expect(name);
        assert_eq!(x, y, "{name} differs between runs");
    }
}

#[test]
fn multi_flow_drop_lines_carry_destination_port() {
    let dir = unique_temp_dir("multi-run");
    let report = run(&short_multi_flow(&dir));
    assert_eq!(report.flows.len(), 3);
    assert!(report.flows.iter().all(|f| f.bytes_acked > 0));

    let raw = fs::read_to_string(dir.join("drop.tr")).unwrap();
    let rows = parse_trace(&raw);
    assert!(!rows.is_empty());
    for (_, cols) in &rows {
        assert_eq!(cols.len(), 2);
        assert!((50000..50003).contains(&cols[1]), "port {}", cols[1]);
    }
    assert!(!dir.join("cap-1-1.pcap").exists());
}

#[test]
fn summary_json_is_written() {
    let dir = unique_temp_dir("summary");
    let p = ScenarioParams {
        queue_disc_type: "FqCoDel".to_string(),
        summary_json: Some(dir.join("summary.json")),
        ..short_single_flow(&dir)
    };
    let report = run(&p);

    let raw = fs::read_to_string(dir.join("summary.json")).expect("summary");
    let v: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(v["scenario"], "single_flow");
    assert_eq!(v["tcp"], "NewReno");
    assert_eq!(v["bottleneck"]["qdisc"], "FqCoDel");
    assert_eq!(v["flows"][0]["bytes_acked"], report.flows[0].bytes_acked);
}
