use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "aqmsim-rs-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn multi_flow(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_multi_flow"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run multi_flow")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "multi_flow failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// 各流在 4 秒内错开启动，2Mbps 瓶颈 + 小队列保证出现丢包。
fn short_run(qdisc: &str) -> Vec<&str> {
    vec![
        "--sim-duration",
        "4",
        "--flow-stagger",
        "0.5",
        "--drain-time",
        "0.5",
        "--bottleneck-bandwidth",
        "2Mbps",
        "--queue-disc-type",
        qdisc,
        "--queue-disc-size",
        "20",
    ]
}

#[test]
fn multi_flow_drop_trace_has_destination_port() {
    let dir = unique_temp_dir("multi-drops");
    let output = multi_flow(&dir, &short_run("PfifoFast"));
    assert_success(&output);

    for name in [
        "CD-multiflow-cwn.tr",
        "CD-multiflow-buf.tr",
        "CD-multiflow-drp.tr",
    ] {
        assert!(dir.join(name).exists(), "{name} missing");
    }
    for i in 1..=3 {
        assert!(dir.join(format!("CD-multiflow-{i}-1.pcap")).exists());
    }

    let drops = fs::read_to_string(dir.join("CD-multiflow-drp.tr")).expect("drop trace");
    assert!(drops.lines().count() > 0, "expected drops");
    let mut prev = 0.0f64;
    for line in drops.lines() {
        let cols: Vec<&str> = line.split('\t').collect();
        assert_eq!(cols.len(), 3, "bad drop line {line:?}");
        let t: f64 = cols[0].parse().expect("time");
        assert!(t >= prev);
        prev = t;
        cols[1].parse::<u32>().expect("sequence number");
        let port: u16 = cols[2].parse().expect("port");
        assert!((50000..50003).contains(&port), "port {port}");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("flow ").count(), 3);
    assert!(stdout.contains("(port 50002)"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn multi_flow_rejects_cwnd_flow_out_of_range() {
    let dir = unique_temp_dir("multi-cwnd-flow");
    let output = multi_flow(&dir, &["--cwnd-flow", "5"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("flow index 5 is out of range for 3 flow(s)"),
        "unexpected stderr: {stderr}"
    );
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn multi_flow_runs_fq_codel_with_more_flows() {
    let dir = unique_temp_dir("multi-fq-codel");
    let mut args = short_run("FqCoDel");
    args.extend([
        "--flows",
        "4",
        "--cwnd-flow",
        "3",
        "--is-pcap-enabled",
        "false",
    ]);
    let output = multi_flow(&dir, &args);
    assert_success(&output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FqCoDel"));
    assert_eq!(stdout.matches("flow ").count(), 4);

    // 第 4 条流在 1.5s 启动，它的拥塞窗口记录不早于此
    let cwnd = fs::read_to_string(dir.join("CD-multiflow-cwn.tr")).expect("cwnd trace");
    let first: f64 = cwnd
        .lines()
        .next()
        .and_then(|l| l.split('\t').next())
        .expect("cwnd line")
        .parse()
        .expect("time");
    assert!(first >= 1.5);

    assert!(!dir.join("CD-multiflow-1-1.pcap").exists());

    let _ = fs::remove_dir_all(&dir);
}
