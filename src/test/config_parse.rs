use crate::config::{parse_data_rate, parse_time};
use crate::queue::QueueDiscKind;
use crate::sim::SimTime;

#[test]
fn data_rate_units() {
    assert_eq!(parse_data_rate("5Mbps").unwrap(), 5_000_000);
    assert_eq!(parse_data_rate("1.5Mbps").unwrap(), 1_500_000);
    assert_eq!(parse_data_rate("100kbps").unwrap(), 100_000);
    assert_eq!(parse_data_rate("100Kbps").unwrap(), 100_000);
    assert_eq!(parse_data_rate("10Gbps").unwrap(), 10_000_000_000);
    assert_eq!(parse_data_rate("9600bps").unwrap(), 9600);
    assert_eq!(parse_data_rate("1MBps").unwrap(), 8_000_000);
}

#[test]
fn data_rate_rejects_garbage() {
    for bad in ["", "Mbps", "2Mbit", "-1Mbps", "fastMbps", "1.2.3Mbps"] {
        let err = parse_data_rate(bad).expect_err(bad);
        assert!(err.to_string().contains("invalid data rate"), "{bad}: {err}");
    }
}

#[test]
fn time_units() {
    assert_eq!(parse_time("25ms").unwrap(), SimTime::from_millis(25));
    assert_eq!(parse_time("1s").unwrap(), SimTime::from_secs(1));
    assert_eq!(parse_time("500us").unwrap(), SimTime::from_micros(500));
    assert_eq!(parse_time("7ns").unwrap(), SimTime(7));
    assert_eq!(parse_time("10").unwrap(), SimTime::from_secs(10));
    assert_eq!(parse_time("0.1s").unwrap(), SimTime::from_millis(100));
}

#[test]
fn time_rejects_garbage() {
    for bad in ["", "-1ms", "5min", "ms"] {
        assert!(parse_time(bad).is_err(), "{bad} should not parse");
    }
}

#[test]
fn queue_disc_names_are_case_sensitive() {
    assert_eq!("PfifoFast".parse::<QueueDiscKind>().unwrap(), QueueDiscKind::PfifoFast);
    assert_eq!("DropTail".parse::<QueueDiscKind>().unwrap(), QueueDiscKind::PfifoFast);
    assert_eq!("CoDel".parse::<QueueDiscKind>().unwrap(), QueueDiscKind::CoDel);
    assert_eq!("RED".parse::<QueueDiscKind>().unwrap(), QueueDiscKind::Red);
    assert_eq!("FqCoDel".parse::<QueueDiscKind>().unwrap(), QueueDiscKind::FqCoDel);

    let err = "codel".parse::<QueueDiscKind>().unwrap_err();
    assert!(err.to_string().contains("invalid queue disc type `codel`"));
}

#[test]
fn queue_disc_display_parses_back() {
    for kind in QueueDiscKind::ALL {
        assert_eq!(kind.to_string().parse::<QueueDiscKind>().unwrap(), kind);
    }
}
