use std::fmt;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use super::{Availability, Feed};

const PROC_NET_DEV: &str = "/proc/net/dev";

#[derive(Serialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    #[serde(rename = "RX")]
    Rx,
    #[serde(rename = "TX")]
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rx => f.write_str("RX"),
            Direction::Tx => f.write_str("TX"),
        }
    }
}

/// Byte counters of one interface as reported by the kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Parse the text of `/proc/net/dev`. Lines that don't look like interface
/// counters are skipped.
pub fn parse_net_dev(text: &str) -> Vec<InterfaceCounters> {
    text.lines()
        .filter_map(|line| {
            let (name, rest) = line.split_once(':')?;
            let fields: Vec<u64> = rest
                .split_whitespace()
                .map(str::parse)
                .collect::<Result<_, _>>()
                .ok()?;
            Some(InterfaceCounters {
                name: name.trim().to_string(),
                rx_bytes: *fields.first()?,
                tx_bytes: *fields.get(8)?,
            })
        })
        .collect()
}

fn read_counters(source: &PathBuf) -> Vec<InterfaceCounters> {
    fs::read_to_string(source)
        .map(|text| parse_net_dev(&text))
        .unwrap_or_default()
}

/// Names of every interface the kernel currently reports.
pub fn list_interfaces() -> Vec<String> {
    read_counters(&PathBuf::from(PROC_NET_DEV))
        .into_iter()
        .map(|c| c.name)
        .collect()
}

/// Received or transmitted byte counter of a network interface.
///
/// If the interface disappears mid-run the last value seen is repeated so
/// the display shows a stall instead of ending.
pub struct NetworkFeed {
    interface: String,
    direction: Direction,
    source: PathBuf,
    last: u64,
    warned: bool,
}

impl NetworkFeed {
    pub fn new(interface: impl Into<String>, direction: Direction) -> Self {
        Self::with_source(interface, direction, PROC_NET_DEV)
    }

    pub fn with_source(
        interface: impl Into<String>,
        direction: Direction,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            interface: interface.into(),
            direction,
            source: source.into(),
            last: 0,
            warned: false,
        }
    }

    fn counter(&self) -> Option<u64> {
        read_counters(&self.source)
            .into_iter()
            .find(|c| c.name == self.interface)
            .map(|c| match self.direction {
                Direction::Rx => c.rx_bytes,
                Direction::Tx => c.tx_bytes,
            })
    }
}

impl Feed for NetworkFeed {
    fn sample(&mut self) -> Option<u64> {
        match self.counter() {
            Some(value) => {
                self.last = value;
                self.warned = false;
            }
            None if !self.warned => {
                warn!(interface = %self.interface, "Network interface is not available");
                self.warned = true;
            }
            None => {}
        }
        Some(self.last)
    }

    fn availability(&self) -> Availability {
        match self.counter() {
            Some(_) => Availability::Ready,
            None => Availability::Waiting(format!(
                "Waiting for network statistics from interface '{}'...",
                self.interface
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  123456     100    0    0    0     0          0         0   123456     100    0    0    0     0       0          0
  eth0:9876543210 5000    0    0    0     0          0        12  5550000    4000    0    0    0     0       0          0
";

    #[test]
    fn parses_interface_lines() {
        let counters = parse_net_dev(SAMPLE);
        assert_eq!(counters.len(), 2);
        assert_eq!(
            counters[1],
            InterfaceCounters { name: "eth0".into(), rx_bytes: 9_876_543_210, tx_bytes: 5_550_000 }
        );
    }

    #[test]
    fn skips_malformed_lines() {
        let counters = parse_net_dev("wlan0: 12 bogus\nfoo: 1 2\n");
        assert!(counters.is_empty());
    }

    #[test]
    fn feed_reads_direction_and_holds_last_value() {
        let path = std::env::temp_dir().join(format!("ratemon-netdev-{}", std::process::id()));
        fs::write(&path, SAMPLE).unwrap();

        let mut rx = NetworkFeed::with_source("eth0", Direction::Rx, &path);
        let mut tx = NetworkFeed::with_source("eth0", Direction::Tx, &path);
        assert_eq!(rx.availability(), Availability::Ready);
        assert_eq!(rx.sample(), Some(9_876_543_210));
        assert_eq!(tx.sample(), Some(5_550_000));

        fs::write(&path, SAMPLE.replace("eth0", "eth1")).unwrap();
        assert!(matches!(rx.availability(), Availability::Waiting(_)));
        assert_eq!(rx.sample(), Some(9_876_543_210));
        fs::remove_file(&path).unwrap();
    }
}
