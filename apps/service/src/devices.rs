//! Device pool assembly from the `[devices]` config section.

use std::collections::HashSet;

use netpulse::Device;

use crate::config::{Devices, Ipv4Range};

impl Ipv4Range {
    pub fn addresses(&self) -> impl Iterator<Item = String> + '_ {
        (self.first..=self.last).map(move |octet| format!("{}.{}", self.prefix, octet))
    }
}

/// Explicit addresses first, then every range in order. Later duplicates are
/// dropped.
pub fn collect_devices(devices: &Devices) -> Vec<Device> {
    let mut seen = HashSet::new();
    devices
        .addresses
        .iter()
        .cloned()
        .chain(devices.ranges.iter().flat_map(Ipv4Range::addresses))
        .filter(|address| seen.insert(address.clone()))
        .map(Device::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(prefix: &str, first: u8, last: u8) -> Ipv4Range {
        Ipv4Range { prefix: prefix.into(), first, last }
    }

    #[test]
    fn expands_inclusive_ranges() {
        let all: Vec<String> = range("10.0.0", 1, 3).addresses().collect();
        assert_eq!(all, ["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        assert_eq!(range("192.168.222", 1, 254).addresses().count(), 254);
    }

    #[test]
    fn keeps_first_occurrence() {
        let devices = Devices {
            addresses: vec!["10.0.0.2".into(), "router".into()],
            ranges: vec![range("10.0.0", 1, 3), range("10.0.0", 3, 4)],
        };
        let pool = collect_devices(&devices);
        let pool: Vec<&str> = pool.iter().map(Device::as_str).collect();
        assert_eq!(pool, ["10.0.0.2", "router", "10.0.0.1", "10.0.0.3", "10.0.0.4"]);
    }
}
