//! Feature Aggregator (spec §4.1): turns a lazy stream of BGPUpdate records
//! into one FeatureBin per (device, time-bin).

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use sentinel_common::metrics::Counters;
use sentinel_common::types::{BgpUpdate, DeviceId, FeatureBin};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn align_bin_start(ts: DateTime<Utc>, bin_seconds: i64) -> DateTime<Utc> {
    let epoch_secs = ts.timestamp();
    let aligned = epoch_secs - epoch_secs.rem_euclid(bin_seconds);
    Utc.timestamp_opt(aligned, 0).single().unwrap_or(ts)
}

struct DeviceAccumulator {
    device: DeviceId,
    bin_start: DateTime<Utc>,
    bin_end: DateTime<Utc>,
    withdrawals_total: u64,
    announcements_total: u64,
    update_count: u64,
    as_paths: HashSet<String>,
    peers: HashSet<String>,
}

impl DeviceAccumulator {
    fn new(device: DeviceId, bin_start: DateTime<Utc>, bin_seconds: i64) -> Self {
        Self {
            device,
            bin_start,
            bin_end: bin_start + ChronoDuration::seconds(bin_seconds),
            withdrawals_total: 0,
            announcements_total: 0,
            update_count: 0,
            as_paths: HashSet::new(),
            peers: HashSet::new(),
        }
    }

    fn record(&mut self, update: &BgpUpdate) {
        // Counts come from the announced/withdrawn prefix sets directly;
        // `kind` is metadata, not the source of truth for counts.
        self.announcements_total += update.announce.len() as u64;
        self.withdrawals_total += update.withdraw.len() as u64;
        self.update_count += 1;
        self.as_paths.insert(
            update
                .as_path
                .iter()
                .map(|asn| asn.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        );
        self.peers.insert(update.peer.clone());
    }

    fn close(&self) -> FeatureBin {
        let churn = if self.update_count == 0 {
            0.0
        } else {
            self.as_paths.len() as f64 / self.update_count as f64
        };
        FeatureBin {
            device: self.device.clone(),
            bin_start: self.bin_start,
            bin_end: self.bin_end,
            withdrawals_total: self.withdrawals_total,
            announcements_total: self.announcements_total,
            as_path_churn: churn,
            peer_count: self.peers.len() as u32,
        }
    }
}

/// Accumulates BGPUpdate records into per-device FeatureBins. The monitored
/// `device` identity is the update's `peer` field — the wire schema (spec
/// §6) carries only `peer`, and BGPAnomaly's data-model row names its
/// subject "device (or peer)", so this aggregator treats the two as the
/// same identity rather than inventing an unspecified device field.
pub struct FeatureAggregator {
    bin_seconds: i64,
    flush_delay: ChronoDuration,
    max_bin_lag: ChronoDuration,
    devices: HashMap<DeviceId, DeviceAccumulator>,
    counters: Arc<Counters>,
}

impl FeatureAggregator {
    pub fn new(bin_seconds: u64, counters: Arc<Counters>) -> Self {
        let bin_seconds = bin_seconds as i64;
        Self {
            bin_seconds,
            flush_delay: ChronoDuration::seconds(bin_seconds.min(30) / 6 + 5),
            max_bin_lag: ChronoDuration::seconds(2 * bin_seconds),
            devices: HashMap::new(),
            counters,
        }
    }

    /// Ingest one update. Returns any FeatureBins that close as a
    /// consequence (the device's own bin advancing past this update's
    /// timestamp; intermediate idle bins are emitted zero-valued).
    pub fn ingest(&mut self, update: BgpUpdate) -> Vec<FeatureBin> {
        let device = update.peer.clone();
        let ts = update.ts;
        let bin_seconds = self.bin_seconds;

        if !self.devices.contains_key(&device) {
            self.devices.insert(
                device.clone(),
                DeviceAccumulator::new(device.clone(), align_bin_start(ts, bin_seconds), bin_seconds),
            );
        }

        let acc = self.devices.get(&device).unwrap();
        if ts < acc.bin_start - self.max_bin_lag {
            Counters::incr(&self.counters.bgp_lag_drops);
            return Vec::new();
        }

        let mut emitted = Vec::new();
        loop {
            let acc = self.devices.get(&device).unwrap();
            if ts < acc.bin_end {
                break;
            }
            let closed = acc.close();
            let next_start = acc.bin_end;
            emitted.push(closed);
            self.devices.insert(
                device.clone(),
                DeviceAccumulator::new(device.clone(), next_start, bin_seconds),
            );
        }

        self.devices.get_mut(&device).unwrap().record(&update);
        emitted
    }

    /// Force-close any bins whose `bin_end + flush_delay` has passed as of
    /// `now`, emitting zero-valued bins for devices that stayed idle so the
    /// Matrix Profile detector's ring remains contiguous.
    pub fn flush(&mut self, now: DateTime<Utc>) -> Vec<FeatureBin> {
        let mut emitted = Vec::new();
        let bin_seconds = self.bin_seconds;
        let flush_delay = self.flush_delay;
        for acc in self.devices.values_mut() {
            while acc.bin_end + flush_delay <= now {
                emitted.push(acc.close());
                let next_start = acc.bin_end;
                *acc = DeviceAccumulator::new(acc.device.clone(), next_start, bin_seconds);
            }
        }
        emitted
    }
}
