//! Fixed-interval scan loop: discover containers, build specs, reconcile.

use crate::reconciler::{KeyReport, Reconciler};
use chrono::{DateTime, Utc};
use gantry_core::{ServiceSpec, SpecBuilder};
use gantry_discovery::{ContainerDiscovery, ContainerRef, DiscoveryError, LabelFilter};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{Instrument, error, info, info_span, warn};

/// A discovered container that produced no spec this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedContainer {
    pub container_id: String,
    pub reason: String,
}

/// Summary of one scan cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub containers_seen: usize,
    pub specs_built: usize,
    pub skipped: Vec<SkippedContainer>,
    pub keys: Vec<KeyReport>,
    /// Set when listing containers failed; nothing was reconciled.
    pub discovery_error: Option<DiscoveryError>,
}

impl CycleReport {
    fn new(cycle: u64) -> Self {
        let now = Utc::now();
        Self {
            cycle,
            started_at: now,
            finished_at: now,
            containers_seen: 0,
            specs_built: 0,
            skipped: Vec::new(),
            keys: Vec::new(),
            discovery_error: None,
        }
    }

    /// Gateway writes performed across all keys.
    pub fn changes(&self) -> usize {
        self.keys.iter().map(|k| k.actions.len()).sum()
    }

    pub fn failed_keys(&self) -> usize {
        self.keys.iter().filter(|k| !k.is_ok()).count()
    }

    pub fn key(&self, name: &str) -> Option<&KeyReport> {
        self.keys.iter().find(|k| k.key.as_str() == name)
    }
}

pub struct Scheduler {
    discovery: Arc<dyn ContainerDiscovery>,
    reconciler: Reconciler,
    builder: SpecBuilder,
    filter: LabelFilter,
    interval: Duration,
    cycles: AtomicU64,
}

impl Scheduler {
    pub fn new(
        discovery: Arc<dyn ContainerDiscovery>,
        reconciler: Reconciler,
        builder: SpecBuilder,
        filter: LabelFilter,
        interval: Duration,
    ) -> Self {
        Self {
            discovery,
            reconciler,
            builder,
            filter,
            interval,
            cycles: AtomicU64::new(0),
        }
    }

    /// Cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Runs cycles until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The first cycle starts immediately. A cycle that outlasts the interval
    /// delays the next one; ticks are never queued up. Shutdown during a
    /// cycle drops it at its current await point.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "scan scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = shutdown.changed() => {
                    warn!("shutdown requested, abandoning in-flight cycle");
                    break;
                }
                _ = self.run_cycle() => {}
            }
        }

        info!(cycles = self.cycles(), "scan scheduler stopped");
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        self.scan(cycle).instrument(info_span!("scan_cycle", cycle)).await
    }

    async fn scan(&self, cycle: u64) -> CycleReport {
        let mut report = CycleReport::new(cycle);

        let containers = match self.discovery.list(&self.filter).await {
            Ok(containers) => containers,
            Err(e) => {
                error!(error = %e, "container discovery failed, cycle skipped");
                report.discovery_error = Some(e);
                report.finished_at = Utc::now();
                return report;
            }
        };
        report.containers_seen = containers.len();

        let (specs, live_hosts) = self.build_specs(&containers, &mut report.skipped);
        report.specs_built = specs.len();

        report.keys = self.reconciler.reconcile(&specs, &live_hosts).await;
        report.finished_at = Utc::now();

        info!(
            containers = report.containers_seen,
            specs = report.specs_built,
            skipped = report.skipped.len(),
            keys = report.keys.len(),
            changes = report.changes(),
            failed_keys = report.failed_keys(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "scan cycle finished"
        );
        report
    }

    /// Returns the specs of usable containers and the identities of all
    /// running ones.
    fn build_specs(
        &self,
        containers: &[ContainerRef],
        skipped: &mut Vec<SkippedContainer>,
    ) -> (Vec<ServiceSpec>, HashSet<String>) {
        let mut specs = Vec::new();
        let mut live_hosts = HashSet::new();

        for container in containers {
            let container_id = container.identity();
            let mut skip = |reason: String| {
                warn!(container_id, reason = %reason, "container skipped");
                skipped.push(SkippedContainer {
                    container_id: container_id.to_string(),
                    reason,
                });
            };

            if !container.running {
                skip("not running".into());
                continue;
            }
            live_hosts.insert(container_id.to_string());

            if !container.is_serving() {
                skip("health check failing".into());
                continue;
            }

            match self.builder.build(container_id, &container.labels) {
                Ok(spec) => {
                    info!(
                        container_id,
                        gateway_key = %spec.gateway_key(),
                        address = %spec.instance_address,
                        auth = spec.require_authentication,
                        "container accepted"
                    );
                    specs.push(spec);
                }
                Err(e) => skip(e.to_string()),
            }
        }

        (specs, live_hosts)
    }
}
