//! Maintenance service doubles counting their invocations.

use async_trait::async_trait;
use scanner_core::scheduler::{
    CleanupBroadcastReport, CleanupBroadcastService, DueScanService, MaintenanceServices,
    StatisticsService,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct CountingServices {
    pub due_scans: AtomicUsize,
    pub statistics: AtomicUsize,
    pub cleanup: AtomicUsize,
    pub fail_due_scans: bool,
}

impl CountingServices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_due_scans() -> Arc<Self> {
        Arc::new(Self {
            fail_due_scans: true,
            ..Self::default()
        })
    }

    pub fn due_scan_calls(&self) -> usize {
        self.due_scans.load(Ordering::SeqCst)
    }

    pub fn statistics_calls(&self) -> usize {
        self.statistics.load(Ordering::SeqCst)
    }

    pub fn cleanup_calls(&self) -> usize {
        self.cleanup.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DueScanService for CountingServices {
    async fn trigger_due_scans(&self) -> anyhow::Result<usize> {
        self.due_scans.fetch_add(1, Ordering::SeqCst);
        if self.fail_due_scans {
            anyhow::bail!("scheduled scan table unavailable");
        }
        Ok(0)
    }
}

#[async_trait]
impl StatisticsService for CountingServices {
    async fn refresh_statistics(&self) -> anyhow::Result<BTreeMap<String, i64>> {
        self.statistics.fetch_add(1, Ordering::SeqCst);
        Ok(BTreeMap::from([("targets".to_string(), 3)]))
    }
}

#[async_trait]
impl CleanupBroadcastService for CountingServices {
    async fn broadcast_cleanup(&self) -> anyhow::Result<CleanupBroadcastReport> {
        self.cleanup.fetch_add(1, Ordering::SeqCst);
        Ok(CleanupBroadcastReport {
            total_workers: 2,
            dispatched: 2,
            failed: 0,
        })
    }
}

pub fn maintenance_services(services: &Arc<CountingServices>) -> MaintenanceServices {
    MaintenanceServices {
        due_scans: services.clone(),
        statistics: services.clone(),
        cleanup: services.clone(),
    }
}
