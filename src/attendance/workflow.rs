//! Attendance workflow: scan -> select -> fetch -> export.
//!
//! Composes the scan controller, device inventory, attendance fetcher, sync
//! stub and CSV exporter, and enforces the invariants between them:
//!
//! - selecting (or deselecting) a device clears the displayed records and
//!   orphans any fetch still in flight;
//! - fetch and sync require a selection;
//! - scan and fetch run independently but share one operator-visible error
//!   slot, where the latest failure wins.
//!
//! State is read synchronously; actions are async and never hold a lock
//! across an await. Lock order is scan -> inventory -> fetcher.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use super::capability::{DeviceCapability, DeviceClient};
use super::csv::{self, CsvExport};
use super::events::{ErrorReport, ErrorSlot, EventBus, Operation, WorkflowEvent};
use super::fetcher::{AttendanceFetcher, FetchCompletion, FetchPhase};
use super::inventory::DeviceInventory;
use super::scan::{ScanController, ScanPhase};
use super::sync::SyncStub;
use super::types::{AttendanceRecord, Device, DeviceEntry, DeviceId};
use crate::config::Config;
use crate::error::{Error, Result};

const EVENT_CAPACITY: usize = 64;

/// Result of a scan request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ScanOutcome {
    Completed { device_count: usize },
    /// The scan was cancelled or superseded before it finished.
    Discarded,
    /// Another scan is already running; nothing was started.
    AlreadyRunning,
}

/// Result of a fetch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FetchOutcome {
    Loaded { record_count: usize },
    /// The selection changed while the fetch was in flight.
    Discarded,
}

/// Everything the host shell renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub scan_phase: ScanPhase,
    pub scanning: bool,
    pub devices: Vec<DeviceEntry>,
    pub selected_id: Option<DeviceId>,
    pub selected_device: Option<Device>,
    pub fetch_phase: FetchPhase,
    pub loading: bool,
    pub records: Vec<AttendanceRecord>,
    pub syncing: bool,
    pub error: Option<ErrorReport>,
}

pub struct AttendanceWorkflow<C> {
    client: DeviceClient<C>,
    scans: ScanController,
    inventory: Mutex<DeviceInventory>,
    fetcher: AttendanceFetcher,
    sync: SyncStub,
    errors: ErrorSlot,
    events: EventBus,
}

impl<C: DeviceCapability> AttendanceWorkflow<C> {
    pub fn new(capability: C, config: &Config) -> Self {
        Self {
            client: DeviceClient::new(capability, &config.client),
            scans: ScanController::new(),
            inventory: Mutex::new(DeviceInventory::new()),
            fetcher: AttendanceFetcher::new(config.default_port),
            sync: SyncStub::new(config.sync_delay()),
            errors: ErrorSlot::new(),
            events: EventBus::new(EVENT_CAPACITY),
        }
    }

    #[cfg(test)]
    pub(crate) fn capability(&self) -> &C {
        self.client.capability()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    // MARK: - State reads

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let scan_phase = self.scans.phase();
        let (devices, selection) = {
            let inventory = self.inventory.lock();
            (inventory.entries(), inventory.selection().cloned())
        };
        let fetch_phase = self.fetcher.phase();

        WorkflowSnapshot {
            scan_phase,
            scanning: scan_phase.is_scanning(),
            devices,
            selected_id: selection.as_ref().map(|s| s.id.clone()),
            selected_device: selection.map(|s| s.device),
            fetch_phase,
            loading: fetch_phase == FetchPhase::Loading,
            records: self.fetcher.records(),
            syncing: self.sync.is_busy(),
            error: self.errors.current(),
        }
    }

    pub fn scan_phase(&self) -> ScanPhase {
        self.scans.phase()
    }

    pub fn fetch_phase(&self) -> FetchPhase {
        self.fetcher.phase()
    }

    pub fn is_syncing(&self) -> bool {
        self.sync.is_busy()
    }

    pub fn devices(&self) -> Vec<Device> {
        self.inventory.lock().devices().to_vec()
    }

    pub fn selected_device(&self) -> Option<Device> {
        self.inventory.lock().selected_device().cloned()
    }

    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.fetcher.records()
    }

    pub fn error_message(&self) -> Option<String> {
        self.errors.message()
    }

    // MARK: - Scan

    /// Run a network scan and, unless cancelled meanwhile, publish its result.
    ///
    /// A successful scan replaces the device list, even with an empty one. A
    /// failed scan leaves the list untouched and fills the error slot.
    pub async fn scan(&self) -> Result<ScanOutcome> {
        let Some(token) = self.scans.start() else {
            log::debug!("[attendance::scan] scan already running");
            return Ok(ScanOutcome::AlreadyRunning);
        };
        let generation = token.generation();
        self.errors.clear();
        self.events.publish(WorkflowEvent::ScanStarted { generation });
        log::info!("[attendance::scan] Scan #{} started", generation);

        // Runs to completion even if cancelled; the token decides whether it counts
        match self.client.discover().await {
            Ok(devices) => {
                let device_count = devices.len();
                let applied = self
                    .scans
                    .complete(&token, || self.inventory.lock().replace(devices));
                if !applied {
                    return Ok(self.discard_scan(generation));
                }

                log::info!(
                    "[attendance::scan] Scan #{} found {} device(s)",
                    generation,
                    device_count
                );
                self.events.publish(WorkflowEvent::ScanCompleted {
                    generation,
                    device_count,
                });
                Ok(ScanOutcome::Completed { device_count })
            }
            Err(e) => {
                let message = e.message();
                let applied = self
                    .scans
                    .complete(&token, || self.errors.report(Operation::Scan, message.clone()));
                if !applied {
                    return Ok(self.discard_scan(generation));
                }

                log::warn!("[attendance::scan] Scan #{} failed: {}", generation, message);
                self.events
                    .publish(WorkflowEvent::ScanFailed { generation, message });
                Err(e)
            }
        }
    }

    fn discard_scan(&self, generation: u64) -> ScanOutcome {
        log::info!("[attendance::scan] Scan #{} result discarded", generation);
        self.events.publish(WorkflowEvent::ScanDiscarded { generation });
        ScanOutcome::Discarded
    }

    /// Cancel the running scan. The discovery call keeps going in the
    /// background but its result will be ignored.
    pub fn cancel_scan(&self) -> bool {
        let Some(generation) = self.scans.cancel() else {
            return false;
        };
        self.errors.clear();
        log::info!("[attendance::scan] Scan #{} cancelled", generation);
        self.events.publish(WorkflowEvent::ScanCancelled { generation });
        true
    }

    // MARK: - Selection

    /// Select a device by identifier, or deselect with `None`.
    ///
    /// Always clears the displayed records. An identifier that does not
    /// resolve leaves nothing selected.
    pub fn select_device(&self, id: Option<&str>) -> Result<Option<Device>> {
        let (result, selected_id) = {
            let mut inventory = self.inventory.lock();
            let result = match id {
                Some(raw) => inventory.select(raw).map(|d| d.cloned()),
                None => {
                    inventory.clear_selection();
                    Ok(None)
                }
            };
            self.fetcher.supersede();
            let selected_id = inventory.selection().map(|s| s.id.to_string());
            (result, selected_id)
        };

        log::debug!("[attendance::inventory] selection is now {:?}", selected_id);
        self.events
            .publish(WorkflowEvent::DeviceSelected { id: selected_id });

        result.map_err(|e| {
            self.errors.report(Operation::Select, e.message());
            e
        })
    }

    // MARK: - Fetch

    /// Fetch attendance for the selected device.
    ///
    /// Success replaces the records in full; failure empties them and fills
    /// the error slot. If the selection changes before the call returns, the
    /// result is dropped.
    pub async fn fetch_attendance(&self) -> Result<FetchOutcome> {
        let ticket = {
            let inventory = self.inventory.lock();
            inventory
                .selected_device()
                .map(|device| self.fetcher.begin(device))
        };
        let Some(ticket) = ticket else {
            return Err(self.reject(Operation::Fetch, Error::NoDeviceSelected));
        };

        self.errors.clear();
        self.events.publish(WorkflowEvent::FetchStarted {
            ip: ticket.ip.clone(),
            port: ticket.port,
        });
        log::info!(
            "[attendance::fetch] Fetching attendance from {}:{}",
            ticket.ip,
            ticket.port
        );

        let result = self.client.fetch(&ticket.ip, ticket.port).await;

        match self.fetcher.complete(&ticket, result) {
            FetchCompletion::Loaded { count } => {
                self.events.publish(WorkflowEvent::FetchCompleted {
                    ip: ticket.ip,
                    record_count: count,
                });
                Ok(FetchOutcome::Loaded {
                    record_count: count,
                })
            }
            FetchCompletion::Failed(e) => {
                let message = e.message();
                self.errors.report(Operation::Fetch, message.clone());
                self.events.publish(WorkflowEvent::FetchFailed {
                    ip: ticket.ip,
                    message,
                });
                Err(e)
            }
            FetchCompletion::Superseded => {
                log::info!(
                    "[attendance::fetch] Result from {} discarded, selection changed",
                    ticket.ip
                );
                self.events
                    .publish(WorkflowEvent::FetchDiscarded { ip: ticket.ip });
                Ok(FetchOutcome::Discarded)
            }
        }
    }

    // MARK: - Sync

    /// Placeholder device sync. Always reports that sync is not implemented.
    pub async fn sync_device(&self) -> Result<()> {
        let Some(device) = self.selected_device() else {
            return Err(self.reject(Operation::Sync, Error::NoDeviceSelected));
        };
        if self.sync.is_busy() {
            return Ok(());
        }

        self.errors.clear();
        self.events.publish(WorkflowEvent::SyncStarted {
            ip: device.ip.clone(),
        });

        match self.sync.sync(Some(&device)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let message = e.message();
                self.errors.report(Operation::Sync, message.clone());
                self.events.publish(WorkflowEvent::SyncFinished {
                    ip: device.ip,
                    message,
                });
                Err(e)
            }
        }
    }

    // MARK: - Export

    /// CSV of the displayed records, named for today's date. `None` when
    /// there is nothing to export.
    pub fn export_csv(&self) -> Option<CsvExport> {
        csv::export(&self.fetcher.records(), Utc::now().date_naive())
    }

    fn reject(&self, operation: Operation, error: Error) -> Error {
        log::warn!("[attendance] {:?} rejected: {}", operation, error);
        self.errors.report(operation, error.message());
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    type Reply<T> = std::result::Result<T, String>;

    /// Capability whose calls block until the test answers them.
    #[derive(Default)]
    struct ScriptedCapability {
        discoveries: Mutex<VecDeque<oneshot::Receiver<Reply<Vec<Device>>>>>,
        fetches: Mutex<VecDeque<oneshot::Receiver<Reply<Vec<AttendanceRecord>>>>>,
        fetch_calls: Mutex<Vec<(String, u16)>>,
    }

    impl ScriptedCapability {
        fn expect_discovery(&self) -> oneshot::Sender<Reply<Vec<Device>>> {
            let (tx, rx) = oneshot::channel();
            self.discoveries.lock().push_back(rx);
            tx
        }

        fn expect_fetch(&self) -> oneshot::Sender<Reply<Vec<AttendanceRecord>>> {
            let (tx, rx) = oneshot::channel();
            self.fetches.lock().push_back(rx);
            tx
        }

        fn fetch_calls(&self) -> Vec<(String, u16)> {
            self.fetch_calls.lock().clone()
        }
    }

    impl DeviceCapability for ScriptedCapability {
        async fn discover_devices(&self) -> Reply<Vec<Device>> {
            let reply = self.discoveries.lock().pop_front();
            let reply = reply.ok_or_else(|| "unexpected discovery".to_string())?;
            reply.await.map_err(|_| "discovery abandoned".to_string())?
        }

        async fn fetch_attendance(&self, ip: &str, port: u16) -> Reply<Vec<AttendanceRecord>> {
            self.fetch_calls.lock().push((ip.to_string(), port));
            let reply = self.fetches.lock().pop_front();
            let reply = reply.ok_or_else(|| "unexpected fetch".to_string())?;
            reply.await.map_err(|_| "fetch abandoned".to_string())?
        }
    }

    type Workflow = Arc<AttendanceWorkflow<ScriptedCapability>>;

    fn workflow() -> Workflow {
        let config = Config {
            sync_delay_ms: 20,
            ..Config::default()
        };
        Arc::new(AttendanceWorkflow::new(ScriptedCapability::default(), &config))
    }

    fn device(ip: &str, ports: &[u16]) -> Device {
        Device {
            ip: ip.to_string(),
            mac: "00:17:61:12:34:56".to_string(),
            open_ports: ports.to_vec(),
        }
    }

    fn record(user_id: u32, user_name: &str) -> AttendanceRecord {
        AttendanceRecord {
            user_id,
            user_name: user_name.to_string(),
            timestamp: "2024-01-01T09:00:00+00:00".to_string(),
            status: 0,
            punch: 0,
            date: "2024-01-01".to_string(),
            time: "09:00:00".to_string(),
            event: "Check In".to_string(),
        }
    }

    /// Let spawned tasks run up to their next pending await.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn spawn_scan(wf: &Workflow) -> tokio::task::JoinHandle<Result<ScanOutcome>> {
        let wf = wf.clone();
        tokio::spawn(async move { wf.scan().await })
    }

    fn spawn_fetch(wf: &Workflow) -> tokio::task::JoinHandle<Result<FetchOutcome>> {
        let wf = wf.clone();
        tokio::spawn(async move { wf.fetch_attendance().await })
    }

    async fn scan_with(wf: &Workflow, devices: Vec<Device>) {
        let reply = wf.capability().expect_discovery();
        let task = spawn_scan(wf);
        settle().await;
        reply.send(Ok(devices)).unwrap();
        task.await.unwrap().unwrap();
    }

    async fn loaded_workflow() -> Workflow {
        let wf = workflow();
        scan_with(&wf, vec![device("192.168.1.20", &[80, 4370])]).await;
        wf.select_device(Some("192.168.1.20-0")).unwrap();

        let reply = wf.capability().expect_fetch();
        let task = spawn_fetch(&wf);
        settle().await;
        reply.send(Ok(vec![record(1, "A"), record(2, "B")])).unwrap();
        task.await.unwrap().unwrap();
        wf
    }

    #[tokio::test]
    async fn successful_scan_replaces_inventory_in_order() {
        let wf = workflow();
        scan_with(&wf, vec![device("10.0.0.9", &[]), device("10.0.0.2", &[])]).await;
        scan_with(&wf, vec![device("10.0.0.3", &[4370]), device("10.0.0.1", &[])]).await;

        let ips: Vec<String> = wf.devices().into_iter().map(|d| d.ip).collect();
        assert_eq!(ips, vec!["10.0.0.3", "10.0.0.1"]);
        assert_eq!(wf.scan_phase(), ScanPhase::Idle);
    }

    #[tokio::test]
    async fn empty_scan_is_a_result_not_an_error() {
        let wf = workflow();
        scan_with(&wf, vec![device("10.0.0.9", &[])]).await;

        let reply = wf.capability().expect_discovery();
        let task = spawn_scan(&wf);
        settle().await;
        reply.send(Ok(vec![])).unwrap();

        assert_eq!(
            task.await.unwrap().unwrap(),
            ScanOutcome::Completed { device_count: 0 }
        );
        assert!(wf.devices().is_empty());
        assert!(wf.error_message().is_none());
    }

    #[tokio::test]
    async fn second_start_while_scanning_is_ignored() {
        let wf = workflow();
        let reply = wf.capability().expect_discovery();
        let task = spawn_scan(&wf);
        settle().await;

        assert_eq!(wf.scan().await.unwrap(), ScanOutcome::AlreadyRunning);

        reply.send(Ok(vec![])).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn cancelled_scan_leaves_inventory_unchanged() {
        let wf = workflow();
        scan_with(&wf, vec![device("10.0.0.9", &[4370])]).await;
        let before = wf.devices();

        let reply = wf.capability().expect_discovery();
        let task = spawn_scan(&wf);
        settle().await;
        assert!(wf.snapshot().scanning);

        assert!(wf.cancel_scan());
        let snapshot = wf.snapshot();
        assert!(!snapshot.scanning);
        assert!(snapshot.error.is_none());

        reply
            .send(Ok(vec![device("10.0.0.50", &[]), device("10.0.0.51", &[])]))
            .unwrap();
        assert_eq!(task.await.unwrap().unwrap(), ScanOutcome::Discarded);
        assert_eq!(wf.devices(), before);
    }

    #[tokio::test]
    async fn cancelled_scan_failure_is_not_surfaced() {
        let wf = workflow();
        let reply = wf.capability().expect_discovery();
        let task = spawn_scan(&wf);
        settle().await;
        wf.cancel_scan();

        reply.send(Err("Host unreachable".to_string())).unwrap();
        assert_eq!(task.await.unwrap().unwrap(), ScanOutcome::Discarded);
        assert!(wf.error_message().is_none());
    }

    #[tokio::test]
    async fn new_scan_is_not_blocked_by_cancelled_one_in_flight() {
        let wf = workflow();
        let stale_reply = wf.capability().expect_discovery();
        let stale = spawn_scan(&wf);
        settle().await;
        wf.cancel_scan();

        let fresh_reply = wf.capability().expect_discovery();
        let fresh = spawn_scan(&wf);
        settle().await;
        assert!(wf.snapshot().scanning);

        fresh_reply.send(Ok(vec![device("10.0.0.7", &[])])).unwrap();
        assert_eq!(
            fresh.await.unwrap().unwrap(),
            ScanOutcome::Completed { device_count: 1 }
        );

        // the stale call finally returns and must not clobber the fresh result
        stale_reply.send(Ok(vec![device("10.0.0.66", &[])])).unwrap();
        assert_eq!(stale.await.unwrap().unwrap(), ScanOutcome::Discarded);
        assert_eq!(wf.devices(), vec![device("10.0.0.7", &[])]);
    }

    #[tokio::test]
    async fn failed_scan_keeps_inventory_and_reports() {
        let wf = workflow();
        scan_with(&wf, vec![device("10.0.0.9", &[])]).await;

        let reply = wf.capability().expect_discovery();
        let task = spawn_scan(&wf);
        settle().await;
        reply
            .send(Err("connect EHOSTUNREACH".to_string()))
            .unwrap();

        assert!(matches!(task.await.unwrap(), Err(Error::Discovery(_))));
        assert_eq!(wf.devices(), vec![device("10.0.0.9", &[])]);
        assert_eq!(
            wf.error_message().unwrap(),
            "Device scan failed: Host unreachable - check network configuration"
        );
        assert_eq!(wf.scan_phase(), ScanPhase::Idle);
    }

    #[tokio::test]
    async fn duplicate_ips_get_distinct_identifiers() {
        let wf = workflow();
        scan_with(
            &wf,
            vec![device("10.0.0.5", &[80]), device("10.0.0.5", &[4370, 9000])],
        )
        .await;

        let ids: Vec<String> = wf
            .snapshot()
            .devices
            .iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, vec!["10.0.0.5-0", "10.0.0.5-1"]);

        let second = wf.select_device(Some("10.0.0.5-1")).unwrap().unwrap();
        assert_eq!(second.open_ports, vec![4370, 9000]);
        let first = wf.select_device(Some("10.0.0.5-0")).unwrap().unwrap();
        assert_eq!(first.open_ports, vec![80]);
    }

    #[tokio::test]
    async fn selecting_clears_attendance() {
        let wf = loaded_workflow().await;
        assert_eq!(wf.records().len(), 2);

        wf.select_device(Some("192.168.1.20-0")).unwrap();
        assert!(wf.records().is_empty());
        assert_eq!(wf.fetch_phase(), FetchPhase::Idle);
    }

    #[tokio::test]
    async fn stale_identifier_selects_nothing() {
        let wf = loaded_workflow().await;

        assert!(wf.select_device(Some("192.168.1.20-7")).unwrap().is_none());
        let snapshot = wf.snapshot();
        assert!(snapshot.selected_device.is_none());
        assert!(snapshot.records.is_empty());
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn malformed_identifier_is_reported() {
        let wf = loaded_workflow().await;

        assert!(matches!(
            wf.select_device(Some("nonsense")),
            Err(Error::Validation(_))
        ));
        assert!(wf.selected_device().is_none());
        assert!(wf.records().is_empty());
        assert!(wf.error_message().is_some());
    }

    #[tokio::test]
    async fn fetch_applies_port_policy() {
        let wf = workflow();
        scan_with(
            &wf,
            vec![
                device("10.0.0.1", &[80, 4370, 9000]),
                device("10.0.0.2", &[80, 9000]),
                device("10.0.0.3", &[]),
            ],
        )
        .await;

        for id in ["10.0.0.1-0", "10.0.0.2-1", "10.0.0.3-2"] {
            wf.select_device(Some(id)).unwrap();
            let reply = wf.capability().expect_fetch();
            let task = spawn_fetch(&wf);
            settle().await;
            reply.send(Ok(vec![])).unwrap();
            task.await.unwrap().unwrap();
        }

        assert_eq!(
            wf.capability().fetch_calls(),
            vec![
                ("10.0.0.1".to_string(), 4370),
                ("10.0.0.2".to_string(), 80),
                ("10.0.0.3".to_string(), 4370),
            ]
        );
    }

    #[tokio::test]
    async fn fetch_failure_empties_records_and_reports() {
        let wf = loaded_workflow().await;

        let reply = wf.capability().expect_fetch();
        let task = spawn_fetch(&wf);
        settle().await;
        assert!(wf.snapshot().loading);
        reply
            .send(Err("TCP connect failed: Connection refused".to_string()))
            .unwrap();

        assert!(matches!(task.await.unwrap(), Err(Error::Fetch(_))));
        let snapshot = wf.snapshot();
        assert!(snapshot.records.is_empty());
        assert!(!snapshot.loading);
        assert_eq!(snapshot.fetch_phase, FetchPhase::Failed);
        assert!(!snapshot.error.unwrap().message.is_empty());
    }

    #[tokio::test]
    async fn deselect_during_fetch_discards_the_result() {
        let wf = workflow();
        scan_with(&wf, vec![device("192.168.1.20", &[4370])]).await;
        wf.select_device(Some("192.168.1.20-0")).unwrap();

        let reply = wf.capability().expect_fetch();
        let task = spawn_fetch(&wf);
        settle().await;

        wf.select_device(None).unwrap();
        reply.send(Ok(vec![record(1, "A")])).unwrap();

        assert_eq!(task.await.unwrap().unwrap(), FetchOutcome::Discarded);
        let snapshot = wf.snapshot();
        assert!(snapshot.selected_device.is_none());
        assert!(snapshot.records.is_empty());
    }

    #[tokio::test]
    async fn reselect_during_fetch_keeps_new_selection_clean() {
        let wf = workflow();
        scan_with(
            &wf,
            vec![device("192.168.1.20", &[4370]), device("192.168.1.21", &[4370])],
        )
        .await;
        wf.select_device(Some("192.168.1.20-0")).unwrap();

        let reply = wf.capability().expect_fetch();
        let task = spawn_fetch(&wf);
        settle().await;
        wf.select_device(Some("192.168.1.21-1")).unwrap();

        reply.send(Err("refused".to_string())).unwrap();
        assert_eq!(task.await.unwrap().unwrap(), FetchOutcome::Discarded);
        assert_eq!(wf.selected_device().unwrap().ip, "192.168.1.21");
        assert!(wf.records().is_empty());
        assert!(wf.error_message().is_none());
    }

    #[tokio::test]
    async fn fetch_without_selection_is_rejected() {
        let wf = workflow();
        assert!(matches!(
            wf.fetch_attendance().await,
            Err(Error::NoDeviceSelected)
        ));
        assert_eq!(wf.error_message().unwrap(), "Please select a device first");
        assert!(wf.capability().fetch_calls().is_empty());
    }

    #[tokio::test]
    async fn scan_and_fetch_run_independently() {
        let wf = workflow();
        scan_with(&wf, vec![device("192.168.1.20", &[4370])]).await;
        wf.select_device(Some("192.168.1.20-0")).unwrap();

        let fetch_reply = wf.capability().expect_fetch();
        let fetch = spawn_fetch(&wf);
        settle().await;

        // a scan started and finished mid-fetch does not cancel the fetch
        scan_with(&wf, vec![device("192.168.1.30", &[])]).await;

        fetch_reply.send(Ok(vec![record(7, "G")])).unwrap();
        assert_eq!(
            fetch.await.unwrap().unwrap(),
            FetchOutcome::Loaded { record_count: 1 }
        );
        assert_eq!(wf.records(), vec![record(7, "G")]);
        assert_eq!(wf.selected_device().unwrap().ip, "192.168.1.20");
    }

    #[tokio::test]
    async fn latest_failure_wins_across_operations() {
        let wf = workflow();
        scan_with(&wf, vec![device("192.168.1.20", &[4370])]).await;
        wf.select_device(Some("192.168.1.20-0")).unwrap();

        let fetch_reply = wf.capability().expect_fetch();
        let fetch = spawn_fetch(&wf);
        settle().await;

        let scan_reply = wf.capability().expect_discovery();
        let scan = spawn_scan(&wf);
        settle().await;

        scan_reply.send(Err("scan exploded".to_string())).unwrap();
        assert!(scan.await.unwrap().is_err());
        assert_eq!(wf.snapshot().error.unwrap().operation, Operation::Scan);

        fetch_reply.send(Err("fetch exploded".to_string())).unwrap();
        assert!(fetch.await.unwrap().is_err());
        let error = wf.snapshot().error.unwrap();
        assert_eq!(error.operation, Operation::Fetch);
        assert_eq!(error.message, "Failed to fetch attendance: fetch exploded");
    }

    #[tokio::test]
    async fn sync_requires_selection() {
        let wf = workflow();
        assert!(matches!(wf.sync_device().await, Err(Error::NoDeviceSelected)));
        assert_eq!(wf.error_message().unwrap(), "Please select a device first");
    }

    #[tokio::test]
    async fn sync_reports_not_implemented_and_leaves_state_alone() {
        let wf = loaded_workflow().await;
        let devices = wf.devices();
        let records = wf.records();

        let task = {
            let wf = wf.clone();
            tokio::spawn(async move { wf.sync_device().await })
        };
        settle().await;
        assert!(wf.snapshot().syncing);

        assert!(matches!(task.await.unwrap(), Err(Error::NotImplemented)));
        assert!(!wf.is_syncing());
        assert_eq!(
            wf.error_message().unwrap(),
            "Sync functionality will be implemented soon"
        );
        assert_eq!(wf.devices(), devices);
        assert_eq!(wf.records(), records);
    }

    #[tokio::test]
    async fn export_is_a_no_op_without_records() {
        let wf = workflow();
        assert!(wf.export_csv().is_none());
    }

    #[tokio::test]
    async fn export_renders_displayed_records() {
        let wf = loaded_workflow().await;
        let export = wf.export_csv().unwrap();

        assert_eq!(export.record_count, 2);
        assert!(export.file_name.starts_with("attendance_"));
        assert!(export.file_name.ends_with(".csv"));
        let text = String::from_utf8(export.bytes).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[tokio::test]
    async fn publishes_lifecycle_events() {
        let wf = workflow();
        let mut events = wf.subscribe();
        scan_with(&wf, vec![]).await;

        assert!(matches!(
            events.recv().await.unwrap(),
            WorkflowEvent::ScanStarted { generation: 1 }
        ));
        assert_eq!(
            events.recv().await.unwrap(),
            WorkflowEvent::ScanCompleted {
                generation: 1,
                device_count: 0
            }
        );
    }
}
