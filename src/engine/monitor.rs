use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::{
    common::{MemCache, Shutdown},
    events::{CaseEvent, CaseStatusEvent},
    runner::{CaseStatus, WorkItem, WorkItemId, WorkItemStatus},
    runtime::Channel,
    utils,
};

/// Ledger entry of one case.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CaseRecord {
    pub id: String,
    pub spec: String,
    pub net: String,
    /// parent case and task, for sub-cases
    pub parent: Option<(String, String)>,
    pub status: CaseStatus,
    pub firings: usize,
    pub error: Option<String>,
    pub start_time: i64,
    pub end_time: i64,
    pub timestamp: i64,
}

impl CaseRecord {
    pub fn new(
        id: &str,
        spec: &str,
        net: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            spec: spec.to_string(),
            net: net.to_string(),
            parent: None,
            status: CaseStatus::Created,
            firings: 0,
            error: None,
            start_time: 0,
            end_time: 0,
            timestamp: utils::time::time_millis(),
        }
    }
}

/// Ledger entry of one work item: its latest state and every status it went through.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkItemRecord {
    pub item: WorkItem,
    pub history: Vec<WorkItemStatus>,
}

/// Keeps an in-memory ledger of cases and work items from the event channel.
pub struct Monitor {
    cases: Arc<MemCache<String, CaseRecord>>,
    work_items: Arc<MemCache<WorkItemId, WorkItemRecord>>,
    channel: Arc<Channel>,

    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Monitor {
    pub fn new(
        channel: Arc<Channel>,
        runtime: Arc<Runtime>,
        capacity: usize,
    ) -> Self {
        Self {
            cases: Arc::new(MemCache::new(capacity)),
            // cases hold several work items each
            work_items: Arc::new(MemCache::new(capacity.saturating_mul(16))),
            channel,
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Records a case that was created but not started yet.
    pub fn register(
        &self,
        record: CaseRecord,
    ) {
        self.cases.set(record.id.clone(), record);
    }

    pub fn case(
        &self,
        id: &str,
    ) -> Option<CaseRecord> {
        self.cases.get(&id.to_string())
    }

    pub fn work_item(
        &self,
        id: &str,
    ) -> Option<WorkItemRecord> {
        self.work_items.get(&id.to_string())
    }

    pub fn monitor(&self) {
        let cases = self.cases.clone();
        let work_items = self.work_items.clone();
        let mut event_queue = self.channel.event_queue().subscribe();
        let shutdown = self.shutdown.clone();

        self.runtime.spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.wait() => break,
                    event = event_queue.recv() => event,
                };
                let event = match event {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        info!(skipped, "monitor lagged behind the event channel");
                        continue;
                    }
                    Err(_) => break,
                };

                match &event.event {
                    CaseEvent::Case(e) => {
                        let now = utils::time::time_millis();
                        let record = cases.upsert(event.cid.clone(), |record| {
                            let mut record = record.unwrap_or_else(|| CaseRecord::new(&event.cid, "", ""));
                            match e {
                                CaseStatusEvent::Started(started) => {
                                    record.spec = started.spec.clone();
                                    record.net = started.net.clone();
                                    record.status = CaseStatus::Running;
                                    record.start_time = started.timestamp;
                                }
                                CaseStatusEvent::Completed(_) => record.status = CaseStatus::Completed,
                                CaseStatusEvent::Cancelled(_) => record.status = CaseStatus::Cancelled,
                                CaseStatusEvent::Failed(failed) => {
                                    record.status = CaseStatus::Failed;
                                    record.error = Some(failed.error.to_string());
                                }
                            }
                            if record.status.is_terminal() {
                                record.end_time = now;
                            }
                            record.timestamp = now;
                            record
                        });
                        info!(case = %event.cid, status = %record.status, "case status changed");
                    }
                    CaseEvent::WorkItem(e) => {
                        let item = e.item.clone();
                        debug!(case = %event.cid, task = %event.tid, work_item = %item.id, status = %item.status, "work item changed");
                        work_items.upsert(item.id.clone(), |record| {
                            let mut history = record.map(|r| r.history).unwrap_or_default();
                            history.push(item.status);
                            WorkItemRecord {
                                item,
                                history,
                            }
                        });
                    }
                    CaseEvent::Fired(result) => {
                        cases.upsert(event.cid.clone(), |record| {
                            let mut record = record.unwrap_or_else(|| CaseRecord::new(&event.cid, "", ""));
                            record.firings += 1;
                            record.timestamp = result.timestamp;
                            record
                        });
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        self.shutdown.shutdown();
    }
}
