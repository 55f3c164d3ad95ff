//! Work-item deadline scheduler.
//!
//! Deadlines are delivered as `CancelWorkItem` commands on the owning
//! case's command queue, the same path a manual cancellation takes.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{runtime::Runtime, sync::Notify, time::Instant};
use tracing::debug;

use crate::{
    common::{Queue, Shutdown},
    runtime::{CaseCommand, Envelope},
    utils,
};

#[derive(Default)]
struct Deadlines {
    by_time: BTreeMap<(i64, String), Arc<Queue<Envelope>>>,
    by_id: HashMap<String, i64>,
}

impl Deadlines {
    fn insert(
        &mut self,
        id: &str,
        deadline: i64,
        queue: Arc<Queue<Envelope>>,
    ) {
        self.remove(id);
        self.by_time.insert((deadline, id.to_string()), queue);
        self.by_id.insert(id.to_string(), deadline);
    }

    fn remove(
        &mut self,
        id: &str,
    ) {
        if let Some(deadline) = self.by_id.remove(id) {
            self.by_time.remove(&(deadline, id.to_string()));
        }
    }

    fn next(&self) -> Option<i64> {
        self.by_time.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Removes and returns every entry due at `now`.
    fn expire(
        &mut self,
        now: i64,
    ) -> Vec<(String, Arc<Queue<Envelope>>)> {
        let mut due = Vec::new();
        while let Some(entry) = self.by_time.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, id), queue) = entry.remove_entry();
            self.by_id.remove(&id);
            due.push((id, queue));
        }
        due
    }
}

pub struct TimerService {
    deadlines: Mutex<Deadlines>,
    wake: Notify,
    running: AtomicBool,
    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl TimerService {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            deadlines: Mutex::new(Deadlines::default()),
            wake: Notify::new(),
            running: AtomicBool::new(false),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Starts the scheduling loop once.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }

        let timer = self.clone();
        self.runtime.spawn(async move {
            loop {
                let next = timer.next();
                let sleep = async move {
                    match next {
                        Some(deadline) => tokio::time::sleep_until(instant(deadline)).await,
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    _ = timer.shutdown.wait() => break,
                    _ = timer.wake.notified() => {}
                    _ = sleep => timer.expire(utils::time::time_millis()),
                }
            }
        });
    }

    pub fn stop(&self) {
        self.shutdown.shutdown();
    }

    /// Schedules, or reschedules, the deadline of a work item.
    pub(crate) fn schedule(
        &self,
        id: &str,
        deadline: i64,
        queue: Arc<Queue<Envelope>>,
    ) {
        if let Ok(mut deadlines) = self.deadlines.lock() {
            deadlines.insert(id, deadline, queue);
        }
        self.wake.notify_one();
    }

    pub fn unschedule(
        &self,
        id: &str,
    ) {
        if let Ok(mut deadlines) = self.deadlines.lock() {
            deadlines.remove(id);
        }
    }

    /// Number of pending deadlines.
    pub fn pending(&self) -> usize {
        self.deadlines.lock().map(|d| d.by_id.len()).unwrap_or_default()
    }

    fn next(&self) -> Option<i64> {
        self.deadlines.lock().ok().and_then(|d| d.next())
    }

    fn expire(
        &self,
        now: i64,
    ) {
        let due = match self.deadlines.lock() {
            Ok(mut deadlines) => deadlines.expire(now),
            Err(_) => return,
        };
        for (id, queue) in due {
            debug!(work_item = %id, "work item deadline expired");
            // a full command queue must not stall other deadlines
            self.runtime.spawn(async move {
                let _ = queue
                    .send_async(Envelope::new(
                        CaseCommand::CancelWorkItem {
                            id,
                        },
                        None,
                    ))
                    .await;
            });
        }
    }
}

fn instant(deadline: i64) -> Instant {
    Instant::now() + utils::time::until(deadline)
}
