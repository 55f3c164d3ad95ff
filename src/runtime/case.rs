use std::{sync::Arc, time::Duration};

use tokio::runtime::Runtime;

use crate::{
    CaseflowError, Result,
    common::{Queue, Vars},
    dispatcher::Dispatcher,
    engine::TimerService,
    runner::{CaseRunner, CaseSnapshot, EnabledTask, FiringResult, WorkItem},
    runtime::{CaseCommand, Channel, Envelope, Reply},
};

pub type CaseId = String;

/// How often a caller waiting for a reply checks whether the dispatcher stopped.
const REPLY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a running case.
///
/// Every call is a command on the case's queue, applied in order by the
/// case's dispatcher. The blocking calls must not be made from inside an
/// async task; use the `_async` variants there.
#[derive(Clone)]
pub struct Case {
    id: CaseId,
    spec: String,
    net: String,
    dispatcher: Arc<Dispatcher>,
    command_queue: Arc<Queue<Envelope>>,
}

impl std::fmt::Debug for Case {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Case").field("id", &self.id).field("spec", &self.spec).field("net", &self.net).finish_non_exhaustive()
    }
}

impl Case {
    pub(crate) fn new(
        runner: CaseRunner,
        channel: Arc<Channel>,
        timer: Arc<TimerService>,
        command_queue_size: usize,
        runtime: Arc<Runtime>,
    ) -> Arc<Case> {
        let id = runner.id().to_string();
        let spec = runner.spec().id().to_string();
        let net = runner.net().id().to_string();

        let command_queue = Queue::new(command_queue_size);
        let dispatcher = Arc::new(Dispatcher::new(runner, command_queue.clone(), channel, timer, runtime));
        dispatcher.start();

        Arc::new(Case {
            id,
            spec,
            net,
            dispatcher,
            command_queue,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Id of the specification the case was created from.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Id of the net the case runs.
    pub fn net(&self) -> &str {
        &self.net
    }

    /// Returns true once the case reached a terminal state and its
    /// dispatcher stopped.
    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_terminated()
    }

    pub(crate) fn stop(&self) {
        self.dispatcher.stop();
    }

    pub fn start(&self) -> Result<()> {
        self.request(CaseCommand::Start).map(|_| ())
    }

    pub async fn start_async(&self) -> Result<()> {
        self.request_async(CaseCommand::Start).await.map(|_| ())
    }

    pub fn fire(
        &self,
        task: &str,
    ) -> Result<FiringResult> {
        self.fire_with(task, Vars::new())
    }

    pub fn fire_with(
        &self,
        task: &str,
        outputs: Vars,
    ) -> Result<FiringResult> {
        let reply = self.request(CaseCommand::Fire {
            task: task.to_string(),
            outputs,
        })?;
        reply.firing()?.ok_or_else(|| CaseflowError::Case(format!("firing of {} returned no result", task)))
    }

    pub async fn fire_async(
        &self,
        task: &str,
        outputs: Vars,
    ) -> Result<FiringResult> {
        let reply = self
            .request_async(CaseCommand::Fire {
                task: task.to_string(),
                outputs,
            })
            .await?;
        reply.firing()?.ok_or_else(|| CaseflowError::Case(format!("firing of {} returned no result", task)))
    }

    pub fn start_work_item(
        &self,
        id: &str,
    ) -> Result<WorkItem> {
        self.request(CaseCommand::StartWorkItem {
            id: id.to_string(),
        })?
        .work_item()
    }

    /// Completes a work item. Returns the firing it caused, if any.
    pub fn complete_work_item(
        &self,
        id: &str,
        outputs: Vars,
    ) -> Result<Option<FiringResult>> {
        self.request(CaseCommand::CompleteWorkItem {
            id: id.to_string(),
            outputs,
        })?
        .firing()
    }

    pub async fn complete_work_item_async(
        &self,
        id: &str,
        outputs: Vars,
    ) -> Result<Option<FiringResult>> {
        self.request_async(CaseCommand::CompleteWorkItem {
            id: id.to_string(),
            outputs,
        })
        .await?
        .firing()
    }

    pub fn add_instance(
        &self,
        task: &str,
        data: Vars,
    ) -> Result<WorkItem> {
        self.request(CaseCommand::AddInstance {
            task: task.to_string(),
            data,
        })?
        .work_item()
    }

    pub fn cancel_work_item(
        &self,
        id: &str,
    ) -> Result<Option<FiringResult>> {
        self.request(CaseCommand::CancelWorkItem {
            id: id.to_string(),
        })?
        .firing()
    }

    pub async fn cancel_work_item_async(
        &self,
        id: &str,
    ) -> Result<Option<FiringResult>> {
        self.request_async(CaseCommand::CancelWorkItem {
            id: id.to_string(),
        })
        .await?
        .firing()
    }

    /// Cancels the whole case. Returns the places that held tokens.
    pub fn cancel(&self) -> Result<Vec<String>> {
        self.request(CaseCommand::Cancel)?.cancelled()
    }

    pub async fn cancel_async(&self) -> Result<Vec<String>> {
        self.request_async(CaseCommand::Cancel).await?.cancelled()
    }

    pub fn enabled(&self) -> Result<Vec<EnabledTask>> {
        self.request(CaseCommand::Enabled)?.enabled()
    }

    pub async fn enabled_async(&self) -> Result<Vec<EnabledTask>> {
        self.request_async(CaseCommand::Enabled).await?.enabled()
    }

    pub fn snapshot(&self) -> Result<CaseSnapshot> {
        self.request(CaseCommand::Snapshot)?.snapshot()
    }

    pub async fn snapshot_async(&self) -> Result<CaseSnapshot> {
        self.request_async(CaseCommand::Snapshot).await?.snapshot()
    }

    /// Sends a command and blocks until the dispatcher answers.
    pub fn request(
        &self,
        command: CaseCommand,
    ) -> Result<Reply> {
        if self.dispatcher.is_terminated() {
            return self.dispatcher.closed(command);
        }
        let (tx, rx) = flume::bounded(1);
        self.command_queue.send(Envelope::new(command.clone(), Some(tx)))?;
        loop {
            match rx.recv_timeout(REPLY_POLL_INTERVAL) {
                Ok(reply) => return reply.map_err(CaseflowError::from),
                // sent after the dispatcher drained its queue
                Err(flume::RecvTimeoutError::Timeout) if self.dispatcher.is_terminated() => return self.dispatcher.closed(command),
                Err(flume::RecvTimeoutError::Timeout) => continue,
                Err(e) => return Err(CaseflowError::Queue(e.to_string())),
            }
        }
    }

    pub async fn request_async(
        &self,
        command: CaseCommand,
    ) -> Result<Reply> {
        if self.dispatcher.is_terminated() {
            return self.dispatcher.closed(command);
        }
        let (tx, rx) = flume::bounded(1);
        self.command_queue.send_async(Envelope::new(command.clone(), Some(tx))).await?;
        loop {
            match tokio::time::timeout(REPLY_POLL_INTERVAL, rx.recv_async()).await {
                Ok(Ok(reply)) => return reply.map_err(CaseflowError::from),
                Ok(Err(e)) => return Err(CaseflowError::Queue(e.to_string())),
                Err(_) if self.dispatcher.is_terminated() => return self.dispatcher.closed(command),
                Err(_) => continue,
            }
        }
    }
}
