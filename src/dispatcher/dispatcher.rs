//! Per-case command dispatcher.
//!
//! The dispatcher is the single writer of one case:
//! - It owns the case's `CaseRunner` inside one spawned task
//! - It applies commands from the case's queue strictly one at a time
//! - It publishes the runner's events to the channel after every command
//! - It keeps the timer service in step with work-item deadlines

use std::sync::{Arc, Mutex, RwLock};

use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::{
    FireError, Result,
    common::{Queue, Shutdown},
    engine::TimerService,
    events::{CaseEvent, Event},
    runner::{CaseRunner, CaseSnapshot},
    runtime::{CaseCommand, Channel, Envelope, Reply},
};

/// Case command dispatcher.
pub struct Dispatcher {
    cid: String,
    /// Taken by the dispatch task when it starts.
    runner: Mutex<Option<CaseRunner>>,
    /// Queue the case handle and the timer service send commands to.
    command_queue: Arc<Queue<Envelope>>,
    channel: Arc<Channel>,
    timer: Arc<TimerService>,
    runtime: Arc<Runtime>,
    /// State of the case when the dispatcher stopped.
    last: RwLock<Option<CaseSnapshot>>,
    shutdown: Arc<Shutdown>,
}

impl Dispatcher {
    pub(crate) fn new(
        runner: CaseRunner,
        command_queue: Arc<Queue<Envelope>>,
        channel: Arc<Channel>,
        timer: Arc<TimerService>,
        runtime: Arc<Runtime>,
    ) -> Self {
        Self {
            cid: runner.id().to_string(),
            runner: Mutex::new(Some(runner)),
            command_queue,
            channel,
            timer,
            runtime,
            last: RwLock::new(None),
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Spawns the dispatch loop. Calling it again is a no-op.
    ///
    /// The loop ends when the case reaches a terminal state or the
    /// dispatcher is stopped. Commands still queued at that point are
    /// answered from the final state.
    pub fn start(self: &Arc<Self>) {
        let Some(mut runner) = self.runner.lock().ok().and_then(|mut r| r.take()) else {
            return;
        };

        let dispatcher = self.clone();
        self.runtime.spawn(async move {
            debug!(case = %dispatcher.cid, "dispatcher started");
            loop {
                tokio::select! {
                    _ = dispatcher.shutdown.wait() => break,

                    envelope = dispatcher.command_queue.next_async() => {
                        let Some(envelope) = envelope else {
                            break;
                        };
                        dispatcher.serve(&mut runner, envelope);
                        if runner.status().is_terminal() {
                            break;
                        }
                    }
                }
            }

            if let Ok(mut last) = dispatcher.last.write() {
                *last = Some(runner.snapshot());
            }
            dispatcher.shutdown.shutdown();
            while let Some(envelope) = dispatcher.command_queue.try_next() {
                dispatcher.serve(&mut runner, envelope);
            }
            debug!(case = %dispatcher.cid, status = %runner.status(), "dispatcher stopped");
        });
    }

    /// Stops the dispatcher.
    pub fn stop(&self) {
        self.shutdown.shutdown();
    }

    /// Checks if the dispatcher has stopped serving commands.
    pub fn is_terminated(&self) -> bool {
        self.shutdown.is_terminated()
    }

    /// Answers a command after the dispatcher stopped.
    pub(crate) fn closed(
        &self,
        command: CaseCommand,
    ) -> Result<Reply> {
        let last = self.last.read().ok().and_then(|last| last.clone());
        match (command, last) {
            (CaseCommand::Snapshot, Some(snapshot)) => Ok(Reply::Snapshot(Box::new(snapshot))),
            (CaseCommand::Enabled, _) => Ok(Reply::Enabled(Vec::new())),
            (_, last) => Err(FireError::CaseNotRunning {
                status: last.map(|s| s.status.to_string()).unwrap_or_else(|| "stopped".to_string()),
            }
            .into()),
        }
    }

    fn serve(
        &self,
        runner: &mut CaseRunner,
        envelope: Envelope,
    ) {
        let Envelope {
            command,
            reply,
        } = envelope;
        debug!(case = %self.cid, command = command.as_ref(), "applying command");

        let result = Self::apply(runner, command);
        if let Err(e) = &result {
            if !e.is_fatal() {
                warn!(case = %self.cid, error = %e, "command rejected");
            }
        }
        self.publish(runner);

        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }

    fn apply(
        runner: &mut CaseRunner,
        command: CaseCommand,
    ) -> std::result::Result<Reply, FireError> {
        match command {
            CaseCommand::Start => runner.start().map(|_| Reply::Done),
            CaseCommand::Fire {
                task,
                outputs,
            } => runner.fire_with(&task, outputs).map(|result| Reply::Fired(Some(result))),
            CaseCommand::StartWorkItem {
                id,
            } => runner.start_work_item(&id).map(Reply::WorkItem),
            CaseCommand::CompleteWorkItem {
                id,
                outputs,
            } => runner.complete_work_item(&id, outputs).map(Reply::Fired),
            CaseCommand::AddInstance {
                task,
                data,
            } => runner.add_instance(&task, data).map(Reply::WorkItem),
            CaseCommand::CancelWorkItem {
                id,
            } => runner.cancel_work_item(&id).map(Reply::Fired),
            CaseCommand::Cancel => runner.cancel().map(Reply::Cancelled),
            CaseCommand::Enabled => Ok(Reply::Enabled(runner.enabled())),
            CaseCommand::Snapshot => Ok(Reply::Snapshot(Box::new(runner.snapshot()))),
        }
    }

    /// Sends the runner's pending events to the channel and schedules or
    /// clears work-item deadlines.
    fn publish(
        &self,
        runner: &mut CaseRunner,
    ) {
        let event_queue = self.channel.event_queue();
        for message in runner.drain_events() {
            if let CaseEvent::WorkItem(e) = &message.event {
                match (e.item.is_live(), e.item.deadline) {
                    (true, Some(deadline)) => self.timer.schedule(&e.item.id, deadline, self.command_queue.clone()),
                    (false, Some(_)) => self.timer.unschedule(&e.item.id),
                    _ => {}
                }
            }
            // no subscribers is not an error
            let _ = event_queue.send(Event::new(&message));
        }
    }
}
