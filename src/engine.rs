//! Case engine - the main entry point for Caseflow.
//!
//! The engine manages the lifecycle of specifications and cases, including:
//! - Deploying verified specifications
//! - Creating, starting and cancelling cases and sub-cases
//! - Managing the event channel, the ledger and the deadline timer
//! - Graceful shutdown coordination

mod monitor;
mod timer;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::{FutureExt, future::BoxFuture};
use tokio::runtime::{Builder, Runtime};
use tracing::{info, warn};

use crate::{
    CaseflowError, ChannelEvent, ChannelOptions, Config, FireError, Result,
    common::{MemCache, Queue, Shutdown, Vars},
    events::{CaseEvent, CaseStatusEvent, Event, Message},
    guard::GuardEvaluator,
    model::SpecificationModel,
    net::{Specification, TaskKind},
    resource::{NoAllocation, ResourceAllocator},
    runner::{CaseRunner, WorkItemId, WorkItemStatus},
    runtime::{Case, CaseId, Channel},
    utils,
};

pub use monitor::{CaseRecord, WorkItemRecord};
pub(crate) use timer::TimerService;

use monitor::Monitor;

/// Size of the queue for terminated case notifications.
const CASE_TERMINATED_QUEUE_SIZE: usize = 100;

/// The parent work item a sub-case reports to.
#[derive(Clone)]
struct Subcase {
    parent: Arc<Case>,
    work_item: WorkItemId,
}

/// The main case engine.
///
/// Engine is the central coordinator for Caseflow, responsible for:
/// - Managing the tokio runtime for async execution
/// - Coordinating the event channel for pub/sub messaging
/// - Holding deployed specifications and live cases
/// - Scheduling work-item deadlines
///
/// # Example
///
/// ```rust,ignore
/// let engine = Engine::new_with_config(Config::default())?;
/// engine.launch();
///
/// // Deploy a specification
/// engine.deploy(&spec_model)?;
///
/// // Create and run a case
/// let case = engine.create_case(&spec_model.id, Vars::new())?;
/// engine.start_case(&case)?;
///
/// // Shutdown when done
/// engine.shutdown();
/// ```
pub struct Engine {
    config: Config,
    /// Event channel for broadcasting case events.
    channel: Arc<Channel>,
    /// Background ledger of case and work-item records.
    monitor: Monitor,
    /// Work-item deadline scheduler.
    timer: Arc<TimerService>,
    /// Deployed specifications by id.
    specs: Arc<MemCache<String, Arc<Specification>>>,
    /// Queue for receiving case termination notifications.
    terminated_queue: Arc<Queue<CaseId>>,
    /// In-memory cache of live cases.
    cases: Arc<MemCache<CaseId, Arc<Case>>>,
    /// Running sub-cases by id.
    subcases: Arc<MemCache<CaseId, Subcase>>,
    /// Running sub-cases by the parent work item they run for.
    decompositions: Arc<MemCache<WorkItemId, Arc<Case>>>,
    /// Guard evaluator shared by every case, the built-in one if unset.
    guard: Option<Arc<dyn GuardEvaluator>>,
    allocator: Arc<dyn ResourceAllocator>,

    /// Flag indicating if the engine is running.
    running: Arc<AtomicBool>,
    /// Tokio runtime for async task execution.
    runtime: Arc<Runtime>,
    /// Shutdown coordinator for graceful termination.
    shutdown: Arc<Shutdown>,
}

impl Engine {
    /// Creates a new engine with the given configuration and its own runtime.
    pub fn new_with_config(config: Config) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.async_worker_thread_number.into())
            .enable_all()
            .build()
            .map_err(|e| CaseflowError::Engine(format!("failed to build runtime: {}", e)))?;
        Ok(Self::new(Arc::new(runtime), config, None, Arc::new(NoAllocation)))
    }

    pub(crate) fn new(
        runtime: Arc<Runtime>,
        config: Config,
        guard: Option<Arc<dyn GuardEvaluator>>,
        allocator: Arc<dyn ResourceAllocator>,
    ) -> Self {
        let channel = Arc::new(Channel::new(runtime.clone(), config.event_queue_size));
        let monitor = Monitor::new(channel.clone(), runtime.clone(), config.case_cache_size);
        let timer = Arc::new(TimerService::new(runtime.clone()));

        Self {
            channel,
            monitor,
            timer,
            specs: Arc::new(MemCache::new(config.case_cache_size)),
            terminated_queue: Queue::new(CASE_TERMINATED_QUEUE_SIZE),
            cases: Arc::new(MemCache::new(config.case_cache_size)),
            subcases: Arc::new(MemCache::new(config.case_cache_size)),
            decompositions: Arc::new(MemCache::new(config.case_cache_size)),
            guard,
            allocator,
            config,
            running: Arc::new(AtomicBool::new(false)),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Starts the engine and begins processing events.
    ///
    /// This method:
    /// - Starts the ledger monitor and the deadline timer
    /// - Begins listening on the event channel
    /// - Routes sub-case results to their parent work items
    /// - Spawns a background task dropping terminated cases from the cache
    pub fn launch(&self) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }

        // Register handlers first, then start listening
        self.monitor.monitor();
        self.timer.start();
        self.channel.listen();

        let terminated_queue = self.terminated_queue.clone();
        let runtime = self.runtime.clone();
        if let Ok(events) = ChannelEvent::channel(self.channel.clone(), ChannelOptions::default()) {
            events.on_terminated(move |cid, _| notify_terminated(&terminated_queue, &runtime, cid));

            let subcases = self.subcases.clone();
            let decompositions = self.decompositions.clone();
            events.on_event_async(move |e| route_subcase(&subcases, &decompositions, e));
        }

        let terminated_queue = self.terminated_queue.clone();
        let shutdown = self.shutdown.clone();
        let cases = self.cases.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some(cid) = terminated_queue.next_async() => {
                        cases.remove(&cid);
                    }
                }
            }
        });
        info!("engine launched");
    }

    /// Gracefully shuts down the engine.
    ///
    /// This method:
    /// - Signals all components to stop
    /// - Stops the dispatchers of all live cases
    /// - Shuts down the timer, the monitor and the event channel
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        self.shutdown.shutdown();
        for case in self.cases.values() {
            case.stop();
        }
        self.timer.stop();
        self.monitor.stop();
        self.channel.shutdown();
        info!("engine shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Verifies and deploys a specification, replacing any with the same id.
    pub fn deploy(
        &self,
        model: &SpecificationModel,
    ) -> Result<Arc<Specification>> {
        let spec = Arc::new(Specification::try_from(model)?);
        self.specs.set(spec.id().to_string(), spec.clone());
        info!(spec = %spec.id(), "specification deployed");
        Ok(spec)
    }

    pub fn specification(
        &self,
        id: &str,
    ) -> Option<Arc<Specification>> {
        self.specs.get(&id.to_string())
    }

    /// Creates a case of the root net of a deployed specification.
    ///
    /// The case is idle until started.
    pub fn create_case(
        &self,
        spec_id: &str,
        data: Vars,
    ) -> Result<Arc<Case>> {
        self.ensure_running()?;
        let spec = self.specification(spec_id).ok_or_else(|| CaseflowError::Engine(format!("specification {} is not deployed", spec_id)))?;
        let runner = CaseRunner::new(&utils::case_id(), spec, data);
        Ok(self.register(runner, None))
    }

    /// Starts a created case, seeding its input condition.
    pub fn start_case(
        &self,
        case: &Arc<Case>,
    ) -> Result<()> {
        self.ensure_running()?;
        case.start()
    }

    /// Runs the decomposition of a composite task of `parent` as a sub-case.
    ///
    /// The task's work item is started and receives the sub-case's input
    /// data. When the sub-case completes, its final data completes the work
    /// item; when it fails or is cancelled, the work item is cancelled.
    /// Cancelling the work item, or the parent case, cancels the sub-case.
    pub fn start_subcase(
        &self,
        parent: &Arc<Case>,
        task: &str,
    ) -> Result<Arc<Case>> {
        self.ensure_running()?;
        let spec = self.specification(parent.spec()).ok_or_else(|| CaseflowError::Engine(format!("specification {} is not deployed", parent.spec())))?;
        let decomposition = spec
            .net(parent.net())
            .and_then(|net| net.task(task))
            .and_then(|t| match &t.kind {
                TaskKind::Composite(composite) => composite.decomposition.clone(),
                _ => None,
            })
            .ok_or_else(|| CaseflowError::Case(format!("task {} of case {} is not a composite task", task, parent.id())))?;

        let snapshot = parent.snapshot()?;
        let item = snapshot.work_items.iter().find(|w| w.task == task && w.is_live() && !w.is_instance()).cloned().ok_or_else(|| {
            CaseflowError::Fire(FireError::NotEnabled {
                task: task.to_string(),
            })
        })?;
        if let Some(running) = self.decompositions.get(&item.id) {
            return Err(CaseflowError::Case(format!("work item {} already runs sub-case {}", item.id, running.id())));
        }
        let item = if item.status == WorkItemStatus::Enabled { parent.start_work_item(&item.id)? } else { item };

        let runner = CaseRunner::for_net(&utils::case_id(), spec.clone(), &decomposition, item.data.clone()).ok_or_else(|| {
            CaseflowError::Fire(FireError::MissingDecomposition {
                task: task.to_string(),
                decomposition: decomposition.clone(),
            })
        })?;
        let parent_id = parent.id().to_string();
        let subcase = self.register(runner, Some((parent_id.clone(), task.to_string())));
        self.subcases.set(
            subcase.id().to_string(),
            Subcase {
                parent: parent.clone(),
                work_item: item.id.clone(),
            },
        );
        self.decompositions.set(item.id.clone(), subcase.clone());

        if let Err(e) = subcase.start() {
            self.subcases.remove(&subcase.id().to_string());
            self.decompositions.remove(&item.id);
            return Err(e);
        }
        info!(case = %subcase.id(), parent = %parent_id, net = %decomposition, "sub-case started");
        Ok(subcase)
    }

    /// Cancels a live case. Returns the places that held tokens.
    pub fn cancel_case(
        &self,
        id: &str,
    ) -> Result<Vec<String>> {
        let case = self.get_case(id).ok_or_else(|| CaseflowError::Engine(format!("case {} not found", id)))?;
        case.cancel()
    }

    /// Gets a live case by its ID from the cache.
    pub fn get_case(
        &self,
        id: &str,
    ) -> Option<Arc<Case>> {
        self.cases.get(&id.to_string())
    }

    /// Latest recorded state of a work item.
    pub fn work_item(
        &self,
        id: &str,
    ) -> Option<WorkItemRecord> {
        self.monitor.work_item(id)
    }

    /// Latest recorded state of a case, terminated cases included.
    pub fn case_record(
        &self,
        id: &str,
    ) -> Option<CaseRecord> {
        self.monitor.case(id)
    }

    /// Returns a reference to the event channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    fn register(
        &self,
        runner: CaseRunner,
        parent: Option<(String, String)>,
    ) -> Arc<Case> {
        let runner = runner.with_config(self.config.runner.clone()).with_allocator(self.allocator.clone());
        let runner = match &self.guard {
            Some(guard) => runner.with_guard(guard.clone()),
            None => runner,
        };

        let mut record = CaseRecord::new(runner.id(), runner.spec().id(), runner.net().id());
        record.parent = parent;
        self.monitor.register(record);

        let case = Case::new(runner, self.channel.clone(), self.timer.clone(), self.config.command_queue_size, self.runtime.clone());
        self.cases.set(case.id().to_string(), case.clone());
        case
    }

    fn ensure_running(&self) -> Result<()> {
        if self.running.load(Ordering::Relaxed) { Ok(()) } else { Err(CaseflowError::Engine("Engine is not running".to_string())) }
    }
}

/// Queues a terminated case for eviction, waiting on the runtime instead of
/// dropping the notice when the queue is full.
fn notify_terminated(
    queue: &Arc<Queue<CaseId>>,
    runtime: &Runtime,
    cid: &str,
) {
    if queue.try_send(cid.to_string()).is_ok() {
        return;
    }
    warn!(case = %cid, "terminated queue full");
    let queue = queue.clone();
    let cid = cid.to_string();
    runtime.spawn(async move {
        if let Err(e) = queue.send_async(cid.clone()).await {
            warn!(case = %cid, error = %e, "terminated case notice dropped");
        }
    });
}

/// Applies a sub-case's outcome to its parent work item, and cancels a
/// sub-case whose parent work item ended first.
fn route_subcase(
    subcases: &MemCache<CaseId, Subcase>,
    decompositions: &MemCache<WorkItemId, Arc<Case>>,
    e: &Event<Message>,
) -> BoxFuture<'static, ()> {
    match &e.event {
        CaseEvent::Case(status) if e.event.is_terminal() => {
            let Some(Subcase {
                parent,
                work_item,
            }) = subcases.get(&e.cid)
            else {
                return async {}.boxed();
            };
            subcases.remove(&e.cid);
            decompositions.remove(&work_item);

            let outputs = match status {
                CaseStatusEvent::Completed(c) => Some(c.data.clone()),
                _ => None,
            };
            async move {
                let result = match outputs {
                    Some(outputs) => parent.complete_work_item_async(&work_item, outputs).await,
                    None => parent.cancel_work_item_async(&work_item).await,
                };
                if let Err(e) = result {
                    warn!(case = %parent.id(), work_item = %work_item, error = %e, "sub-case result not applied");
                }
            }
            .boxed()
        }
        CaseEvent::WorkItem(w) if !w.item.is_live() => {
            let Some(child) = decompositions.get(&w.item.id) else {
                return async {}.boxed();
            };
            decompositions.remove(&w.item.id);
            subcases.remove(&child.id().to_string());
            if child.is_closed() {
                return async {}.boxed();
            }
            async move {
                if let Err(e) = child.cancel_async().await {
                    warn!(case = %child.id(), error = %e, "sub-case not cancelled");
                }
            }
            .boxed()
        }
        _ => async {}.boxed(),
    }
}
