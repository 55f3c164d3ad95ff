//! The case runner.
//!
//! A `CaseRunner` owns the marking, data and work items of exactly one case
//! and is the only thing that mutates them. Every command is checked and
//! planned against the current state first; only a successful plan is
//! applied, so a rejected command never leaves partial state behind.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    FireError, GuardOutcome, RunnerConfig,
    common::Vars,
    events::{CaseCancelledEvent, CaseCompletedEvent, CaseEvent, CaseFailedEvent, CaseStartedEvent, CaseStatusEvent, Message, WorkItemEvent},
    guard::{ConditionEvaluator, GuardEvaluator},
    net::{CreationMode, Net, Specification, Task, TaskKind},
    resource::{NoAllocation, ResourceAllocator},
    runner::{
        EnableMode, EnabledTask, FiringResult, Marking, WorkItem, WorkItemId, WorkItemStatus, cancellation, enablement,
        firing::{bind_inputs, bind_outputs, split_targets},
        multi_instance::{InstanceSet, instance_inputs, joined_output},
    },
    utils,
};

/// Case lifecycle state. Terminal states are absorbing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    Created,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl CaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Completed | CaseStatus::Cancelled | CaseStatus::Failed)
    }
}

/// Point-in-time copy of a case's state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CaseSnapshot {
    pub id: String,
    pub net: String,
    pub status: CaseStatus,
    pub marking: Marking,
    pub data: Vars,
    pub enabled: Vec<EnabledTask>,
    /// live work items, instances included
    pub work_items: Vec<WorkItem>,
    pub error: Option<FireError>,
}

/// Everything a firing will do, computed without mutating the case.
struct Plan {
    task: Task,
    enabled: EnabledTask,
    outputs: Vars,
    data: Vars,
    produced: Vec<String>,
    guards: Vec<GuardOutcome>,
    /// inputs of the instances to create, multi-instance start only
    instances: Option<Vec<Vars>>,
    decomposition: Option<String>,
}

pub struct CaseRunner {
    id: String,
    spec: Arc<Specification>,
    net: Arc<Net>,
    status: CaseStatus,
    marking: Marking,
    data: Vars,
    work_items: BTreeMap<WorkItemId, WorkItem>,
    /// live work item of each enabled task
    live: BTreeMap<String, WorkItemId>,
    /// instance sets of busy multi-instance tasks
    instances: BTreeMap<String, InstanceSet>,
    guard: Arc<dyn GuardEvaluator>,
    allocator: Arc<dyn ResourceAllocator>,
    config: RunnerConfig,
    outbox: Vec<Message>,
    error: Option<FireError>,
}

impl CaseRunner {
    /// A case of the root net of `spec`.
    pub fn new(
        id: &str,
        spec: Arc<Specification>,
        data: Vars,
    ) -> Self {
        let net = spec.root().clone();
        Self::with_net(id, spec, net, data)
    }

    /// A case of the net `net` of `spec`, used for sub-cases running a
    /// decomposition. `None` if `spec` has no such net.
    pub fn for_net(
        id: &str,
        spec: Arc<Specification>,
        net: &str,
        data: Vars,
    ) -> Option<Self> {
        let net = spec.net(net)?.clone();
        Some(Self::with_net(id, spec, net, data))
    }

    fn with_net(
        id: &str,
        spec: Arc<Specification>,
        net: Arc<Net>,
        mut data: Vars,
    ) -> Self {
        for variable in net.variables() {
            if let Some(initial) = &variable.initial {
                if !data.contains(&variable.name) {
                    data.set(&variable.name, initial);
                }
            }
        }
        let guard = Arc::new(ConditionEvaluator::new(spec.env().clone()));

        Self {
            id: id.to_string(),
            spec,
            net,
            status: CaseStatus::Created,
            marking: Marking::new(),
            data,
            work_items: BTreeMap::new(),
            live: BTreeMap::new(),
            instances: BTreeMap::new(),
            guard,
            allocator: Arc::new(NoAllocation),
            config: RunnerConfig::default(),
            outbox: Vec::new(),
            error: None,
        }
    }

    pub fn with_guard(
        mut self,
        guard: Arc<dyn GuardEvaluator>,
    ) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_allocator(
        mut self,
        allocator: Arc<dyn ResourceAllocator>,
    ) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn with_config(
        mut self,
        config: RunnerConfig,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn net(&self) -> &Arc<Net> {
        &self.net
    }

    pub fn spec(&self) -> &Arc<Specification> {
        &self.spec
    }

    pub fn status(&self) -> CaseStatus {
        self.status
    }

    pub fn marking(&self) -> &Marking {
        &self.marking
    }

    pub fn data(&self) -> &Vars {
        &self.data
    }

    /// The fatal error that failed the case, if any.
    pub fn error(&self) -> Option<&FireError> {
        self.error.as_ref()
    }

    pub fn work_item(
        &self,
        id: &str,
    ) -> Option<&WorkItem> {
        self.work_items.get(id)
    }

    /// Every work item of the case, terminal ones included.
    pub fn work_items(&self) -> impl Iterator<Item = &WorkItem> {
        self.work_items.values()
    }

    pub fn live_work_items(&self) -> impl Iterator<Item = &WorkItem> {
        self.work_items.values().filter(|w| w.is_live())
    }

    /// Takes the events recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbox)
    }

    pub fn snapshot(&self) -> CaseSnapshot {
        CaseSnapshot {
            id: self.id.clone(),
            net: self.net.id().to_string(),
            status: self.status,
            marking: self.marking.clone(),
            data: self.data.clone(),
            enabled: self.enabled(),
            work_items: self.live_work_items().cloned().collect(),
            error: self.error.clone(),
        }
    }

    /// Tasks that may fire now. Empty unless the case is running.
    pub fn enabled(&self) -> Vec<EnabledTask> {
        if self.status != CaseStatus::Running {
            return Vec::new();
        }
        let mut ready: BTreeSet<String> = self.instances.iter().filter(|(_, set)| set.ready(&self.work_items)).map(|(task, _)| task.clone()).collect();
        ready.extend(self.live.keys().filter(|task| self.marking.is_marked(task)).cloned());
        enablement::evaluate(&self.net, &self.marking, &ready)
    }

    /// Seeds the input condition and moves the case to `Running`.
    pub fn start(&mut self) -> Result<(), FireError> {
        if self.status != CaseStatus::Created {
            return Err(self.not_running());
        }
        self.status = CaseStatus::Running;
        self.marking = Marking::seeded(self.net.input());
        info!(case = %self.id, net = %self.net.id(), "case started");

        let event = CaseStatusEvent::Started(CaseStartedEvent {
            spec: self.spec.id().to_string(),
            net: self.net.id().to_string(),
            timestamp: utils::time::time_millis(),
        });
        self.emit("", CaseEvent::Case(event));
        self.settle();
        Ok(())
    }

    pub fn fire(
        &mut self,
        task: &str,
    ) -> Result<FiringResult, FireError> {
        self.fire_with(task, Vars::new())
    }

    /// Fires `task`, writing `outputs` into the case data through the task's
    /// output bindings before its split guards are evaluated.
    pub fn fire_with(
        &mut self,
        task: &str,
        outputs: Vars,
    ) -> Result<FiringResult, FireError> {
        self.ensure_running()?;
        let enabled = self.enabled_entry(task)?;
        let result = self.fire_enabled(enabled, outputs)?;
        self.settle();
        Ok(result)
    }

    /// Moves an enabled work item to `Started`.
    ///
    /// Starting the work item of an atomic or composite task consumes its
    /// join inputs into a busy token at the task, so the task is no longer
    /// offered and a cancellation set naming it withdraws the work. The task
    /// fires from that token when the work item completes.
    pub fn start_work_item(
        &mut self,
        id: &str,
    ) -> Result<WorkItem, FireError> {
        self.ensure_running()?;
        let item = self.live_item(id)?;
        let net = self.net.clone();
        let Some(task) = net.task(&item.task) else {
            return Err(FireError::UnknownTask {
                task: item.task.clone(),
            });
        };
        if let TaskKind::Composite(composite) = &task.kind {
            let checked = self.check_decomposition(&item.task, composite.decomposition.as_deref());
            self.guarded(checked)?;
        }
        let busy = !item.is_instance() && item.status == WorkItemStatus::Enabled && task.multi_instance().is_none();
        if !busy {
            return self.transition(id, WorkItemStatus::Started);
        }

        let enabled = self.enabled_entry(&item.task)?;
        let started = self.transition(id, WorkItemStatus::Started)?;
        for place in enabled.inputs.iter() {
            self.marking.remove(place);
        }
        self.marking.add(&item.task, 1);
        debug!(case = %self.id, task = %item.task, work_item = %id, consumed = ?enabled.inputs, "task started");
        self.settle();
        Ok(started)
    }

    /// Completes a live work item.
    ///
    /// An instance of a multi-instance task records its outputs and counts
    /// towards the threshold; any other work item fires its task with
    /// `outputs` and returns the firing.
    pub fn complete_work_item(
        &mut self,
        id: &str,
        outputs: Vars,
    ) -> Result<Option<FiringResult>, FireError> {
        self.ensure_running()?;
        let item = self.live_item(id)?;
        if !item.is_instance() {
            return self.fire_with(&item.task, outputs).map(Some);
        }

        if let Some(w) = self.work_items.get_mut(id) {
            w.outputs = outputs;
        }
        self.transition(id, WorkItemStatus::Completed)?;
        debug!(case = %self.id, task = %item.task, work_item = %id, "instance completed");
        self.settle();
        Ok(None)
    }

    /// Adds an instance to a running dynamic multi-instance task.
    pub fn add_instance(
        &mut self,
        task: &str,
        data: Vars,
    ) -> Result<WorkItem, FireError> {
        self.ensure_running()?;
        let net = self.net.clone();
        let Some(task) = net.task(task) else {
            return Err(FireError::UnknownTask {
                task: task.to_string(),
            });
        };
        if task.multi_instance().map(|mi| mi.creation) != Some(CreationMode::Dynamic) {
            return Err(FireError::NotDynamic {
                task: task.id.clone(),
            });
        }
        let Some(set) = self.instances.get(&task.id) else {
            return Err(FireError::NotEnabled {
                task: task.id.clone(),
            });
        };
        if set.items.len() >= set.max {
            return Err(FireError::InstanceLimit {
                task: task.id.clone(),
                max: set.max,
            });
        }

        let index = set.items.len();
        let id = self.create_work_item(task, Some(index), WorkItemStatus::Started, data);
        if let Some(set) = self.instances.get_mut(&task.id) {
            set.items.push(id.clone());
        }
        debug!(case = %self.id, task = %task.id, instance = index, "instance added");
        self.live_item(&id)
    }

    /// Cancels a live work item.
    ///
    /// A cancelled instance stops counting towards its task; if a static
    /// task can then no longer reach its threshold the case fails. Any other
    /// work item voids its task: the join inputs are consumed and nothing is
    /// produced.
    pub fn cancel_work_item(
        &mut self,
        id: &str,
    ) -> Result<Option<FiringResult>, FireError> {
        self.ensure_running()?;
        let item = self.live_item(id)?;

        if item.is_instance() {
            self.transition(id, WorkItemStatus::Cancelled)?;
            let threshold = self.instances.get(&item.task).filter(|set| set.unreachable(&self.work_items)).map(|set| set.threshold);
            if let Some(threshold) = threshold {
                self.fail(FireError::ThresholdUnreachable {
                    task: item.task.clone(),
                    threshold,
                });
            } else {
                self.settle();
            }
            return Ok(None);
        }

        let enabled = self.enabled_entry(&item.task)?;
        let consumed = enabled.inputs.clone();
        for place in consumed.iter() {
            self.marking.remove(place);
        }
        self.live.remove(&item.task);
        self.transition(id, WorkItemStatus::Cancelled)?;

        let result = FiringResult {
            task: item.task.clone(),
            mode: enabled.mode,
            work_item: None,
            consumed,
            produced: Vec::new(),
            cancelled: Vec::new(),
            cancelled_tokens: 0,
            cancelled_work_items: vec![id.to_string()],
            guards: Vec::new(),
            completed: false,
            decomposition: None,
            timestamp: utils::time::time_millis(),
        };
        debug!(case = %self.id, task = %item.task, work_item = %id, "task voided");
        self.emit(&item.task, CaseEvent::Fired(result.clone()));
        self.settle();
        Ok(Some(result))
    }

    /// Voids the whole case: every token is removed and every live work item cancelled.
    pub fn cancel(&mut self) -> Result<Vec<String>, FireError> {
        self.ensure_running()?;
        let places: Vec<String> = self.marking.places().map(str::to_string).collect();
        let removed = cancellation::cancel(&places, &mut self.marking);
        self.terminate_live(WorkItemStatus::Cancelled);
        self.status = CaseStatus::Cancelled;
        info!(case = %self.id, removed = removed.len(), "case cancelled");

        let event = CaseStatusEvent::Cancelled(CaseCancelledEvent {
            removed: removed.clone(),
            timestamp: utils::time::time_millis(),
        });
        self.emit("", CaseEvent::Case(event));
        Ok(removed)
    }

    fn fire_enabled(
        &mut self,
        enabled: EnabledTask,
        outputs: Vars,
    ) -> Result<FiringResult, FireError> {
        let plan = self.plan(enabled, outputs);
        let plan = self.guarded(plan)?;
        Ok(self.apply(plan))
    }

    fn plan(
        &self,
        enabled: EnabledTask,
        outputs: Vars,
    ) -> Result<Plan, FireError> {
        let task = self.task(&enabled.task)?.clone();
        let mut data = self.data.clone();
        bind_outputs(&task, &mut data, &outputs);

        let mut instances = None;
        let mut decomposition = None;
        let (produced, guards) = match (enabled.mode, &task.kind) {
            (EnableMode::Join, TaskKind::MultiInstance(mi)) => {
                if let Some(sub) = mi.decomposition.as_deref() {
                    decomposition = Some(self.check_decomposition(&task.id, Some(sub))?);
                }
                instances = Some(instance_inputs(&task, mi, &data)?);
                (vec![task.id.clone()], Vec::new())
            }
            (EnableMode::Synchronize, kind) => {
                if let (TaskKind::MultiInstance(mi), Some(set)) = (kind, self.instances.get(&task.id)) {
                    if let Some(var) = mi.joining.as_deref() {
                        data.set(var, joined_output(var, set, &self.work_items));
                    }
                }
                if let TaskKind::Composite(composite) = kind {
                    decomposition = Some(self.check_decomposition(&task.id, composite.decomposition.as_deref())?);
                }
                split_targets(&self.net, &task, self.guard.as_ref(), &data)?
            }
            (EnableMode::Join, kind) => {
                if let TaskKind::Composite(composite) = kind {
                    decomposition = Some(self.check_decomposition(&task.id, composite.decomposition.as_deref())?);
                }
                split_targets(&self.net, &task, self.guard.as_ref(), &data)?
            }
        };

        Ok(Plan {
            task,
            enabled,
            outputs,
            data,
            produced,
            guards,
            instances,
            decomposition,
        })
    }

    /// Applies a plan: consume, cancel, produce. Cannot fail.
    fn apply(
        &mut self,
        plan: Plan,
    ) -> FiringResult {
        let Plan {
            task,
            enabled,
            outputs,
            data,
            produced,
            guards,
            instances,
            decomposition,
        } = plan;

        for place in enabled.inputs.iter() {
            self.marking.remove(place);
        }

        // instances of a multi-instance task are settled below
        let work_item = if self.instances.contains_key(&task.id) { None } else { self.live.remove(&task.id) };
        if let Some(id) = &work_item {
            if let Some(w) = self.work_items.get_mut(id) {
                w.outputs = outputs;
            }
            let _ = self.transition(id, WorkItemStatus::Completed);
        }

        // a multi-instance task applies its cancellation set when it synchronizes
        let mut cancelled_work_items = Vec::new();
        let (cancelled, cancelled_tokens) = if instances.is_none() {
            self.cancel_region(&task, &mut cancelled_work_items)
        } else {
            (Vec::new(), 0)
        };

        for place in produced.iter() {
            self.marking.add(place, 1);
        }
        self.data = data;

        match (enabled.mode, instances) {
            (EnableMode::Join, Some(inputs)) => self.create_instances(&task, inputs),
            (EnableMode::Synchronize, _) => {
                if let Some(set) = self.instances.remove(&task.id) {
                    for id in set.live(&self.work_items) {
                        if self.transition(&id, WorkItemStatus::Cancelled).is_ok() {
                            cancelled_work_items.push(id);
                        }
                    }
                }
            }
            _ => {}
        }
        cancelled_work_items.extend(self.withdraw());

        let result = FiringResult {
            task: task.id.clone(),
            mode: enabled.mode,
            work_item,
            consumed: enabled.inputs,
            produced,
            cancelled,
            cancelled_tokens,
            cancelled_work_items,
            guards,
            completed: self.marking.holds_only(self.net.output()),
            decomposition,
            timestamp: utils::time::time_millis(),
        };
        debug!(case = %self.id, task = %task.id, mode = enabled.mode.as_ref(), consumed = ?result.consumed, produced = ?result.produced, cancelled = ?result.cancelled, "task fired");
        self.emit(&task.id, CaseEvent::Fired(result.clone()));
        result
    }

    /// Removes the tokens of the task's cancellation set and cancels the work
    /// items of the busy tasks it names.
    fn cancel_region(
        &mut self,
        task: &Task,
        cancelled_work_items: &mut Vec<WorkItemId>,
    ) -> (Vec<String>, usize) {
        if task.cancellation_set.is_empty() {
            return (Vec::new(), 0);
        }
        let (_, tokens) = cancellation::removable(&task.cancellation_set, &self.marking);
        let places = cancellation::cancel(&task.cancellation_set, &mut self.marking);

        // a task named by the set loses its work only if it held a busy token
        for id in places.iter().filter(|id| **id != task.id) {
            let mut items: Vec<WorkItemId> = self.instances.remove(id).map(|set| set.live(&self.work_items)).unwrap_or_default();
            items.extend(self.live.remove(id));
            for item in items {
                if self.transition(&item, WorkItemStatus::Cancelled).is_ok() {
                    cancelled_work_items.push(item);
                }
            }
        }
        (places, tokens)
    }

    fn create_instances(
        &mut self,
        task: &Task,
        inputs: Vec<Vars>,
    ) {
        let Some(mi) = task.multi_instance() else {
            return;
        };
        let mut set = InstanceSet::new(mi, inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let id = self.create_work_item(task, Some(index), WorkItemStatus::Started, input);
            set.items.push(id);
        }
        debug!(case = %self.id, task = %task.id, instances = set.items.len(), threshold = set.threshold, "instances created");
        self.instances.insert(task.id.clone(), set);
    }

    /// Brings work items in line with enablement, auto-fires skippable
    /// tasks, and detects completion and deadlock.
    fn settle(&mut self) {
        let mut fires = 0;
        while self.status == CaseStatus::Running {
            self.withdraw();
            if self.marking.holds_only(self.net.output()) {
                self.complete();
                return;
            }
            self.offer();

            let skip = match self.next_skip() {
                Ok(skip) => skip,
                Err(e) => {
                    self.fail(e);
                    return;
                }
            };
            let Some(enabled) = skip else {
                break;
            };
            if fires >= self.config.max_auto_fires {
                warn!(case = %self.id, task = %enabled.task, limit = self.config.max_auto_fires, "auto fire limit reached");
                break;
            }
            fires += 1;
            debug!(case = %self.id, task = %enabled.task, "skipping task");
            if self.fire_enabled(enabled, Vars::new()).is_err() {
                return;
            }
        }

        if self.status == CaseStatus::Running && self.instances.is_empty() && self.enabled().is_empty() {
            let places = self.marking.places().map(str::to_string).collect();
            self.fail(FireError::Deadlocked {
                places,
            });
        }
    }

    /// Cancels the work items of tasks that lost enablement.
    fn withdraw(&mut self) -> Vec<WorkItemId> {
        let enabled: BTreeSet<String> = self.enabled().into_iter().map(|e| e.task).collect();
        let stale: Vec<(String, WorkItemId)> = self.live.iter().filter(|(task, _)| !enabled.contains(*task)).map(|(t, id)| (t.clone(), id.clone())).collect();

        let mut withdrawn = Vec::new();
        for (task, id) in stale {
            self.live.remove(&task);
            if self.transition(&id, WorkItemStatus::Cancelled).is_ok() {
                debug!(case = %self.id, task = %task, work_item = %id, "work item withdrawn");
                withdrawn.push(id);
            }
        }
        withdrawn
    }

    /// Creates a work item for every enabled task that has none.
    fn offer(&mut self) {
        let net = self.net.clone();
        for enabled in self.enabled() {
            if enabled.mode != EnableMode::Join || self.live.contains_key(&enabled.task) {
                continue;
            }
            let Some(task) = net.task(&enabled.task) else {
                continue;
            };
            let data = bind_inputs(task, &self.data);
            let id = self.create_work_item(task, None, WorkItemStatus::Enabled, data);
            self.live.insert(task.id.clone(), id);
        }
    }

    /// First enabled task whose skip predicate holds.
    fn next_skip(&self) -> Result<Option<EnabledTask>, FireError> {
        for enabled in self.enabled() {
            let Some(predicate) = self.net.task(&enabled.task).and_then(|t| t.skip()) else {
                continue;
            };
            if enabled.mode != EnableMode::Join {
                continue;
            }
            let skip = self.guard.evaluate(predicate, &self.data).map_err(|e| FireError::Guard {
                task: enabled.task.clone(),
                predicate: predicate.to_string(),
                message: e.to_string(),
            })?;
            if skip {
                return Ok(Some(enabled));
            }
        }
        Ok(None)
    }

    fn create_work_item(
        &mut self,
        task: &Task,
        instance: Option<usize>,
        status: WorkItemStatus,
        data: Vars,
    ) -> WorkItemId {
        let mut item = WorkItem::new(&self.id, &task.id, instance, status, data);
        if let Some(resourcing) = task.resourced().and_then(|r| r.resourcing()) {
            item.participant = self.allocator.allocate(&item, resourcing);
        }
        if let Some(timeout) = task.timeout() {
            item.deadline = Some(utils::time::deadline(item.created_at, timeout));
        }

        let id = item.id.clone();
        self.emit(
            &task.id,
            CaseEvent::WorkItem(WorkItemEvent {
                item: item.clone(),
            }),
        );
        self.work_items.insert(id.clone(), item);
        id
    }

    fn transition(
        &mut self,
        id: &str,
        status: WorkItemStatus,
    ) -> Result<WorkItem, FireError> {
        let Some(item) = self.work_items.get_mut(id) else {
            return Err(FireError::UnknownWorkItem {
                id: id.to_string(),
            });
        };
        item.transition(status)?;
        let item = item.clone();
        self.emit(
            &item.task,
            CaseEvent::WorkItem(WorkItemEvent {
                item: item.clone(),
            }),
        );
        Ok(item)
    }

    fn complete(&mut self) {
        self.status = CaseStatus::Completed;
        info!(case = %self.id, "case completed");
        let event = CaseStatusEvent::Completed(CaseCompletedEvent {
            data: self.data.clone(),
            timestamp: utils::time::time_millis(),
        });
        self.emit("", CaseEvent::Case(event));
    }

    fn fail(
        &mut self,
        error: FireError,
    ) {
        if self.status.is_terminal() {
            return;
        }
        warn!(case = %self.id, error = %error, "case failed");
        self.terminate_live(WorkItemStatus::Failed);
        self.status = CaseStatus::Failed;
        self.error = Some(error.clone());
        let event = CaseStatusEvent::Failed(CaseFailedEvent {
            error,
            timestamp: utils::time::time_millis(),
        });
        self.emit("", CaseEvent::Case(event));
    }

    fn terminate_live(
        &mut self,
        status: WorkItemStatus,
    ) {
        let live: Vec<WorkItemId> = self.live_work_items().map(|w| w.id.clone()).collect();
        for id in live {
            let _ = self.transition(&id, status);
        }
        self.live.clear();
        self.instances.clear();
    }

    /// Fails the case on a fatal error, passing the error through.
    fn guarded<T>(
        &mut self,
        result: Result<T, FireError>,
    ) -> Result<T, FireError> {
        if let Err(e) = &result {
            if e.is_fatal() {
                self.fail(e.clone());
            }
        }
        result
    }

    fn check_decomposition(
        &self,
        task: &str,
        decomposition: Option<&str>,
    ) -> Result<String, FireError> {
        match decomposition {
            Some(sub) if self.spec.net(sub).is_some() => Ok(sub.to_string()),
            other => Err(FireError::MissingDecomposition {
                task: task.to_string(),
                decomposition: other.unwrap_or_default().to_string(),
            }),
        }
    }

    fn task(
        &self,
        id: &str,
    ) -> Result<&Task, FireError> {
        self.net.task(id).ok_or_else(|| FireError::UnknownTask {
            task: id.to_string(),
        })
    }

    fn enabled_entry(
        &self,
        task: &str,
    ) -> Result<EnabledTask, FireError> {
        self.task(task)?;
        self.enabled().into_iter().find(|e| e.task == task).ok_or_else(|| FireError::NotEnabled {
            task: task.to_string(),
        })
    }

    fn live_item(
        &self,
        id: &str,
    ) -> Result<WorkItem, FireError> {
        let item = self.work_items.get(id).ok_or_else(|| FireError::UnknownWorkItem {
            id: id.to_string(),
        })?;
        if !item.is_live() {
            return Err(FireError::InvalidWorkItemState {
                id: id.to_string(),
                status: item.status.to_string(),
                expected: "enabled or started".to_string(),
            });
        }
        Ok(item.clone())
    }

    fn ensure_running(&self) -> Result<(), FireError> {
        if self.status == CaseStatus::Running { Ok(()) } else { Err(self.not_running()) }
    }

    fn not_running(&self) -> FireError {
        FireError::CaseNotRunning {
            status: self.status.to_string(),
        }
    }

    fn emit(
        &mut self,
        tid: &str,
        event: CaseEvent,
    ) {
        self.outbox.push(Message {
            cid: self.id.clone(),
            tid: tid.to_string(),
            event,
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::{model::SpecificationModel, resource::FirstOffered};

    pub(crate) fn spec(nets: Value) -> Arc<Specification> {
        let model: SpecificationModel = serde_json::from_value(json!({ "id": "spec", "root": "main", "nets": nets })).unwrap();
        Arc::new(Specification::try_from(&model).unwrap())
    }

    fn runner(
        net: Value,
        data: Vars,
    ) -> CaseRunner {
        let mut runner = CaseRunner::new("case-1", spec(json!([net])), data);
        runner.start().unwrap();
        runner
    }

    fn names(runner: &CaseRunner) -> Vec<String> {
        runner.enabled().into_iter().map(|e| e.task).collect()
    }

    fn live_item(
        runner: &CaseRunner,
        task: &str,
    ) -> WorkItemId {
        runner.live_work_items().find(|w| w.task == task && !w.is_instance()).map(|w| w.id.clone()).unwrap()
    }

    fn instances(
        runner: &CaseRunner,
        task: &str,
    ) -> Vec<WorkItemId> {
        let mut items: Vec<&WorkItem> = runner.work_items().filter(|w| w.task == task && w.is_instance()).collect();
        items.sort_by_key(|w| w.instance);
        items.into_iter().map(|w| w.id.clone()).collect()
    }

    fn sequence() -> Value {
        json!({
            "id": "main", "input": "start", "output": "end",
            "tasks": [{ "id": "A" }, { "id": "B" }, { "id": "C" }],
            "flows": [
                { "source": "start", "target": "A" },
                { "source": "A", "target": "B" },
                { "source": "B", "target": "C" },
                { "source": "C", "target": "end" }
            ]
        })
    }

    #[test]
    fn test_sequence() {
        let mut runner = runner(sequence(), Vars::new());
        assert_eq!(runner.marking(), &Marking::seeded("start"));
        assert_eq!(names(&runner), vec!["A"]);

        let result = runner.fire("A").unwrap();
        assert_eq!(result.consumed, vec!["start"]);
        assert_eq!(result.produced, vec!["A__B"]);
        assert_eq!(runner.marking(), &Marking::seeded("A__B"));

        runner.fire("B").unwrap();
        let result = runner.fire("C").unwrap();
        assert!(result.completed);
        assert_eq!(runner.status(), CaseStatus::Completed);
        assert_eq!(runner.marking(), &Marking::seeded("end"));
        assert!(runner.enabled().is_empty());

        let events = runner.drain_events();
        assert!(matches!(events.first().map(|m| &m.event), Some(CaseEvent::Case(CaseStatusEvent::Started(_)))));
        assert!(events.last().map(|m| m.event.is_complete()).unwrap_or(false));
        assert_eq!(events.iter().filter(|m| matches!(m.event, CaseEvent::Fired(_))).count(), 3);
        assert!(runner.drain_events().is_empty());
    }

    #[test]
    fn test_parallel_split_and_synchronization() {
        let mut runner = runner(
            json!({
                "id": "main", "input": "start", "output": "end",
                "tasks": [{ "id": "A", "split": "and" }, { "id": "B" }, { "id": "C" }, { "id": "D", "join": "and" }],
                "flows": [
                    { "source": "start", "target": "A" },
                    { "source": "A", "target": "B" },
                    { "source": "A", "target": "C" },
                    { "source": "B", "target": "D" },
                    { "source": "C", "target": "D" },
                    { "source": "D", "target": "end" }
                ]
            }),
            Vars::new(),
        );

        let result = runner.fire("A").unwrap();
        assert_eq!(result.produced, vec!["A__B", "A__C"]);
        assert_eq!(names(&runner), vec!["B", "C"]);

        runner.fire("B").unwrap();
        assert_eq!(names(&runner), vec!["C"]);
        assert_eq!(runner.fire("D").unwrap_err(), FireError::NotEnabled { task: "D".to_string() });

        runner.fire("C").unwrap();
        let result = runner.fire("D").unwrap();
        assert_eq!(result.consumed, vec!["B__D", "C__D"]);
        assert_eq!(result.produced, vec!["end"]);
        assert_eq!(runner.status(), CaseStatus::Completed);
    }

    fn exclusive_choice() -> Value {
        json!({
            "id": "main", "input": "start", "output": "end",
            "tasks": [{ "id": "A", "split": "xor" }, { "id": "B" }, { "id": "C" }, { "id": "D", "join": "xor" }],
            "flows": [
                { "source": "start", "target": "A" },
                { "source": "A", "target": "B", "predicate": "route_b" },
                { "source": "A", "target": "C", "default": true },
                { "source": "B", "target": "D" },
                { "source": "C", "target": "D" },
                { "source": "D", "target": "end" }
            ]
        })
    }

    #[test]
    fn test_exclusive_choice() {
        let mut runner = runner(exclusive_choice(), Vars::new().with("route_b", true));
        let result = runner.fire("A").unwrap();
        assert_eq!(result.produced, vec!["A__B"]);
        assert_eq!(
            result.guards,
            vec![GuardOutcome {
                target: "A__B".to_string(),
                predicate: Some("route_b".to_string()),
                value: true,
            }]
        );

        let mut seen = Vec::new();
        while runner.status() == CaseStatus::Running {
            let next = runner.enabled().remove(0).task;
            runner.fire(&next).unwrap();
            seen.push(next);
        }
        assert_eq!(seen, vec!["B", "D"]);
        assert_eq!(runner.status(), CaseStatus::Completed);

        let mut runner = self::runner(exclusive_choice(), Vars::new().with("route_b", false));
        assert_eq!(runner.fire("A").unwrap().produced, vec!["A__C"]);
        assert_eq!(names(&runner), vec!["C"]);
    }

    #[test]
    fn test_cancellation_region() {
        let mut runner = runner(
            json!({
                "id": "main", "input": "start", "output": "end",
                "conditions": [{ "id": "c1" }, { "id": "c2" }],
                "tasks": [{ "id": "Split", "split": "and" }, { "id": "A", "cancels": ["c2"] }, { "id": "B" }],
                "flows": [
                    { "source": "start", "target": "Split" },
                    { "source": "Split", "target": "c1" },
                    { "source": "Split", "target": "c2" },
                    { "source": "c1", "target": "A" },
                    { "source": "c2", "target": "B" },
                    { "source": "A", "target": "end" },
                    { "source": "B", "target": "end" }
                ]
            }),
            Vars::new(),
        );

        runner.fire("Split").unwrap();
        assert_eq!(names(&runner), vec!["A", "B"]);
        let b = live_item(&runner, "B");

        let result = runner.fire("A").unwrap();
        assert_eq!(result.cancelled, vec!["c2"]);
        assert_eq!(result.cancelled_tokens, 1);
        assert_eq!(result.cancelled_work_items, vec![b.clone()]);
        assert!(!names(&runner).contains(&"B".to_string()));
        assert_eq!(runner.work_item(&b).unwrap().status, WorkItemStatus::Cancelled);
        assert_eq!(runner.status(), CaseStatus::Completed);
    }

    fn cancels_task() -> Value {
        json!({
            "id": "main", "input": "start", "output": "end",
            "tasks": [{ "id": "S", "split": "and" }, { "id": "A", "cancels": ["B"] }, { "id": "B" }],
            "flows": [
                { "source": "start", "target": "S" },
                { "source": "S", "target": "A" },
                { "source": "S", "target": "B" },
                { "source": "A", "target": "end" },
                { "source": "B", "target": "end" }
            ]
        })
    }

    #[test]
    fn test_cancelling_a_started_task() {
        let mut runner = runner(cancels_task(), Vars::new());
        runner.fire("S").unwrap();
        let b = live_item(&runner, "B");

        let started = runner.start_work_item(&b).unwrap();
        assert_eq!(started.status, WorkItemStatus::Started);
        assert_eq!(runner.marking().tokens("S__B"), 0);
        assert_eq!(runner.marking().tokens("B"), 1);
        let modes: Vec<(String, EnableMode)> = runner.enabled().into_iter().map(|e| (e.task, e.mode)).collect();
        assert_eq!(modes, vec![("A".to_string(), EnableMode::Join), ("B".to_string(), EnableMode::Synchronize)]);

        let result = runner.fire("A").unwrap();
        assert_eq!(result.cancelled, vec!["B"]);
        assert_eq!(result.cancelled_tokens, 1);
        assert_eq!(result.cancelled_work_items, vec![b.clone()]);
        assert_eq!(runner.work_item(&b).unwrap().status, WorkItemStatus::Cancelled);
        assert_eq!(runner.live_work_items().count(), 0);
        assert_eq!(runner.marking(), &Marking::seeded("end"));
        assert_eq!(runner.status(), CaseStatus::Completed);
    }

    #[test]
    fn test_cancellation_leaves_an_unstarted_task_alone() {
        let mut runner = runner(cancels_task(), Vars::new());
        runner.fire("S").unwrap();
        let b = live_item(&runner, "B");

        let result = runner.fire("A").unwrap();
        assert!(result.cancelled.is_empty());
        assert!(result.cancelled_work_items.is_empty());
        assert_eq!(runner.work_item(&b).unwrap().status, WorkItemStatus::Enabled);
        assert_eq!(names(&runner), vec!["B"]);
        assert_eq!(runner.marking().tokens("S__B"), 1);
    }

    #[test]
    fn test_started_task_completes_from_its_busy_token() {
        let mut runner = runner(sequence(), Vars::new());
        let a = live_item(&runner, "A");
        runner.start_work_item(&a).unwrap();
        assert_eq!(runner.marking(), &Marking::seeded("A"));
        assert!(matches!(runner.start_work_item(&a), Err(FireError::InvalidWorkItemState { .. })));

        let result = runner.complete_work_item(&a, Vars::new()).unwrap().unwrap();
        assert_eq!(result.mode, EnableMode::Synchronize);
        assert_eq!(result.consumed, vec!["A"]);
        assert_eq!(result.work_item, Some(a.clone()));
        assert_eq!(runner.marking(), &Marking::seeded("A__B"));

        let b = live_item(&runner, "B");
        runner.start_work_item(&b).unwrap();
        let voided = runner.cancel_work_item(&b).unwrap().unwrap();
        assert_eq!(voided.consumed, vec!["B"]);
        assert_eq!(runner.status(), CaseStatus::Failed);
    }

    #[test]
    fn test_stale_and_unknown_commands_are_recoverable() {
        let mut runner = runner(sequence(), Vars::new());
        assert_eq!(runner.fire("B").unwrap_err(), FireError::NotEnabled { task: "B".to_string() });
        assert_eq!(runner.fire("Z").unwrap_err(), FireError::UnknownTask { task: "Z".to_string() });
        assert!(matches!(runner.complete_work_item("nope", Vars::new()), Err(FireError::UnknownWorkItem { .. })));
        assert_eq!(runner.status(), CaseStatus::Running);
        assert_eq!(runner.marking(), &Marking::seeded("start"));
        assert!(matches!(runner.start(), Err(FireError::CaseNotRunning { .. })));
    }

    #[test]
    fn test_no_matching_flow_fails_case_without_mutation() {
        let mut runner = runner(
            json!({
                "id": "main", "input": "start", "output": "end",
                "tasks": [{ "id": "A", "split": "xor" }, { "id": "B" }, { "id": "C" }],
                "flows": [
                    { "source": "start", "target": "A" },
                    { "source": "A", "target": "B", "predicate": "go_b" },
                    { "source": "A", "target": "C", "predicate": "go_c" },
                    { "source": "B", "target": "end" },
                    { "source": "C", "target": "end" }
                ]
            }),
            Vars::new(),
        );
        let a = live_item(&runner, "A");

        let err = runner.fire("A").unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(&err, FireError::NoMatchingFlow { task, evaluated } if task == "A" && evaluated.len() == 2));
        assert_eq!(runner.status(), CaseStatus::Failed);
        assert_eq!(runner.error(), Some(&err));
        assert_eq!(runner.marking(), &Marking::seeded("start"));
        assert_eq!(runner.work_item(&a).unwrap().status, WorkItemStatus::Failed);
        assert!(matches!(runner.fire("A"), Err(FireError::CaseNotRunning { status }) if status == "failed"));
    }

    #[test]
    fn test_output_bindings_feed_split_guards() {
        let mut runner = runner(
            json!({
                "id": "main", "input": "start", "output": "end",
                "variables": [{ "name": "approved", "initial": false }, { "name": "amount", "initial": 10 }],
                "tasks": [
                    { "id": "A", "split": "xor", "inputs": ["amount"], "outputs": ["approved"] },
                    { "id": "B" },
                    { "id": "C" }
                ],
                "flows": [
                    { "source": "start", "target": "A" },
                    { "source": "A", "target": "B", "predicate": "approved" },
                    { "source": "A", "target": "C", "default": true },
                    { "source": "B", "target": "end" },
                    { "source": "C", "target": "end" }
                ]
            }),
            Vars::new(),
        );
        let a = live_item(&runner, "A");
        assert_eq!(runner.work_item(&a).unwrap().data, Vars::new().with("amount", 10));

        runner.start_work_item(&a).unwrap();
        let result = runner.complete_work_item(&a, Vars::new().with("approved", true).with("ignored", 1)).unwrap().unwrap();
        assert_eq!(result.work_item, Some(a.clone()));
        assert_eq!(result.produced, vec!["A__B"]);
        assert_eq!(runner.data().get::<bool>("approved"), Some(true));
        assert!(!runner.data().contains("ignored"));
        assert_eq!(runner.work_item(&a).unwrap().status, WorkItemStatus::Completed);
    }

    fn review(
        creation: &str,
        min: usize,
        max: usize,
        threshold: usize,
    ) -> Value {
        json!({
            "id": "main", "input": "start", "output": "end",
            "variables": [{ "name": "papers", "initial": [] }, { "name": "scores" }],
            "tasks": [{
                "id": "review", "kind": "multi_instance",
                "multi_instance": { "min": min, "max": max, "threshold": threshold, "creation": creation, "splitting": "papers", "joining": "scores" }
            }],
            "flows": [
                { "source": "start", "target": "review" },
                { "source": "review", "target": "end" }
            ]
        })
    }

    #[test]
    fn test_multi_instance_partial_join() {
        let mut runner = runner(review("static", 1, 5, 2), Vars::new().with("papers", json!(["p1", "p2", "p3"])));

        let result = runner.fire("review").unwrap();
        assert_eq!(result.mode, EnableMode::Join);
        assert_eq!(result.produced, vec!["review"]);
        let items = instances(&runner, "review");
        assert_eq!(items.len(), 3);
        assert_eq!(runner.work_item(&items[1]).unwrap().data, Vars::new().with("papers", "p2"));
        assert!(runner.enabled().is_empty());
        assert_eq!(runner.status(), CaseStatus::Running);

        runner.complete_work_item(&items[0], Vars::new().with("scores", 5)).unwrap();
        assert!(runner.enabled().is_empty());
        runner.complete_work_item(&items[2], Vars::new().with("scores", 9)).unwrap();
        assert_eq!(runner.enabled()[0].mode, EnableMode::Synchronize);

        let result = runner.fire("review").unwrap();
        assert_eq!(result.consumed, vec!["review"]);
        assert_eq!(result.cancelled_work_items, vec![items[1].clone()]);
        assert_eq!(runner.data().get_value("scores"), Some(&json!([5, 9])));
        assert_eq!(runner.status(), CaseStatus::Completed);
    }

    #[test]
    fn test_multi_instance_bounds() {
        let mut runner = runner(review("static", 1, 2, 1), Vars::new().with("papers", json!([1, 2, 3])));
        let err = runner.fire("review").unwrap_err();
        assert_eq!(
            err,
            FireError::InstanceBound {
                task: "review".to_string(),
                requested: 3,
                max: 2
            }
        );
        assert_eq!(runner.status(), CaseStatus::Failed);
        assert_eq!(runner.marking(), &Marking::seeded("start"));
    }

    #[test]
    fn test_static_threshold_unreachable() {
        let mut runner = runner(review("static", 1, 3, 3), Vars::new().with("papers", json!(["a", "b", "c"])));
        runner.fire("review").unwrap();
        let items = instances(&runner, "review");
        runner.complete_work_item(&items[0], Vars::new()).unwrap();
        assert!(matches!(runner.add_instance("review", Vars::new()), Err(FireError::NotDynamic { .. })));

        runner.cancel_work_item(&items[1]).unwrap();
        assert_eq!(runner.status(), CaseStatus::Failed);
        assert_eq!(
            runner.error(),
            Some(&FireError::ThresholdUnreachable {
                task: "review".to_string(),
                threshold: 3
            })
        );
        assert_eq!(runner.work_item(&items[2]).unwrap().status, WorkItemStatus::Failed);
    }

    #[test]
    fn test_dynamic_instances() {
        let mut runner = runner(review("dynamic", 1, 2, 2), Vars::new());
        runner.fire("review").unwrap();
        assert_eq!(instances(&runner, "review").len(), 1);

        let added = runner.add_instance("review", Vars::new().with("papers", "late")).unwrap();
        assert_eq!(added.instance, Some(1));
        assert_eq!(added.status, WorkItemStatus::Started);
        assert_eq!(runner.add_instance("review", Vars::new()).unwrap_err(), FireError::InstanceLimit { task: "review".to_string(), max: 2 });

        for id in instances(&runner, "review") {
            runner.complete_work_item(&id, Vars::new().with("scores", 1)).unwrap();
        }
        runner.fire("review").unwrap();
        assert_eq!(runner.data().get_value("scores"), Some(&json!([1, 1])));
        assert_eq!(runner.status(), CaseStatus::Completed);
    }

    #[test]
    fn test_voided_branch_releases_or_join() {
        let mut runner = runner(
            json!({
                "id": "main", "input": "start", "output": "end",
                "tasks": [{ "id": "S", "split": "and" }, { "id": "A" }, { "id": "B" }, { "id": "J", "join": "or" }],
                "flows": [
                    { "source": "start", "target": "S" },
                    { "source": "S", "target": "A" },
                    { "source": "S", "target": "B" },
                    { "source": "A", "target": "J" },
                    { "source": "B", "target": "J" },
                    { "source": "J", "target": "end" }
                ]
            }),
            Vars::new(),
        );
        runner.fire("S").unwrap();
        runner.fire("A").unwrap();
        // B may still deliver a token
        assert_eq!(names(&runner), vec!["B"]);

        let b = live_item(&runner, "B");
        let result = runner.cancel_work_item(&b).unwrap().unwrap();
        assert_eq!(result.consumed, vec!["S__B"]);
        assert!(result.produced.is_empty());
        assert_eq!(names(&runner), vec!["J"]);
        assert_eq!(runner.fire("J").unwrap().consumed, vec!["A__J"]);
        assert_eq!(runner.status(), CaseStatus::Completed);
    }

    #[test]
    fn test_voiding_the_only_branch_deadlocks() {
        let mut runner = runner(sequence(), Vars::new());
        let a = live_item(&runner, "A");
        runner.cancel_work_item(&a).unwrap();
        assert_eq!(runner.status(), CaseStatus::Failed);
        assert_eq!(runner.error(), Some(&FireError::Deadlocked { places: Vec::new() }));
    }

    #[test]
    fn test_skip_predicate_auto_fires() {
        let net = json!({
            "id": "main", "input": "start", "output": "end",
            "tasks": [{ "id": "A", "skip": "auto" }, { "id": "B" }],
            "flows": [
                { "source": "start", "target": "A" },
                { "source": "A", "target": "B" },
                { "source": "B", "target": "end" }
            ]
        });
        let skipped = runner(net.clone(), Vars::new().with("auto", true));
        assert_eq!(names(&skipped), vec!["B"]);

        let kept = runner(net.clone(), Vars::new());
        assert_eq!(names(&kept), vec!["A"]);

        let mut limited = CaseRunner::new("case-2", spec(json!([net])), Vars::new().with("auto", true)).with_config(RunnerConfig {
            max_auto_fires: 0,
        });
        limited.start().unwrap();
        assert_eq!(names(&limited), vec!["A"]);
    }

    #[test]
    fn test_case_cancel() {
        let mut runner = runner(sequence(), Vars::new());
        runner.fire("A").unwrap();
        let b = live_item(&runner, "B");

        assert_eq!(runner.cancel().unwrap(), vec!["A__B"]);
        assert_eq!(runner.status(), CaseStatus::Cancelled);
        assert!(runner.marking().is_empty());
        assert_eq!(runner.work_item(&b).unwrap().status, WorkItemStatus::Cancelled);
        assert!(runner.cancel().is_err());
        assert!(runner.fire("B").is_err());
    }

    #[test]
    fn test_composite_decomposition() {
        let sub = json!({
            "id": "sub", "input": "s_in", "output": "s_out",
            "tasks": [{ "id": "X" }],
            "flows": [{ "source": "s_in", "target": "X" }, { "source": "X", "target": "s_out" }]
        });
        let main = |decomposition: &str| {
            json!({
                "id": "main", "input": "start", "output": "end",
                "tasks": [{ "id": "P", "kind": "composite", "decomposition": decomposition }],
                "flows": [{ "source": "start", "target": "P" }, { "source": "P", "target": "end" }]
            })
        };

        let mut runner = CaseRunner::new("case-1", spec(json!([main("sub"), sub.clone()])), Vars::new());
        runner.start().unwrap();
        let p = live_item(&runner, "P");
        runner.start_work_item(&p).unwrap();
        assert_eq!(runner.fire("P").unwrap().decomposition.as_deref(), Some("sub"));

        let mut subcase = CaseRunner::for_net("case-s", spec(json!([main("sub"), sub.clone()])), "sub", Vars::new()).unwrap();
        subcase.start().unwrap();
        assert_eq!(subcase.net().id(), "sub");
        assert_eq!(names(&subcase), vec!["X"]);
        assert!(CaseRunner::for_net("case-s", spec(json!([main("sub"), sub.clone()])), "nowhere", Vars::new()).is_none());

        let mut runner = CaseRunner::new("case-2", spec(json!([main("nowhere"), sub])), Vars::new());
        runner.start().unwrap();
        let p = live_item(&runner, "P");
        let err = runner.start_work_item(&p).unwrap_err();
        assert!(matches!(err, FireError::MissingDecomposition { decomposition, .. } if decomposition == "nowhere"));
        assert_eq!(runner.status(), CaseStatus::Failed);
    }

    #[test]
    fn test_allocation_and_deadline() {
        let net = json!({
            "id": "main", "input": "start", "output": "end",
            "tasks": [{ "id": "A", "timeout": 1000, "resourcing": { "offer": ["clerk", "manager"] } }],
            "flows": [{ "source": "start", "target": "A" }, { "source": "A", "target": "end" }]
        });
        let mut runner = CaseRunner::new("case-1", spec(json!([net])), Vars::new()).with_allocator(Arc::new(FirstOffered));
        runner.start().unwrap();

        let item = runner.work_item(&live_item(&runner, "A")).unwrap().clone();
        assert_eq!(item.participant.as_deref(), Some("clerk"));
        assert_eq!(item.deadline, Some(item.created_at + 1000));
    }

    #[test]
    fn test_snapshot() {
        let mut runner = runner(sequence(), Vars::new().with("k", "v"));
        runner.fire("A").unwrap();
        let snapshot = runner.snapshot();
        assert_eq!(snapshot.status, CaseStatus::Running);
        assert_eq!(snapshot.net, "main");
        assert_eq!(snapshot.marking, Marking::seeded("A__B"));
        assert_eq!(snapshot.enabled.len(), 1);
        assert_eq!(snapshot.work_items.len(), 1);
        assert_eq!(snapshot.data.get::<String>("k"), Some("v".to_string()));
    }
}
