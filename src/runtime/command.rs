use crate::{
    CaseflowError, FireError, Result,
    common::Vars,
    runner::{CaseSnapshot, EnabledTask, FiringResult, WorkItem},
};

/// Command applied to a case by its dispatcher, one at a time.
#[derive(Debug, Clone, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum CaseCommand {
    Start,
    Fire {
        task: String,
        outputs: Vars,
    },
    StartWorkItem {
        id: String,
    },
    CompleteWorkItem {
        id: String,
        outputs: Vars,
    },
    AddInstance {
        task: String,
        data: Vars,
    },
    CancelWorkItem {
        id: String,
    },
    Cancel,
    Enabled,
    Snapshot,
}

/// Successful answer to a [`CaseCommand`].
#[derive(Debug, Clone)]
pub enum Reply {
    Done,
    Fired(Option<FiringResult>),
    WorkItem(WorkItem),
    Cancelled(Vec<String>),
    Enabled(Vec<EnabledTask>),
    Snapshot(Box<CaseSnapshot>),
}

impl Reply {
    pub fn firing(self) -> Result<Option<FiringResult>> {
        match self {
            Reply::Fired(result) => Ok(result),
            other => Err(unexpected("firing", &other)),
        }
    }

    pub fn work_item(self) -> Result<WorkItem> {
        match self {
            Reply::WorkItem(item) => Ok(item),
            other => Err(unexpected("work item", &other)),
        }
    }

    pub fn cancelled(self) -> Result<Vec<String>> {
        match self {
            Reply::Cancelled(places) => Ok(places),
            other => Err(unexpected("cancelled places", &other)),
        }
    }

    pub fn enabled(self) -> Result<Vec<EnabledTask>> {
        match self {
            Reply::Enabled(enabled) => Ok(enabled),
            other => Err(unexpected("enabled tasks", &other)),
        }
    }

    pub fn snapshot(self) -> Result<CaseSnapshot> {
        match self {
            Reply::Snapshot(snapshot) => Ok(*snapshot),
            other => Err(unexpected("snapshot", &other)),
        }
    }
}

fn unexpected(
    expected: &str,
    reply: &Reply,
) -> CaseflowError {
    CaseflowError::Case(format!("expected {} reply, got {:?}", expected, reply))
}

pub(crate) type ReplySender = flume::Sender<std::result::Result<Reply, FireError>>;

/// A command in a case's queue. Commands without a reply channel, such as
/// deadline cancellations, are fire-and-forget.
pub(crate) struct Envelope {
    pub command: CaseCommand,
    pub reply: Option<ReplySender>,
}

impl Envelope {
    pub fn new(
        command: CaseCommand,
        reply: Option<ReplySender>,
    ) -> Self {
        Self {
            command,
            reply,
        }
    }
}
