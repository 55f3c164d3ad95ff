use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use tokio::runtime::Runtime;

use crate::{
    CaseflowError, Result, ShareLock,
    common::{BroadcastQueue, Shutdown},
    events::{CaseEvent, CaseStatusEvent, Event, Message},
    runner::{FiringResult, WorkItem},
};

macro_rules! dispatch_event {
    ($handles:expr, $(&$item:ident), +) => {
        if let Ok(handlers) = $handles.read() {
            for handle in handlers.iter() {
                (handle)($(&$item),+);
            }
        }
    };
}

macro_rules! dispatch_event_async {
    ($handles:expr, $(&$item:ident), +) => {
        let handles = $handles.clone();

        tokio::spawn(async move {
            let handlers = match handles.read() {
                Ok(handlers) => handlers.clone(),
                Err(_) => return,
            };
            for handle in handlers.iter() {
                (handle)($(&$item),+).await;
            }
        });
    };
}

pub type CaseEventHandle = Arc<dyn Fn(&Event<Message>) + Send + Sync>;
pub type CaseEventHandleAsync = Arc<dyn Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// use the glob pattern to match the case id
    /// eg. case1*
    pub cid: String,

    /// use the glob pattern to match the task id
    /// eg. review*
    pub tid: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            cid: "*".to_string(),
            tid: "*".to_string(),
        }
    }
}

#[allow(unused)]
impl ChannelOptions {
    pub fn new(
        cid: String,
        tid: String,
    ) -> Self {
        Self {
            cid,
            tid,
        }
    }

    pub fn with_cid(cid: String) -> Self {
        Self {
            cid,
            tid: "*".to_string(),
        }
    }

    pub fn with_tid(tid: String) -> Self {
        Self {
            cid: "*".to_string(),
            tid,
        }
    }
}

#[derive(Clone)]
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<Message>>>,

    events: ShareLock<Vec<CaseEventHandle>>,
    events_async: ShareLock<Vec<CaseEventHandleAsync>>,

    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(
        runtime: Arc<Runtime>,
        event_queue_size: usize,
    ) -> Self {
        Self {
            event_queue: BroadcastQueue::new(event_queue_size),
            events: Arc::new(RwLock::new(Vec::new())),
            events_async: Arc::new(RwLock::new(Vec::new())),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub(crate) fn event_queue(&self) -> Arc<BroadcastQueue<Event<Message>>> {
        self.event_queue.clone()
    }

    pub(crate) fn listen(&self) {
        let mut event_queue = self.event_queue.subscribe();
        let events = self.events.clone();
        let events_async = self.events_async.clone();

        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Ok(e) = event_queue.recv() => {
                        let evt = e.clone();
                        dispatch_event!(events, &evt);
                        dispatch_event_async!(events_async, &e);
                    }
                }
            }
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Number of registered handlers.
    #[cfg(test)]
    pub(crate) fn handlers(&self) -> usize {
        self.events.read().map(|h| h.len()).unwrap_or_default() + self.events_async.read().map(|h| h.len()).unwrap_or_default()
    }

    fn push(
        &self,
        handle: CaseEventHandle,
    ) {
        if let Ok(mut events) = self.events.write() {
            events.push(handle);
        }
    }
}

#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,

    glob: (globset::GlobMatcher, globset::GlobMatcher),
}

#[allow(unused)]
impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Result<Self> {
        Ok(Self {
            channel,
            glob: (matcher(&options.cid)?, matcher(&options.tid)?),
        })
    }

    /// Called with the case id when a case completes.
    pub fn on_complete(
        &self,
        f: impl Fn(&str) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.push(Arc::new(move |e| {
            if e.event.is_complete() && is_match(&glob, e) {
                f(&e.cid);
            }
        }));
    }

    pub fn on_error(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.push(Arc::new(move |e| {
            if e.event.is_error() && is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.push(Arc::new(move |e| {
            if is_match(&glob, e) {
                f(e);
            }
        }));
    }

    /// Called on every work-item transition.
    pub fn on_work_item(
        &self,
        f: impl Fn(&WorkItem) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.push(Arc::new(move |e| {
            if let CaseEvent::WorkItem(w) = &e.event {
                if is_match(&glob, e) {
                    f(&w.item);
                }
            }
        }));
    }

    /// Called with the case id and the firing after every firing.
    pub fn on_fired(
        &self,
        f: impl Fn(&str, &FiringResult) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.push(Arc::new(move |e| {
            if let CaseEvent::Fired(result) = &e.event {
                if is_match(&glob, e) {
                    f(&e.cid, result);
                }
            }
        }));
    }

    /// Called with the case id and the final data when a case reaches a
    /// terminal state; `None` unless it completed.
    pub fn on_terminated(
        &self,
        f: impl Fn(&str, Option<&crate::common::Vars>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.push(Arc::new(move |e| {
            if !e.event.is_terminal() || !is_match(&glob, e) {
                return;
            }
            match &e.event {
                CaseEvent::Case(CaseStatusEvent::Completed(c)) => f(&e.cid, Some(&c.data)),
                _ => f(&e.cid, None),
            }
        }));
    }

    pub fn on_event_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let glob = self.glob.clone();

        if let Ok(mut events_async) = self.channel.events_async.write() {
            events_async.push(Arc::new(move |e| {
                if is_match(&glob, e) {
                    f(e)
                } else {
                    Box::pin(async {})
                }
            }));
        }
    }
}

fn matcher(pattern: &str) -> Result<globset::GlobMatcher> {
    globset::Glob::new(pattern).map(|g| g.compile_matcher()).map_err(|e| CaseflowError::Engine(format!("invalid channel pattern {:?}: {}", pattern, e)))
}

fn is_match(
    glob: &(globset::GlobMatcher, globset::GlobMatcher),
    e: &Event<Message>,
) -> bool {
    let (pat_cid, pat_tid) = glob;
    pat_cid.is_match(&e.cid) && pat_tid.is_match(&e.tid)
}
