use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::{
    CaseflowError, Config, Engine, Result,
    guard::GuardEvaluator,
    resource::{NoAllocation, ResourceAllocator},
};

pub struct EngineBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    guard: Option<Arc<dyn GuardEvaluator>>,
    allocator: Arc<dyn ResourceAllocator>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            rt: None,
            guard: None,
            allocator: Arc::new(NoAllocation),
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    /// Replaces the built-in guard evaluator for every case.
    pub fn guard(
        mut self,
        guard: Arc<dyn GuardEvaluator>,
    ) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn allocator(
        mut self,
        allocator: Arc<dyn ResourceAllocator>,
    ) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn build(&self) -> Result<Engine> {
        let runtime = match &self.rt {
            Some(rt) => rt.clone(),
            None => {
                if self.config.async_worker_thread_number == 0 {
                    return Err(CaseflowError::Config("async_worker_thread_number must be at least 1".to_string()));
                }
                let rt = Builder::new_multi_thread()
                    .worker_threads(self.config.async_worker_thread_number.into())
                    .enable_all()
                    .build()
                    .map_err(|e| CaseflowError::Engine(format!("failed to build runtime: {}", e)))?;
                Arc::new(rt)
            }
        };
        let engine = Engine::new(runtime, self.config.clone(), self.guard.clone(), self.allocator.clone());

        Ok(engine)
    }
}
