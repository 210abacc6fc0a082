//! Task Executor
//!
//! A [`Task`] is an ordered list of jobs and nested sub-tasks that share one
//! [`Varyings`] store. It is assembled once through [`TaskBuilder`] and then
//! run once per frame.
//!
//! # Execution model
//!
//! - Nodes run strictly in declaration order; the builder only hands out
//!   varyings of jobs that already exist, so every consumer is declared after
//!   its producers and the graph is acyclic by construction.
//! - Inputs are validated while building: a varying from another graph, or
//!   one whose slot nothing produces yet, is a wiring error and the build
//!   fails without returning a partial task.
//! - A disabled job or sub-task still produces: every slot it owns receives
//!   the output type's `Default`.
//! - The first job error aborts the frame; later jobs do not run.
//!
//! ```text
//! RenderMainView
//!  ├── PrepareDeferred        slot 3
//!  ├── DrawOpaqueDeferred     slot 5   (reads 1, 3)
//!  └── Bloom  (sub-task)
//!       ├── BloomThreshold    slot 9   (reads 3)
//!       └── BloomApply        slot 10  (reads 9)
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::config::{ConfigRegistry, SharedConfig};
use super::job::{Job, JobConfig, JobInputs, TaskConfig};
use super::varying::{AnyVarying, GraphId, Varying, Varyings};
use crate::context::RenderContext;
use umbra_core::errors::{GraphError, Result};

// ─── Nodes ─────────────────────────────────────────────────────────────────

trait ErasedJob {
    fn path(&self) -> &str;
    fn slot(&self) -> usize;
    fn inputs(&self) -> &[AnyVarying];
    fn run(&mut self, ctx: &mut RenderContext, varyings: &mut Varyings) -> Result<()>;
    fn skip(&self, varyings: &mut Varyings) -> Result<()>;
}

struct JobNode<J: Job> {
    path: String,
    slot: usize,
    job: J,
    config: SharedConfig<J::Config>,
    inputs: J::Inputs,
    input_list: SmallVec<[AnyVarying; 4]>,
}

impl<J: Job> ErasedJob for JobNode<J> {
    fn path(&self) -> &str {
        &self.path
    }

    fn slot(&self) -> usize {
        self.slot
    }

    fn inputs(&self) -> &[AnyVarying] {
        &self.input_list
    }

    fn run(&mut self, ctx: &mut RenderContext, varyings: &mut Varyings) -> Result<()> {
        let output = {
            let mut config = self.config.write();
            if config.sanitize() {
                log::warn!("Config of '{}' had out-of-range values; clamped", self.path);
            }
            if !config.is_enabled() && !J::ALWAYS_RUN {
                drop(config);
                return self.skip(varyings);
            }

            log::trace!("Running job '{}'", self.path);
            self.job.run(ctx, &mut config, &self.inputs, varyings)?
        };
        varyings.insert(self.slot, Box::new(output))?;
        Ok(())
    }

    fn skip(&self, varyings: &mut Varyings) -> Result<()> {
        log::trace!("Skipping disabled job '{}'", self.path);
        varyings.insert(self.slot, Box::new(J::Output::default()))?;
        Ok(())
    }
}

struct SubTask {
    path: String,
    config: SharedConfig<TaskConfig>,
    nodes: Vec<Node>,
}

enum Node {
    Job(Box<dyn ErasedJob>),
    SubTask(SubTask),
}

impl Node {
    fn run(&mut self, ctx: &mut RenderContext, varyings: &mut Varyings) -> Result<()> {
        match self {
            Node::Job(job) => job.run(ctx, varyings),
            Node::SubTask(sub) => {
                if !sub.config.read().enabled {
                    log::trace!("Skipping disabled sub-task '{}'", sub.path);
                    return sub.nodes.iter().try_for_each(|node| node.skip(varyings));
                }
                sub.nodes.iter_mut().try_for_each(|node| node.run(ctx, varyings))
            }
        }
    }

    fn skip(&self, varyings: &mut Varyings) -> Result<()> {
        match self {
            Node::Job(job) => job.skip(varyings),
            Node::SubTask(sub) => sub.nodes.iter().try_for_each(|node| node.skip(varyings)),
        }
    }

    fn collect_jobs<'a>(&'a self, out: &mut Vec<&'a dyn ErasedJob>) {
        match self {
            Node::Job(job) => out.push(job.as_ref()),
            Node::SubTask(sub) => {
                for node in &sub.nodes {
                    node.collect_jobs(out);
                }
            }
        }
    }
}

// ─── Builder ───────────────────────────────────────────────────────────────

struct BuildState {
    graph: GraphId,
    /// Producer path per slot; slot 0 is the task input.
    producers: Vec<String>,
    registry: ConfigRegistry,
}

/// Assembles the jobs of one task (or sub-task) in declaration order.
pub struct TaskBuilder<'a> {
    path: String,
    names: FxHashSet<String>,
    nodes: Vec<Node>,
    state: &'a mut BuildState,
}

impl TaskBuilder<'_> {
    /// Dotted path of the task being built.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Appends a job with its default config and returns its output varying.
    pub fn add_job<J: Job>(
        &mut self,
        name: &str,
        job: J,
        inputs: J::Inputs,
    ) -> Result<Varying<J::Output>> {
        self.add_job_with_config(name, job, inputs, J::Config::default())
    }

    /// Appends a job with an explicit initial config.
    pub fn add_job_with_config<J: Job>(
        &mut self,
        name: &str,
        job: J,
        inputs: J::Inputs,
        config: J::Config,
    ) -> Result<Varying<J::Output>> {
        let path = self.claim_name(name)?;

        let mut input_list = SmallVec::new();
        inputs.visit(&mut |varying| input_list.push(varying));
        for input in &input_list {
            self.validate_input(&path, input)?;
        }

        let config: SharedConfig<J::Config> = Arc::new(RwLock::new(config));
        self.state.registry.register(path.clone(), config.clone());

        let slot = self.state.producers.len();
        self.state.producers.push(path.clone());

        log::debug!("Registered job '{path}' at slot {slot}");
        self.nodes.push(Node::Job(Box::new(JobNode {
            path,
            slot,
            job,
            config,
            inputs,
            input_list,
        })));

        Ok(Varying::new(self.state.graph, slot))
    }

    /// Appends a nested sub-task whose children are added by `build`.
    ///
    /// The sub-task gets its own `enabled` flag at `<path>.<name>`; its
    /// children are registered below that path.
    pub fn add_sub_task<R>(
        &mut self,
        name: &str,
        build: impl FnOnce(&mut TaskBuilder<'_>) -> Result<R>,
    ) -> Result<R> {
        let path = self.claim_name(name)?;
        let config: SharedConfig<TaskConfig> = Arc::new(RwLock::new(TaskConfig::default()));
        self.state.registry.register(path.clone(), config.clone());

        let mut sub = TaskBuilder {
            path: path.clone(),
            names: FxHashSet::default(),
            nodes: Vec::new(),
            state: &mut *self.state,
        };
        let result = build(&mut sub)?;
        let nodes = sub.nodes;

        self.nodes.push(Node::SubTask(SubTask {
            path,
            config,
            nodes,
        }));
        Ok(result)
    }

    fn claim_name(&mut self, name: &str) -> Result<String> {
        if !self.names.insert(name.to_owned()) {
            return Err(GraphError::DuplicateJobName {
                task: self.path.clone(),
                name: name.to_owned(),
            }
            .into());
        }
        Ok(format!("{}.{name}", self.path))
    }

    fn validate_input(&self, job: &str, input: &AnyVarying) -> Result<()> {
        if input.graph != self.state.graph {
            return Err(GraphError::ForeignVarying {
                job: job.to_owned(),
                expected: self.state.graph.raw(),
                found: input.graph.raw(),
            }
            .into());
        }
        if input.slot >= self.state.producers.len() {
            return Err(GraphError::UnproducedInput {
                job: job.to_owned(),
                slot: input.slot,
            }
            .into());
        }
        Ok(())
    }
}

// ─── Task ──────────────────────────────────────────────────────────────────

/// One input dependency of a job, resolved to its producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub varying: AnyVarying,
    /// Path of the producing job, or the task name for the task input.
    pub producer: String,
}

/// Dependency record of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDependencies {
    pub path: String,
    pub slot: usize,
    pub inputs: Vec<Dependency>,
}

/// An ordered, configurable graph of jobs fed by one input value of type `I`.
pub struct Task<I> {
    name: String,
    config: SharedConfig<TaskConfig>,
    input: Varying<I>,
    nodes: Vec<Node>,
    producers: Vec<String>,
    registry: ConfigRegistry,
    varyings: Varyings,
    frame_count: u64,
}

impl<I: 'static> Task<I> {
    /// Builds a task named `name`.
    ///
    /// `build` receives the builder and the varying of the task input, and
    /// may return extra values (typically output varyings) which are handed
    /// back alongside the task.
    pub fn build<R>(
        name: &str,
        build: impl FnOnce(&mut TaskBuilder<'_>, Varying<I>) -> Result<R>,
    ) -> Result<(Self, R)> {
        let graph = GraphId::next();
        let mut state = BuildState {
            graph,
            producers: vec![name.to_owned()],
            registry: ConfigRegistry::default(),
        };

        let config: SharedConfig<TaskConfig> = Arc::new(RwLock::new(TaskConfig::default()));
        state.registry.register(name.to_owned(), config.clone());

        let input = Varying::new(graph, 0);
        let mut builder = TaskBuilder {
            path: name.to_owned(),
            names: FxHashSet::default(),
            nodes: Vec::new(),
            state: &mut state,
        };
        let result = build(&mut builder, input)?;
        let nodes = builder.nodes;

        let slot_count = state.producers.len();
        log::debug!("Built task '{name}' with {} jobs", slot_count - 1);

        Ok((
            Self {
                name: name.to_owned(),
                config,
                input,
                nodes,
                producers: state.producers,
                registry: state.registry,
                varyings: Varyings::new(graph, slot_count),
                frame_count: 0,
            },
            result,
        ))
    }

    /// Runs every node once in declaration order.
    ///
    /// Varyings of the previous frame are discarded first; after a successful
    /// run every slot holds a value and stays readable until the next run.
    pub fn run(&mut self, ctx: &mut RenderContext, input: I) -> Result<()> {
        self.frame_count += 1;
        self.varyings.reset();
        self.varyings.insert(self.input.slot(), Box::new(input))?;

        if !self.config.read().enabled {
            log::trace!("Task '{}' disabled", self.name);
            return self
                .nodes
                .iter()
                .try_for_each(|node| node.skip(&mut self.varyings));
        }

        for node in &mut self.nodes {
            if let Err(err) = node.run(ctx, &mut self.varyings) {
                log::error!(
                    "Task '{}' aborted frame {}: {err}",
                    self.name,
                    self.frame_count
                );
                return Err(err);
            }
        }
        Ok(())
    }

    /// Resolves a varying against the most recent frame.
    pub fn get<T: 'static>(&self, varying: &Varying<T>) -> Result<&T> {
        Ok(self.varyings.get(varying)?)
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn input(&self) -> Varying<I> {
        self.input
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> GraphId {
        self.input.graph()
    }

    #[inline]
    #[must_use]
    pub fn configs(&self) -> &ConfigRegistry {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub fn varyings(&self) -> &Varyings {
        &self.varyings
    }

    /// Number of jobs, sub-task children included.
    #[must_use]
    pub fn job_count(&self) -> usize {
        self.producers.len() - 1
    }

    /// Job paths in execution order.
    #[must_use]
    pub fn job_paths(&self) -> Vec<&str> {
        self.jobs().into_iter().map(|job| job.path()).collect()
    }

    /// Producer/consumer edges of every job, in execution order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<JobDependencies> {
        self.jobs()
            .into_iter()
            .map(|job| JobDependencies {
                path: job.path().to_owned(),
                slot: job.slot(),
                inputs: job
                    .inputs()
                    .iter()
                    .map(|varying| Dependency {
                        varying: *varying,
                        producer: self.producers[varying.slot].clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    fn jobs(&self) -> Vec<&dyn ErasedJob> {
        let mut jobs = Vec::with_capacity(self.producers.len());
        for node in &self.nodes {
            node.collect_jobs(&mut jobs);
        }
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::job::EnabledConfig;

    struct AddOne;

    impl Job for AddOne {
        type Inputs = Varying<u32>;
        type Output = u32;
        type Config = EnabledConfig;

        fn run(
            &mut self,
            _ctx: &mut RenderContext,
            _config: &mut EnabledConfig,
            input: &Varying<u32>,
            varyings: &Varyings,
        ) -> Result<u32> {
            Ok(varyings.get(input)? + 1)
        }
    }

    #[test]
    fn test_chain_runs_in_order() {
        let (mut task, out) = Task::<u32>::build("Chain", |b, input| {
            let a = b.add_job("A", AddOne, input)?;
            b.add_job("B", AddOne, a)
        })
        .unwrap();

        let mut ctx = RenderContext::default();
        task.run(&mut ctx, 40).unwrap();
        assert_eq!(*task.get(&out).unwrap(), 42);
        assert_eq!(task.job_paths(), ["Chain.A", "Chain.B"]);
    }

    #[test]
    fn test_disabled_job_yields_default() {
        let (mut task, (a, b)) = Task::<u32>::build("Chain", |b, input| {
            let a = b.add_job("A", AddOne, input)?;
            let out = b.add_job("B", AddOne, a)?;
            Ok((a, out))
        })
        .unwrap();
        task.configs().set_enabled("Chain.A", false).unwrap();

        let mut ctx = RenderContext::default();
        task.run(&mut ctx, 40).unwrap();
        assert_eq!(*task.get(&a).unwrap(), 0);
        assert_eq!(*task.get(&b).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_name_fails_build() {
        let result = Task::<u32>::build("Chain", |b, input| {
            b.add_job("A", AddOne, input)?;
            b.add_job("A", AddOne, input)
        });
        let err = result.err().unwrap();
        assert!(err.is_wiring());
    }

    #[test]
    fn test_same_name_allowed_in_sub_task() {
        let (task, _) = Task::<u32>::build("Chain", |b, input| {
            let a = b.add_job("A", AddOne, input)?;
            b.add_sub_task("Inner", |sub| sub.add_job("A", AddOne, a))
        })
        .unwrap();
        assert_eq!(task.job_paths(), ["Chain.A", "Chain.Inner.A"]);
        assert!(task.configs().contains("Chain.Inner"));
    }

    #[test]
    fn test_foreign_varying_rejected() {
        let (_, foreign) = Task::<u32>::build("Other", |b, input| b.add_job("A", AddOne, input))
            .unwrap();
        let result = Task::<u32>::build("Chain", |b, _input| b.add_job("A", AddOne, foreign));
        assert!(matches!(
            result.err(),
            Some(umbra_core::errors::RenderError::Graph(GraphError::ForeignVarying { .. }))
        ));
    }
}
