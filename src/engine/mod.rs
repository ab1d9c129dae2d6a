mod diagnostics;
mod job;
mod pool;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Instant;

use indicatif::ProgressStyle;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::core::{Options, TargetId};
use crate::error::BuildError;
use crate::graph::{Graph, Visit};

pub use diagnostics::{Diagnostics, TaskExecution};

use job::Outcome;
use pool::WorkerPool;

/// State shared with the workers for the duration of one build.
struct Shared {
    graph: Graph,
    options: Options,
    failed: AtomicBool,
}

impl Shared {
    /// Publishes a finished job: raises the failure flag if needed, then
    /// counts the job towards each of its co-dependents.
    ///
    /// The flag is raised first so that a dependent can never be observed as
    /// ready while the failure that should stop it is still invisible.
    fn finish(&self, id: TargetId, outcome: &Outcome) {
        if outcome.is_failure() {
            self.failed.store(true, Ordering::SeqCst);
        }
        for &codep in &self.graph.node(id).codeps {
            self.graph
                .node(codep)
                .satisfied
                .fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct Completion {
    id: TargetId,
    outcome: Outcome,
    execution: TaskExecution,
}

/// The single-threaded side of phase 2. Owns the ready queue and decides what
/// gets dispatched next.
struct Scheduler {
    shared: Arc<Shared>,
    visit: Vec<Visit>,
    queue: VecDeque<TargetId>,
    in_flight: usize,
    finished: usize,
    diagnostics: Diagnostics,
    failure: Option<BuildError>,
    span: Span,
    task_style: ProgressStyle,
}

impl Scheduler {
    fn new(shared: Arc<Shared>, span: Span, task_style: ProgressStyle) -> Self {
        let graph = &shared.graph;

        let mut visit = vec![Visit::Undiscovered; graph.nodes.len()];
        for &id in &graph.closure {
            visit[id.index()] = Visit::Discovered;
        }

        let mut queue = VecDeque::with_capacity(graph.closure.len());
        for &leaf in &graph.leaves {
            visit[leaf.index()] = Visit::Enqueued;
            queue.push_back(leaf);
        }

        Self {
            shared,
            visit,
            queue,
            in_flight: 0,
            finished: 0,
            diagnostics: Diagnostics::default(),
            failure: None,
            span,
            task_style,
        }
    }

    fn dispatch(&mut self, pool: &WorkerPool, id: TargetId, sender: &Sender<Completion>) {
        let name = &self.shared.graph.node(id).name;

        let span = tracing::info_span!(parent: &self.span, "target", name = %name);
        span.pb_set_style(&self.task_style);
        span.pb_set_message(&format!("Running {name}"));

        self.visit[id.index()] = Visit::Dispatched;
        self.in_flight += 1;

        let shared = self.shared.clone();
        let sender = sender.clone();

        pool.execute(move || {
            let _enter = span.enter();

            let start = Instant::now();
            let outcome = job::run(&shared.graph, id, &shared.options);
            let duration = start.elapsed();

            shared.finish(id, &outcome);

            // The scheduler keeps the receiver alive until every job is done.
            let _ = sender.send(Completion {
                id,
                outcome,
                execution: TaskExecution { start, duration },
            });
        });
    }

    fn complete(&mut self, done: Completion) {
        let node = self.shared.graph.node(done.id);

        self.in_flight -= 1;
        self.finished += 1;
        self.visit[done.id.index()] = Visit::Finished;
        self.span.pb_inc(1);

        if done.outcome.executed() {
            self.diagnostics
                .execution_times
                .insert(node.name.clone(), done.execution);
        }

        match done.outcome {
            Outcome::Ran => self.diagnostics.executed.push(node.name.clone()),
            Outcome::UpToDate => self.diagnostics.up_to_date.push(node.name.clone()),
            Outcome::Phony => {}
            Outcome::Failed(code) => {
                tracing::warn!("target {} failed", node.name);
                self.failure.get_or_insert(BuildError::Job {
                    target: node.name.clone(),
                    code,
                });
                return;
            }
            Outcome::Spawn(source) => {
                tracing::warn!("couldn't start command for {}", node.name);
                self.failure.get_or_insert(BuildError::Spawn {
                    target: node.name.clone(),
                    source,
                });
                return;
            }
        }

        for &codep in &node.codeps {
            if self.visit[codep.index()] == Visit::Discovered {
                self.visit[codep.index()] = Visit::Enqueued;
                self.queue.push_back(codep);
            }
        }
    }

    /// Processes every completion that has already arrived. Returns how many
    /// there were.
    fn drain(&mut self, receiver: &Receiver<Completion>) -> usize {
        let mut count = 0;
        while let Ok(done) = receiver.try_recv() {
            self.complete(done);
            count += 1;
        }
        count
    }

    /// Blocks until some job reports back.
    ///
    /// With nothing in flight no counter can move anymore, so unless some
    /// queued target is already ready the build is stuck.
    fn wait(&mut self, receiver: &Receiver<Completion>) -> Result<(), BuildError> {
        if self.in_flight == 0 {
            let graph = &self.shared.graph;
            if self.queue.iter().any(|&id| graph.node(id).is_ready()) {
                return Ok(());
            }
            return Err(BuildError::Stalled(self.queue.len()));
        }
        if let Ok(done) = receiver.recv() {
            self.complete(done);
        }
        Ok(())
    }

    fn drive(
        &mut self,
        pool: &WorkerPool,
        sender: &Sender<Completion>,
        receiver: &Receiver<Completion>,
    ) -> Result<(), BuildError> {
        let total = self.shared.graph.closure.len();
        let mut waiting = 0;

        while self.finished < total {
            // A completion may have made anything already swept ready.
            if self.drain(receiver) > 0 {
                waiting = 0;
            }
            if self.shared.failed.load(Ordering::SeqCst) {
                break;
            }

            let Some(id) = self.queue.pop_front() else {
                self.wait(receiver)?;
                continue;
            };

            // Not every dependency has finished yet, put it back and give
            // the others a turn. Once the whole queue has been cycled without
            // dispatching anything, block for a completion instead of
            // spinning.
            if !self.shared.graph.node(id).is_ready() {
                self.queue.push_back(id);
                waiting += 1;
                if waiting >= self.queue.len() {
                    self.wait(receiver)?;
                    waiting = 0;
                }
                continue;
            }

            waiting = 0;
            self.dispatch(pool, id, sender);
        }

        Ok(())
    }
}

/// Runs phase 2 over a discovered graph: executes every stale target of the
/// closure, each only after all of its dependencies have finished.
pub(crate) fn run(graph: Graph, goal: &str, options: &Options) -> Result<Diagnostics, BuildError> {
    let total = graph.closure.len() as u64;
    let jobs = options.max_jobs();

    let root_span = tracing::info_span!("building", goal);
    root_span.pb_set_length(total);
    root_span.pb_set_style(&crate::utils::get_style_build()?);
    root_span.pb_set_message(&format!("Building {goal}"));
    let _enter = root_span.enter();

    tracing::info!("building {} ({} targets, {} jobs)", goal, total, jobs);

    let shared = Arc::new(Shared {
        graph,
        options: options.clone(),
        failed: AtomicBool::new(false),
    });

    let pool = WorkerPool::new(jobs)?;
    let (sender, receiver) = channel();
    let mut scheduler = Scheduler::new(shared, root_span.clone(), crate::utils::get_style_task()?);

    let result = scheduler.drive(&pool, &sender, &receiver);

    // Whatever happened, let the commands already running finish.
    pool.drain_and_shutdown();
    drop(sender);
    for done in receiver.try_iter() {
        scheduler.complete(done);
    }

    result?;
    if let Some(err) = scheduler.failure {
        return Err(err);
    }

    if scheduler.diagnostics.executed.is_empty() {
        tracing::info!("{} is up to date", goal);
    } else {
        tracing::info!("Build complete!");
    }

    Ok(scheduler.diagnostics)
}
