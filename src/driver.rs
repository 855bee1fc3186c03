use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::parser::{Continuation, Message, Parser};
use crate::result_set::ResultSet;
use crate::state::State;

struct Job {
    label: Box<dyn Fn() -> String>,
    body: Box<dyn FnOnce(&mut Driver)>,
}

/// The cooperative engine core of a single run.
///
/// The driver owns a FIFO queue of pending jobs, the furthest-failure
/// record, and the fatal-condition latch. It is threaded as an explicit
/// argument through every parser invocation; a job may enqueue further
/// jobs, trading stack depth for queue depth. Jobs are never preempted and
/// there is no parallelism.
pub struct Driver {
    queue: VecDeque<Job>,
    furthest: Option<(usize, Message)>,
    fatal: Option<EngineError>,
    jobs_run: usize,
}

impl Driver {
    /// Creates a driver with an empty queue.
    #[inline]
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            furthest: None,
            fatal: None,
            jobs_run: 0,
        }
    }

    /// Enqueues a job. The label is rendered lazily and only for the debug
    /// channel.
    #[inline]
    pub fn add_job<L, B>(&mut self, label: L, body: B)
    where
        L: Fn() -> String + 'static,
        B: FnOnce(&mut Driver) + 'static,
    {
        self.queue.push_back(Job {
            label: Box::new(label),
            body: Box::new(body),
        });
    }

    /// Pops and runs jobs in insertion order until the queue is empty or a
    /// fatal condition is raised.
    pub fn drain(&mut self) -> Result<(), EngineError> {
        while self.fatal.is_none() {
            let job = match self.queue.pop_front() {
                Some(job) => job,
                None => break,
            };
            self.jobs_run += 1;
            if log::log_enabled!(log::Level::Trace) {
                log::trace!("job {}: {}", self.jobs_run, (job.label)());
            }
            (job.body)(self);
        }
        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Offers a failure to the furthest-failure record. Later failures at
    /// the same offset replace earlier ones.
    pub(crate) fn note_failure(&mut self, pos: usize, message: &Message) {
        let further = match &self.furthest {
            None => true,
            Some((best, ..)) => pos >= *best,
        };
        if further {
            self.furthest = Some((pos, message.clone()));
        }
    }

    /// Latches a fatal condition; the first one raised wins and the drain
    /// stops before the next job.
    pub(crate) fn raise(&mut self, error: EngineError) {
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
    }

    pub(crate) fn take_furthest(&mut self) -> Option<(usize, Message)> {
        self.furthest.take()
    }
}

impl Default for Driver {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("pending", &self.queue.len())
            .field("jobs_run", &self.jobs_run)
            .field("furthest", &self.furthest.as_ref().map(|(pos, ..)| *pos))
            .finish()
    }
}

/// Runs `parser` against `input`, collecting every distinct successful
/// top-level parse into the returned [`ResultSet`].
///
/// Listeners attached to the set receive successes as the queue drains; the
/// set keeps growing until the run is exhausted. When the set stays empty,
/// [`ResultSet::best_failure`] holds the furthest-reaching failure as the
/// diagnostic.
///
/// Returns `Err` only for fatal conditions: a zero-width repetition, a null
/// top-level value, or an unhandled listener error.
pub fn run(parser: &Parser, input: &str) -> Result<ResultSet, EngineError> {
    let mut drv = Driver::new();
    let results = ResultSet::new();
    let state = State::new(input);

    let sink = results.clone();
    let k: Continuation = Rc::new(move |drv: &mut Driver, out: Outcome| {
        if let Ok(m) = out.status {
            if let Err(err) = sink.add(m.value) {
                drv.raise(err);
            }
        }
    });

    let root = parser.clone();
    let label = parser.message().clone();
    drv.add_job(
        move || format!("run {}", label),
        move |drv| root.parse(drv, state, k),
    );
    drv.drain()?;

    if let Some((pos, message)) = drv.take_furthest() {
        results.record_best_failure(pos, message.render());
    }
    Ok(results)
}
