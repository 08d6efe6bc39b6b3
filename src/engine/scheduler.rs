//! System scheduling and execution.
//!
//! The scheduler owns the storage and an ordered list of systems. Each tick
//! it builds a fresh [`Frame`], runs every system in registration order on
//! the calling thread, and then flushes the frame's command buffer against
//! the storage. Structural changes recorded through commands are therefore
//! invisible until the frame boundary, while direct storage mutation by an
//! earlier system is visible to later ones immediately.
//!
//! Per-system wall-clock timing is recorded on every tick and exposed via
//! [`Scheduler::stats`]. An erroring (panicking) system aborts the tick;
//! the scheduler does not catch or translate system errors.

use std::any::type_name;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver};
use crossbeam::select;
use log::debug;

use crate::engine::frame::Frame;
use crate::engine::storage::Storage;
use crate::engine::systems::System;

#[derive(Default)]
struct Timing {
    execution_count: u64,
    min: Duration,
    max: Duration,
    total: Duration,
    last: Duration,
}

impl Timing {
    fn record(&mut self, elapsed: Duration) {
        if self.execution_count == 0 || elapsed < self.min {
            self.min = elapsed;
        }
        if elapsed > self.max {
            self.max = elapsed;
        }
        self.total += elapsed;
        self.last = elapsed;
        self.execution_count += 1;
    }
}

struct RegisteredSystem {
    system: Box<dyn System>,
    name: &'static str,
    timing: Timing,
}

/// Ordered system registry driving the tick loop.
pub struct Scheduler {
    storage: Storage,
    systems: Vec<RegisteredSystem>,
}

impl Scheduler {
    /// Creates a scheduler owning the given storage.
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            systems: Vec::new(),
        }
    }

    /// Shared access to the owned storage.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Exclusive access to the owned storage, for setup and direct
    /// mutation between ticks.
    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    /// Registers a system, binding its descriptors to the storage. Systems
    /// execute in registration order.
    pub fn register<S: System + 'static>(&mut self, mut system: S) {
        system.bind(&mut self.storage);
        let name = short_type_name::<S>();
        debug!("registered system {name}");
        self.systems.push(RegisteredSystem {
            system: Box::new(system),
            name,
            timing: Timing::default(),
        });
    }

    /// Executes one tick: runs every system in order with the given delta
    /// time, then flushes the frame's command buffer.
    pub fn once(&mut self, delta_time: f64) {
        let mut frame = Frame::new(delta_time, &mut self.storage);

        for entry in &mut self.systems {
            let start = Instant::now();
            entry.system.execute(&mut frame);
            entry.timing.record(start.elapsed());
        }

        let Frame {
            mut commands,
            storage,
            ..
        } = frame;
        commands.flush(storage);
    }

    /// Ticks continuously at `interval` until a message (or disconnect)
    /// arrives on `shutdown`.
    ///
    /// Each tick's delta time is the wall-clock time since the previous
    /// tick. There is no catch-up scheduling: if a tick overruns the
    /// interval, missed ticks are dropped. Cancellation is only observed
    /// between ticks, never mid-tick.
    pub fn run(&mut self, interval: Duration, shutdown: &Receiver<()>) {
        let ticker = channel::tick(interval);
        let mut last = Instant::now();

        loop {
            select! {
                recv(shutdown) -> _ => return,
                recv(ticker) -> _ => {
                    let now = Instant::now();
                    let delta_time = now.duration_since(last).as_secs_f64();
                    last = now;
                    self.once(delta_time);
                }
            }
        }
    }

    /// Collects execution statistics for every registered system.
    pub fn stats(&self) -> SchedulerStats {
        let systems: Vec<SystemStats> = self
            .systems
            .iter()
            .map(|entry| SystemStats {
                name: entry.name,
                execution_count: entry.timing.execution_count,
                min_duration: entry.timing.min,
                max_duration: entry.timing.max,
                avg_duration: if entry.timing.execution_count == 0 {
                    Duration::ZERO
                } else {
                    entry.timing.total / entry.timing.execution_count as u32
                },
                last_duration: entry.timing.last,
                total_duration: entry.timing.total,
            })
            .collect();

        SchedulerStats {
            system_count: systems.len(),
            total_executions: systems.iter().map(|stats| stats.execution_count).sum(),
            systems,
        }
    }
}

/// Last path segment of a type name, used as the system's display name.
fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Execution statistics of one registered system.
#[derive(Clone, Debug)]
pub struct SystemStats {
    /// Display name derived from the system's type name.
    pub name: &'static str,
    /// Number of completed executions.
    pub execution_count: u64,
    /// Shortest observed execution.
    pub min_duration: Duration,
    /// Longest observed execution.
    pub max_duration: Duration,
    /// Mean execution duration.
    pub avg_duration: Duration,
    /// Duration of the most recent execution.
    pub last_duration: Duration,
    /// Sum of all execution durations.
    pub total_duration: Duration,
}

/// Aggregate execution statistics for a [`Scheduler`].
#[derive(Clone, Debug)]
pub struct SchedulerStats {
    /// Number of registered systems.
    pub system_count: usize,
    /// Total executions across all systems.
    pub total_executions: u64,
    /// Per-system detail, in registration order.
    pub systems: Vec<SystemStats>,
}
