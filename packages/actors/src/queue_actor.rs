//! Queue actor owning one in-memory broker queue.
//!
//! Jobs move waiting -> active -> completed | failed. A failed attempt with
//! attempts left goes back to waiting, after the backoff delay if one is set.
//! A lease that outlives the lease timeout is reported stalled and redelivered.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use queue_core::{
    BrokerError, Job, JobId, JobOptions, JobTemplate, QueueEvent, RepeatPolicy,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::memory::MemoryBrokerConfig;
use crate::messages::{QueueCounts, QueueMessage};

/// Wrapper for priority queue ordering (higher priority first, older jobs first).
#[derive(Debug, Clone)]
struct PriorityJob {
    job: Job,
    seq: u64,
}

impl PartialEq for PriorityJob {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for PriorityJob {}

impl PartialOrd for PriorityJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first
        match self.job.options.priority.cmp(&other.job.options.priority) {
            // Earlier arrivals first
            Ordering::Equal => other.seq.cmp(&self.seq),
            other => other,
        }
    }
}

#[derive(Debug)]
struct DelayedJob {
    ready_at: Instant,
    job: Job,
}

#[derive(Debug)]
struct Lease {
    job: Job,
    worker_id: String,
    expires_at: Instant,
}

struct SchedulerEntry {
    template: JobTemplate,
    repeat: RepeatPolicy,
    produced: u32,
    generation: u64,
    task: JoinHandle<()>,
}

/// Arguments for spawning a queue actor.
pub struct QueueActorArgs {
    pub queue_name: String,
    pub config: MemoryBrokerConfig,
    pub event_tx: broadcast::Sender<QueueEvent>,
}

/// State for the queue actor.
pub struct QueueActorState {
    queue_name: String,
    config: MemoryBrokerConfig,
    next_id: u64,
    next_seq: u64,
    /// Live jobs (waiting, delayed or active) by ID.
    jobs: HashMap<JobId, Job>,
    waiting: BinaryHeap<PriorityJob>,
    delayed: Vec<DelayedJob>,
    active: HashMap<JobId, Lease>,
    stalls: HashMap<JobId, u32>,
    completed: u64,
    failed: u64,
    schedulers: HashMap<String, SchedulerEntry>,
    event_tx: broadcast::Sender<QueueEvent>,
    ticker: Option<JoinHandle<()>>,
}

impl QueueActorState {
    fn new(args: QueueActorArgs) -> Self {
        Self {
            queue_name: args.queue_name,
            config: args.config,
            next_id: 1,
            next_seq: 0,
            jobs: HashMap::new(),
            waiting: BinaryHeap::new(),
            delayed: Vec::new(),
            active: HashMap::new(),
            stalls: HashMap::new(),
            completed: 0,
            failed: 0,
            schedulers: HashMap::new(),
            event_tx: args.event_tx,
            ticker: None,
        }
    }

    /// Broadcast an event. Nobody listening is fine.
    fn broadcast(&self, event: QueueEvent) {
        let _ = self.event_tx.send(event);
    }

    fn add(&mut self, job_name: String, payload: serde_json::Value, options: JobOptions) -> Job {
        if let Some(existing) = options.job_id.as_ref().and_then(|id| self.jobs.get(id)) {
            tracing::debug!(queue = %self.queue_name, id = %existing.id, "Duplicate job id ignored");
            return existing.clone();
        }

        let id = match options.job_id.clone() {
            Some(id) => id,
            None => self.next_free_id(),
        };

        let job = Job::new(id, &self.queue_name, job_name, payload, options);
        self.jobs.insert(job.id.clone(), job.clone());
        let delay = job.options.delay();
        self.requeue(job.clone(), delay);
        job
    }

    /// Next sequential id not held by a live job. Custom ids may be numeric too.
    fn next_free_id(&mut self) -> JobId {
        loop {
            let id = JobId::new(self.next_id.to_string());
            self.next_id += 1;
            if !self.jobs.contains_key(&id) {
                return id;
            }
        }
    }

    /// Renew the lease held by `worker_id` for another lease timeout.
    fn extend_lease(&mut self, job_id: &JobId, worker_id: &str) -> Result<(), BrokerError> {
        match self.active.get_mut(job_id) {
            None => Err(BrokerError::JobNotFound(job_id.clone())),
            Some(lease) if lease.worker_id != worker_id => Err(BrokerError::LeaseMismatch {
                job_id: job_id.clone(),
                worker_id: worker_id.to_string(),
            }),
            Some(lease) => {
                lease.expires_at = Instant::now() + self.config.lease_timeout;
                Ok(())
            }
        }
    }

    /// Put a job back into the waiting set, or into the delayed set when `delay` is non-zero.
    fn requeue(&mut self, job: Job, delay: std::time::Duration) {
        if delay.is_zero() {
            self.push_waiting(job);
        } else {
            self.delayed.push(DelayedJob {
                ready_at: Instant::now() + delay,
                job,
            });
        }
    }

    fn push_waiting(&mut self, job: Job) {
        let event = QueueEvent::waiting(&self.queue_name, job.id.clone());
        self.next_seq += 1;
        self.waiting.push(PriorityJob {
            job,
            seq: self.next_seq,
        });
        self.broadcast(event);
    }

    fn promote_due(&mut self, now: Instant) {
        if self.delayed.is_empty() {
            return;
        }

        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.delayed)
            .into_iter()
            .partition(|d| d.ready_at <= now);
        self.delayed = pending;

        due.sort_by_key(|d| d.ready_at);
        for delayed in due {
            self.push_waiting(delayed.job);
        }
    }

    fn lease(&mut self, worker_id: String) -> Option<Job> {
        self.promote_due(Instant::now());

        let mut job = self.waiting.pop()?.job;
        job.attempts_made = job.attempts_made.saturating_add(1);
        self.jobs.insert(job.id.clone(), job.clone());
        self.active.insert(
            job.id.clone(),
            Lease {
                job: job.clone(),
                worker_id,
                expires_at: Instant::now() + self.config.lease_timeout,
            },
        );

        self.broadcast(QueueEvent::active(&self.queue_name, job.id.clone()));
        Some(job)
    }

    fn release(&mut self, job_id: &JobId, worker_id: &str) -> Result<Job, BrokerError> {
        match self.active.get(job_id) {
            None => Err(BrokerError::JobNotFound(job_id.clone())),
            Some(lease) if lease.worker_id != worker_id => Err(BrokerError::LeaseMismatch {
                job_id: job_id.clone(),
                worker_id: worker_id.to_string(),
            }),
            Some(_) => self
                .active
                .remove(job_id)
                .map(|lease| lease.job)
                .ok_or_else(|| BrokerError::JobNotFound(job_id.clone())),
        }
    }

    fn complete(
        &mut self,
        job_id: JobId,
        worker_id: &str,
        return_value: serde_json::Value,
    ) -> Result<(), BrokerError> {
        let job = self.release(&job_id, worker_id)?;
        self.jobs.remove(&job.id);
        self.stalls.remove(&job.id);
        self.completed += 1;

        self.broadcast(QueueEvent::completed(&self.queue_name, job.id, return_value));
        Ok(())
    }

    fn fail(&mut self, job_id: JobId, worker_id: &str, reason: String) -> Result<(), BrokerError> {
        let job = self.release(&job_id, worker_id)?;
        self.record_failure(job, reason);
        Ok(())
    }

    fn record_failure(&mut self, job: Job, reason: String) {
        let will_retry = job.has_attempts_left();

        self.broadcast(
            QueueEvent::failed(&self.queue_name, job.id.clone(), reason.clone()).with_details(
                json!({
                    "failedReason": reason,
                    "attemptsMade": job.attempts_made,
                    "willRetry": will_retry,
                }),
            ),
        );

        if will_retry {
            let delay = job
                .options
                .backoff
                .map(|b| b.delay_for(job.attempts_made))
                .unwrap_or_default();
            self.requeue(job, delay);
        } else {
            self.jobs.remove(&job.id);
            self.stalls.remove(&job.id);
            self.failed += 1;
        }
    }

    fn check_stalled(&mut self, now: Instant) {
        let expired: Vec<JobId> = self
            .active
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for job_id in expired {
            let Some(lease) = self.active.remove(&job_id) else {
                continue;
            };
            let mut job = lease.job;

            tracing::warn!(
                queue = %self.queue_name,
                id = %job.id,
                worker = %lease.worker_id,
                "Job lease expired"
            );
            self.broadcast(QueueEvent::stalled(&self.queue_name, job.id.clone()));

            let stalls = self.stalls.entry(job.id.clone()).or_insert(0);
            *stalls += 1;

            if *stalls > self.config.max_stalled_count {
                job.attempts_made = job.options.attempts;
                self.record_failure(job, "job stalled more than allowable limit".to_string());
            } else {
                // A stalled delivery does not use up an attempt
                job.attempts_made = job.attempts_made.saturating_sub(1);
                self.jobs.insert(job.id.clone(), job.clone());
                self.push_waiting(job);
            }
        }
    }

    fn counts(&self) -> QueueCounts {
        QueueCounts {
            waiting: self.waiting.len() as u64,
            delayed: self.delayed.len() as u64,
            active: self.active.len() as u64,
            completed: self.completed,
            failed: self.failed,
            schedulers: self.schedulers.len() as u64,
        }
    }

    fn produce_from_scheduler(&mut self, scheduler_id: &str) -> Option<Job> {
        let entry = self.schedulers.get_mut(scheduler_id)?;
        entry.produced += 1;
        let template = entry.template.clone();
        let exhausted = entry.repeat.limit.is_some_and(|limit| entry.produced >= limit);

        if exhausted && let Some(entry) = self.schedulers.remove(scheduler_id) {
            entry.task.abort();
            tracing::debug!(queue = %self.queue_name, scheduler = %scheduler_id, "Scheduler finished");
        }

        Some(self.add(template.name, template.data, template.options))
    }
}

/// Queue actor that manages a single in-memory queue.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = QueueActorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting queue actor: {}", args.queue_name);

        let mut state = QueueActorState::new(args);

        // Housekeeping loop
        let interval = state.config.tick_interval;
        let myself_clone = myself.clone();
        state.ticker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if myself_clone.send_message(QueueMessage::Tick).is_err() {
                    break;
                }
            }
        }));

        Ok(state)
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        for (_, entry) in state.schedulers.drain() {
            entry.task.abort();
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Add {
                job_name,
                payload,
                options,
                reply,
            } => {
                let job = state.add(job_name, payload, options);
                let _ = reply.send(Ok(job));
            }

            QueueMessage::Lease { worker_id, reply } => {
                let _ = reply.send(state.lease(worker_id));
            }

            QueueMessage::ExtendLease {
                job_id,
                worker_id,
                reply,
            } => {
                let _ = reply.send(state.extend_lease(&job_id, &worker_id));
            }

            QueueMessage::Complete {
                job_id,
                worker_id,
                return_value,
                reply,
            } => {
                let _ = reply.send(state.complete(job_id, &worker_id, return_value));
            }

            QueueMessage::Fail {
                job_id,
                worker_id,
                reason,
                reply,
            } => {
                let _ = reply.send(state.fail(job_id, &worker_id, reason));
            }

            QueueMessage::UpsertScheduler {
                scheduler_id,
                repeat,
                template,
                reply,
            } => {
                let generation = match state.schedulers.remove(&scheduler_id) {
                    Some(previous) => {
                        previous.task.abort();
                        previous.generation + 1
                    }
                    None => 0,
                };

                let interval = repeat.interval();
                let myself_clone = myself.clone();
                let tick_id = scheduler_id.clone();
                let task = tokio::spawn(async move {
                    let mut ticker =
                        tokio::time::interval_at(Instant::now() + interval, interval);
                    loop {
                        ticker.tick().await;
                        let tick = QueueMessage::SchedulerTick {
                            scheduler_id: tick_id.clone(),
                            generation,
                        };
                        if myself_clone.send_message(tick).is_err() {
                            break;
                        }
                    }
                });

                tracing::info!(
                    queue = %state.queue_name,
                    scheduler = %scheduler_id,
                    every_ms = repeat.every_ms,
                    "Scheduler upserted"
                );

                state.schedulers.insert(
                    scheduler_id.clone(),
                    SchedulerEntry {
                        template,
                        repeat,
                        produced: 0,
                        generation,
                        task,
                    },
                );

                let first = if repeat.immediately {
                    state.produce_from_scheduler(&scheduler_id)
                } else {
                    None
                };
                let _ = reply.send(first);
            }

            QueueMessage::RemoveScheduler {
                scheduler_id,
                reply,
            } => {
                let removed = match state.schedulers.remove(&scheduler_id) {
                    Some(entry) => {
                        entry.task.abort();
                        true
                    }
                    None => false,
                };
                let _ = reply.send(removed);
            }

            QueueMessage::SchedulerTick {
                scheduler_id,
                generation,
            } => {
                let current = state
                    .schedulers
                    .get(&scheduler_id)
                    .is_some_and(|entry| entry.generation == generation);
                if current {
                    state.produce_from_scheduler(&scheduler_id);
                }
            }

            QueueMessage::GetJob { job_id, reply } => {
                let _ = reply.send(state.jobs.get(&job_id).cloned());
            }

            QueueMessage::GetCounts { reply } => {
                let _ = reply.send(state.counts());
            }

            QueueMessage::Shutdown => {
                tracing::info!("Shutting down queue: {}", state.queue_name);
                myself.stop(None);
                return Ok(());
            }

            QueueMessage::Tick => {
                let now = Instant::now();
                state.promote_due(now);
                state.check_stalled(now);
            }
        }

        Ok(())
    }
}
