//! The scheduler controller.
//!
//! [`Scheduler`] drives one framework through its lifecycle:
//!
//! ```text
//! Idle ──connect──▶ Subscribing ──▶ Running ──teardown──▶ TearingDown ──▶ Stopped
//!   ▲                    │              │
//!   └──── failure ───────┴── stream end ┘
//! ```
//!
//! Events are handled strictly one at a time. Outbound calls triggered by an
//! event complete before the next event is read, so decisions go out in the
//! same order the offers arrived.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use mesos_solr_protocol::event::{ErrorEvent, Failure, Rescind, Update};
use mesos_solr_protocol::{
    Call, FrameworkId, FrameworkIdentity, Offer, OfferId, ResourceEntry, Subscribed, TaskId,
    TaskLaunch,
};
use mesos_solr_resources::{match_resources, MatchResult};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::dispatcher::{self, Dispatched, EventHandler};
use crate::error::{SchedulerError, SchedulerResult};

/// Heartbeat intervals that may pass without any bytes before the stream is
/// considered dead.
pub const MISSED_HEARTBEAT_LIMIT: u32 = 3;

const TASK_ID_SUFFIX_LEN: usize = 8;
const TASK_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Controller lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Subscribing,
    Running,
    TearingDown,
    Stopped,
}

#[derive(Debug)]
enum Command {
    Stop,
    Teardown,
    Reconcile,
}

/// Cloneable handle for steering a running scheduler from other tasks.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SchedulerHandle {
    /// Leave the event loop without tearing the framework down.
    pub fn stop(&self) -> bool {
        self.tx.send(Command::Stop).is_ok()
    }

    /// Send TEARDOWN and leave the event loop.
    pub fn teardown(&self) -> bool {
        self.tx.send(Command::Teardown).is_ok()
    }

    /// Send an (empty) RECONCILE.
    pub fn reconcile(&self) -> bool {
        self.tx.send(Command::Reconcile).is_ok()
    }
}

enum Step {
    Command(Command),
    Event(Option<mesos_solr_protocol::Event>),
}

/// Scheduler controller.
pub struct Scheduler {
    config: Config,
    framework: FrameworkIdentity,
    conn: ConnectionManager,
    state: SchedulerState,
    backoff: BackoffPolicy,

    /// Checked before each event; set by teardown and stop.
    shutdown: bool,

    heartbeats: u64,
    heartbeat_interval: Option<Duration>,

    /// Offers of the current subscription that already have an accept or
    /// decline on the wire. Cleared on every new subscription.
    decided_offers: HashSet<OfferId>,

    /// Tasks launched and not yet reported terminal.
    active_tasks: HashSet<TaskId>,

    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
}

impl Scheduler {
    /// Create a scheduler for the configured masters.
    pub fn new(config: Config) -> SchedulerResult<Self> {
        let conn = ConnectionManager::new(&config)?;
        let framework =
            FrameworkIdentity::new(&config.framework_name, &config.user, config.checkpoint);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            framework,
            conn,
            state: SchedulerState::Idle,
            backoff: BackoffPolicy::default(),
            shutdown: false,
            heartbeats: 0,
            heartbeat_interval: None,
            decided_offers: HashSet::new(),
            active_tasks: HashSet::new(),
            commands_tx,
            commands_rx,
        })
    }

    /// Replace the backoff used between subscription passes.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            tx: self.commands_tx.clone(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn framework(&self) -> &FrameworkIdentity {
        &self.framework
    }

    pub fn framework_id(&self) -> Option<&FrameworkId> {
        self.framework.id.as_ref()
    }

    pub fn heartbeats(&self) -> u64 {
        self.heartbeats
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    pub fn leader(&self) -> Option<&str> {
        self.conn.leader()
    }

    pub fn is_subscribed(&self) -> bool {
        self.conn.is_subscribed()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown
    }

    pub fn active_tasks(&self) -> &HashSet<TaskId> {
        &self.active_tasks
    }

    pub fn has_decision(&self, offer_id: &OfferId) -> bool {
        self.decided_offers.contains(offer_id)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Subscribe to the first master that accepts us.
    ///
    /// Each attempt walks the full master list; attempts are separated by
    /// exponential backoff. On failure the scheduler stays idle.
    pub async fn connect(&mut self, force: bool) -> SchedulerResult<()> {
        let call = Call::subscribe(&self.framework, force);
        let attempts = self.config.subscribe_attempts.max(1);

        self.state = SchedulerState::Subscribing;
        self.heartbeat_interval = None;

        let mut last_error = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff.delay(attempt - 1);
                info!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying subscription"
                );
                tokio::time::sleep(delay).await;
            }

            match self.conn.subscribe(&call).await {
                Ok(stream) => {
                    info!(
                        leader = %stream.host(),
                        framework = %self.framework.name,
                        force,
                        "Connected"
                    );
                    // Offers from an earlier subscription are void.
                    self.decided_offers.clear();
                    self.state = SchedulerState::Running;
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, attempts, error = %e, "Subscription failed");
                    last_error = Some(e);
                }
            }
        }

        self.state = SchedulerState::Idle;
        Err(last_error.unwrap_or(SchedulerError::NoLeaderAvailable { attempted: 0 }))
    }

    /// Subscribe if needed, then process events until shutdown or failure.
    pub async fn run(&mut self) -> SchedulerResult<()> {
        self.shutdown = false;
        if !self.is_subscribed() {
            self.connect(false).await?;
        }

        self.state = SchedulerState::Running;
        let result = self.event_loop().await;
        self.conn.close();

        match &result {
            Ok(()) => {
                self.state = SchedulerState::Stopped;
                info!(heartbeats = self.heartbeats, "Event loop stopped");
            }
            Err(e) => {
                self.state = SchedulerState::Idle;
                error!(error = %e, "Event loop failed");
            }
        }

        result
    }

    async fn event_loop(&mut self) -> SchedulerResult<()> {
        loop {
            if self.shutdown {
                info!("Shutdown requested, leaving event loop");
                return Ok(());
            }

            let step = tokio::select! {
                biased;
                Some(command) = self.commands_rx.recv() => Step::Command(command),
                event = self.conn.next_event() => Step::Event(event?),
            };

            match step {
                Step::Command(command) => self.apply(command).await,
                Step::Event(Some(event)) => {
                    if let Dispatched::Unhandled(kind) = dispatcher::dispatch(self, event).await? {
                        debug!(kind = %kind, "Event dropped");
                    }
                }
                Step::Event(None) => {
                    warn!("Subscription stream ended");
                    return Err(SchedulerError::StreamEnded);
                }
            }
        }
    }

    async fn apply(&mut self, command: Command) {
        match command {
            Command::Stop => {
                info!("Stop requested");
                self.shutdown = true;
            }
            Command::Teardown => {
                // Failures are logged inside; the loop exits either way.
                let _ = self.teardown().await;
            }
            Command::Reconcile => {
                if let Err(e) = self.reconcile().await {
                    warn!(error = %e, "Reconcile failed");
                }
            }
        }
    }

    /// Send TEARDOWN if subscribed, and always request shutdown.
    pub async fn teardown(&mut self) -> SchedulerResult<()> {
        let mut result = Ok(());

        if self.is_subscribed() {
            self.state = SchedulerState::TearingDown;
            info!(framework_id = ?self.framework.id, "Tearing down framework");

            result = self.send_call(Call::teardown()).await;
            if let Err(e) = &result {
                warn!(error = %e, "Teardown call failed");
            }
        }

        self.shutdown = true;
        result
    }

    /// Ask the master for the state of all tasks.
    pub async fn reconcile(&mut self) -> SchedulerResult<()> {
        debug!("Sending reconcile");
        self.send_call(Call::reconcile()).await
    }

    // -------------------------------------------------------------------------
    // Decisions
    // -------------------------------------------------------------------------

    /// Accept an offer, launching one task on the allocated resources.
    pub async fn accept(
        &mut self,
        offer: &Offer,
        resources: Vec<ResourceEntry>,
    ) -> SchedulerResult<TaskId> {
        if self.decided_offers.contains(&offer.id) {
            return Err(SchedulerError::DuplicateDecision(offer.id.to_string()));
        }

        let task_id = self.next_task_id();
        let launch = TaskLaunch {
            task_id: task_id.clone(),
            agent_id: offer.agent.id.clone(),
            name: self.config.task_name.clone(),
            resources,
            command: self.config.task_command.clone(),
            user: self.config.user.clone(),
        };

        info!(
            offer_id = %offer.id,
            agent = %offer.agent,
            task_id = %task_id,
            "Accepting offer"
        );

        self.decided_offers.insert(offer.id.clone());
        self.send_call(Call::accept(offer.id.clone(), &launch)).await?;
        self.active_tasks.insert(task_id.clone());

        Ok(task_id)
    }

    /// Decline one or more offers in a single call.
    pub async fn decline(&mut self, offer_ids: Vec<OfferId>) -> SchedulerResult<()> {
        if let Some(decided) = offer_ids.iter().find(|id| self.decided_offers.contains(*id)) {
            return Err(SchedulerError::DuplicateDecision(decided.to_string()));
        }

        info!(
            offers = %offer_ids.iter().map(OfferId::as_str).collect::<Vec<_>>().join(","),
            "Declining offers"
        );

        self.decided_offers.extend(offer_ids.iter().cloned());
        self.send_call(Call::decline(offer_ids)).await
    }

    /// Stamp a call with our framework id, send it, and classify the status.
    async fn send_call(&mut self, call: Call) -> SchedulerResult<()> {
        let call = call.with_framework_id(self.framework.id.clone());
        let kind = call.kind;

        let status = self.conn.send(&call, None).await?;
        if !status.is_success() {
            return Err(SchedulerError::RequestRejected { call: kind, status });
        }

        debug!(call = %kind, status = %status, "Call accepted");
        Ok(())
    }

    /// A fresh `<task name>-<8 random chars>` id not used by any active task.
    fn next_task_id(&self) -> TaskId {
        let mut rng = rand::rng();
        loop {
            let suffix: String = (0..TASK_ID_SUFFIX_LEN)
                .map(|_| TASK_ID_CHARSET[rng.random_range(0..TASK_ID_CHARSET.len())] as char)
                .collect();
            let task_id = TaskId::new(format!("{}-{}", self.config.task_name, suffix));

            if !self.active_tasks.contains(&task_id) {
                return task_id;
            }
        }
    }
}

#[async_trait]
impl EventHandler for Scheduler {
    async fn on_subscribed(&mut self, subscribed: Subscribed) -> SchedulerResult<()> {
        let framework_id = subscribed
            .framework_id
            .ok_or(SchedulerError::MissingFrameworkId)?;

        if let Some(current) = &self.framework.id {
            if *current != framework_id {
                warn!(
                    current = %current,
                    received = %framework_id,
                    "Ignoring framework id change"
                );
            } else {
                debug!(framework_id = %framework_id, "Subscription re-acknowledged");
            }
        } else {
            info!(framework_id = %framework_id, "Updated framework id");
            self.framework.id = Some(framework_id);
        }

        if let Some(secs) = subscribed
            .heartbeat_interval_seconds
            .filter(|s| s.is_finite() && *s > 0.0)
        {
            let interval = Duration::try_from_secs_f64(secs).ok();
            let watchdog = interval.and_then(|i| i.checked_mul(MISSED_HEARTBEAT_LIMIT));

            match (interval, watchdog) {
                (Some(interval), Some(watchdog)) => {
                    self.heartbeat_interval = Some(interval);
                    self.conn.set_idle_timeout(Some(watchdog));
                }
                _ => warn!(
                    heartbeat_interval_seconds = secs,
                    "Heartbeat interval out of range, watchdog disabled"
                ),
            }
        }

        Ok(())
    }

    async fn on_heartbeat(&mut self) -> SchedulerResult<()> {
        self.heartbeats += 1;
        debug!(heartbeats = self.heartbeats, "Heartbeat");
        Ok(())
    }

    async fn on_offers(&mut self, offers: Vec<Offer>) -> SchedulerResult<()> {
        if self.framework.id.is_none() {
            warn!(
                count = offers.len(),
                "Offers arrived before subscription was acknowledged, ignoring"
            );
            return Ok(());
        }

        let mut declined: Vec<OfferId> = Vec::new();

        for offer in offers {
            if self.decided_offers.contains(&offer.id) || declined.contains(&offer.id) {
                warn!(offer_id = %offer.id, "Offer already decided, skipping");
                continue;
            }

            match match_resources(&offer.resources, &self.config.requirement) {
                MatchResult::Matched(resources) => {
                    if let Err(e) = self.accept(&offer, resources).await {
                        warn!(offer_id = %offer.id, error = %e, "Failed to accept offer");
                    }
                }
                MatchResult::Insufficient {
                    name,
                    offered,
                    required,
                } => {
                    debug!(
                        offer_id = %offer.id,
                        agent = %offer.agent,
                        resource = %name,
                        offered = ?offered,
                        required,
                        "Offer does not fit"
                    );
                    declined.push(offer.id);
                }
            }
        }

        if !declined.is_empty() {
            if let Err(e) = self.decline(declined).await {
                warn!(error = %e, "Failed to decline offers");
            }
        }

        Ok(())
    }

    async fn on_rescind(&mut self, rescind: Rescind) -> SchedulerResult<()> {
        info!(offer_id = %rescind.offer_id, "Offer rescinded");
        // A rescinded id is never offered again.
        self.decided_offers.remove(&rescind.offer_id);
        Ok(())
    }

    async fn on_update(&mut self, update: Update) -> SchedulerResult<()> {
        let status = update.status;
        info!(
            task_id = %status.task_id,
            state = %status.state,
            message = ?status.message,
            "Task status update"
        );

        if status.is_terminal() && self.active_tasks.remove(&status.task_id) {
            debug!(
                task_id = %status.task_id,
                active = self.active_tasks.len(),
                "Task finished"
            );
        }

        Ok(())
    }

    async fn on_failure(&mut self, failure: Failure) -> SchedulerResult<()> {
        warn!(
            agent_id = ?failure.agent_id,
            executor_id = ?failure.executor_id,
            status = ?failure.status,
            "Agent or executor failure"
        );
        Ok(())
    }

    async fn on_error(&mut self, error: ErrorEvent) -> SchedulerResult<()> {
        error!(message = %error.message, "Master reported an error");
        Ok(())
    }
}
