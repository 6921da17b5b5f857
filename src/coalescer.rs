//! Decides when a sort pass runs.
//!
//! [`Coalescer`] is the pure state machine; [`AutoSorter`] drives it from a
//! tokio task, feeding it change events, commands and timer expiries.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::event::{ChangeEvent, ChangeListener, Command};

/// Outcome of one sort pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub folders_visited: usize,
    pub folders_sorted: usize,
    pub folders_skipped: usize,
    pub moves_applied: usize,
    pub moves_failed: usize,
    pub registry_pruned: usize,
    /// The store changed during the pass and another pass should follow.
    pub rescan_needed: bool,
}

/// Something that can run a full sort pass.
#[async_trait]
pub trait SortPass: Send {
    async fn run_pass(&mut self) -> Result<PassReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    /// A quiet-period timer is pending.
    Waiting { last_activity: Instant },
    /// A pass is running and change listeners are detached.
    Sorting,
}

/// What the driver has to do after feeding the machine an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Nothing,
    /// (Re-)arm the timer to fire at this instant.
    ArmTimer(Instant),
    /// Detach listeners and run a pass now.
    StartPass,
}

#[derive(Debug)]
pub struct Coalescer {
    state: State,
    quiet_period: Duration,
    auto_sort: bool,
}

impl Coalescer {
    pub fn new(quiet_period: Duration, auto_sort: bool) -> Self {
        Self {
            state: State::Idle,
            quiet_period,
            auto_sort,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn auto_sort(&self) -> bool {
        self.auto_sort
    }

    pub fn set_auto_sort(&mut self, enabled: bool) {
        self.auto_sort = enabled;
    }

    /// A change was reported by the host store.
    pub fn on_change(&mut self, now: Instant) -> Directive {
        match self.state {
            State::Idle if self.auto_sort => {
                self.state = State::Waiting { last_activity: now };
                Directive::ArmTimer(now + self.quiet_period)
            }
            State::Waiting { .. } => {
                // The armed timer stays; it re-arms itself when it fires early.
                self.state = State::Waiting { last_activity: now };
                Directive::Nothing
            }
            _ => Directive::Nothing,
        }
    }

    /// The quiet-period timer fired.
    pub fn on_timer(&mut self, now: Instant) -> Directive {
        let State::Waiting { last_activity } = self.state else {
            return Directive::Nothing;
        };
        let deadline = last_activity + self.quiet_period;
        if now >= deadline {
            self.state = State::Sorting;
            Directive::StartPass
        } else {
            Directive::ArmTimer(deadline)
        }
    }

    /// A manual sort request. Only starts a pass when nothing is pending.
    pub fn on_sort_now(&mut self) -> Directive {
        match self.state {
            State::Idle => {
                self.state = State::Sorting;
                Directive::StartPass
            }
            _ => Directive::Nothing,
        }
    }

    /// The running pass finished (successfully or not) and listeners are back.
    pub fn on_pass_finished(&mut self) {
        self.state = State::Idle;
    }
}

/// Sends commands to a running [`AutoSorter`].
#[derive(Debug, Clone)]
pub struct AutoSortHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl AutoSortHandle {
    /// Returns `false` if the auto-sorter has already stopped.
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn sort_now(&self) -> bool {
        self.send(Command::SortNow)
    }

    pub fn set_auto_sort(&self, enabled: bool) -> bool {
        self.send(Command::SetAutoSort(enabled))
    }

    pub fn shutdown(&self) -> bool {
        self.send(Command::Shutdown)
    }
}

/// Runs sort passes in response to change events and commands.
pub struct AutoSorter<P> {
    pass: P,
    machine: Coalescer,
    listener: ChangeListener,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    settle: Duration,
    /// Cleared once every [`AutoSortHandle`] is gone.
    commands_open: bool,
}

impl<P: SortPass> AutoSorter<P> {
    /// `listener` must be the registration feeding `events`.
    pub fn new(
        pass: P,
        listener: ChangeListener,
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        quiet_period: Duration,
        settle: Duration,
        auto_sort: bool,
    ) -> (Self, AutoSortHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let sorter = Self {
            pass,
            machine: Coalescer::new(quiet_period, auto_sort),
            listener,
            events,
            commands,
            settle,
            commands_open: true,
        };
        (sorter, AutoSortHandle { tx })
    }

    /// Process events and commands until shut down. Returns the pass runner.
    pub async fn run(mut self) -> P {
        let mut deadline: Option<Instant> = None;
        let mut events_open = true;

        loop {
            let directive = tokio::select! {
                event = self.events.recv(), if events_open => match event {
                    Some(event) => {
                        debug!(kind = ?event.kind, id = %event.id, "change observed");
                        self.machine.on_change(Instant::now())
                    }
                    None => {
                        events_open = false;
                        Directive::Nothing
                    }
                },
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(Command::SortNow) => self.machine.on_sort_now(),
                    Some(Command::SetAutoSort(enabled)) => {
                        info!(enabled, "auto-sort toggled");
                        self.machine.set_auto_sort(enabled);
                        Directive::Nothing
                    }
                    Some(Command::Shutdown) | None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    self.machine.on_timer(Instant::now())
                }
            };

            match directive {
                Directive::Nothing => {}
                Directive::ArmTimer(at) => deadline = Some(at),
                Directive::StartPass => {
                    let (keep_running, follow_up) = self.sort_pass().await;
                    if !keep_running {
                        break;
                    }
                    deadline = follow_up;
                }
            }
        }
        self.pass
    }

    /// Run one pass with the listener detached. Returns `false` if a
    /// shutdown arrived while sorting, plus the deadline of a follow-up pass
    /// when the store reported changes it could not take in.
    ///
    /// The settle delay still counts as sorting: manual requests received
    /// during it are dropped like those received during the pass.
    async fn sort_pass(&mut self) -> (bool, Option<Instant>) {
        self.listener.detach();
        let mut keep_running = true;
        let mut rescan = false;

        let result = {
            let run = self.pass.run_pass();
            tokio::pin!(run);
            loop {
                tokio::select! {
                    result = &mut run => break result,
                    command = self.commands.recv(), if self.commands_open => {
                        keep_running &= command_while_sorting(
                            &mut self.machine,
                            &mut self.commands_open,
                            command,
                        );
                    }
                }
            }
        };
        match result {
            Ok(report) => {
                info!(
                    folders = report.folders_visited,
                    sorted = report.folders_sorted,
                    skipped = report.folders_skipped,
                    moves = report.moves_applied,
                    failed = report.moves_failed,
                    pruned = report.registry_pruned,
                    "sort pass finished"
                );
                rescan = report.rescan_needed;
            }
            Err(e) => error!(error = %e, "sort pass failed"),
        }

        let settle = tokio::time::sleep(self.settle);
        tokio::pin!(settle);
        loop {
            tokio::select! {
                _ = &mut settle => break,
                command = self.commands.recv(), if self.commands_open => {
                    keep_running &= command_while_sorting(
                        &mut self.machine,
                        &mut self.commands_open,
                        command,
                    );
                }
            }
        }
        while self.events.try_recv().is_ok() {}
        self.listener.attach();
        self.machine.on_pass_finished();

        let mut follow_up = None;
        if rescan {
            if let Directive::ArmTimer(at) = self.machine.on_change(Instant::now()) {
                follow_up = Some(at);
            }
        }
        (keep_running, follow_up)
    }
}

/// Handle a command that arrives while a pass or its settle delay is running.
/// Returns `false` when the sorter should stop afterwards.
fn command_while_sorting(
    machine: &mut Coalescer,
    commands_open: &mut bool,
    command: Option<Command>,
) -> bool {
    match command {
        Some(Command::SetAutoSort(enabled)) => {
            info!(enabled, "auto-sort toggled");
            machine.set_auto_sort(enabled);
            true
        }
        Some(Command::SortNow) => {
            debug!("sort already running");
            true
        }
        Some(Command::Shutdown) => false,
        None => {
            *commands_open = false;
            false
        }
    }
}
