use std::error::Error;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};

use callwatch_recon::{
    reconcile, ActiveCall, CallSource, CallStore, CancelToken, Category, Command, ReconError,
    Reconciliation, SavedCall,
};

use crate::error::{HarvestError, HarvestInput};
use crate::report::{CategoryReport, HarvestReport};

/// Source of "now" for milestone timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

enum Fetched {
    Feed(Category, Vec<ActiveCall>),
    Stored(Vec<SavedCall>),
}

type FetchResult = Result<Fetched, (HarvestInput, Box<dyn Error + Send>)>;

/// Runs harvests against one source and one store.
///
/// Built once per process and reused; holds no state between harvests.
pub struct Harvester<S, T> {
    source: S,
    store: T,
    clock: Clock,
}

impl<S: CallSource, T: CallStore> Harvester<S, T> {
    pub fn new(source: S, store: T) -> Self {
        Self {
            source,
            store,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    /// One fetch-reconcile-write cycle.
    ///
    /// Both categories are reconciled before the first write. Police
    /// commands are still written before fire commands, but fire is
    /// reconciled before any police write rather than after, so an unknown
    /// status in either feed leaves the store untouched instead of keeping
    /// the police writes. The first failed write ends the harvest with
    /// earlier writes kept.
    pub fn harvest(&self, cancel: &CancelToken) -> Result<HarvestReport, HarvestError> {
        let started_at = (self.clock)();
        let timer = Instant::now();

        let (mut police, mut fire, stored) = self.fetch_all(cancel)?;
        log::debug!(
            "fetched {} police, {} fire, {} stored active",
            police.len(),
            fire.len(),
            stored.len()
        );

        let now = (self.clock)();
        let mut plans = Vec::with_capacity(2);
        for category in Category::ALL {
            let active = match category {
                Category::Police => std::mem::take(&mut police),
                Category::Fire => std::mem::take(&mut fire),
            };
            let plan = reconcile(category, &active, &stored, now).map_err(|e| match e {
                ReconError::UnknownStatus(status) => HarvestError::UnknownStatus { category, status },
            })?;
            plans.push((active.len(), plan));
        }

        let mut categories = Vec::with_capacity(plans.len());
        for (fetched, plan) in &plans {
            self.execute(plan, cancel)?;
            let summary = plan.summary();
            log::info!(
                "{}: {} fetched, {} created, {} updated, {} resolved, {} unchanged",
                plan.category,
                fetched,
                summary.created,
                summary.updated,
                summary.resolved,
                summary.unchanged
            );
            categories.push(CategoryReport {
                category: plan.category,
                fetched: *fetched,
                summary,
            });
        }

        Ok(HarvestReport {
            started_at,
            elapsed_ms: timer.elapsed().as_millis() as u64,
            stored_active: stored.len(),
            categories,
        })
    }

    /// Three parallel reads. The first failure cancels the others.
    fn fetch_all(
        &self,
        cancel: &CancelToken,
    ) -> Result<(Vec<ActiveCall>, Vec<ActiveCall>, Vec<SavedCall>), HarvestError> {
        let fanout = cancel.child();
        let (tx, rx) = mpsc::channel::<FetchResult>();

        let mut police = None;
        let mut fire = None;
        let mut stored = None;
        let mut failure: Option<(HarvestInput, Box<dyn Error + Send>)> = None;

        thread::scope(|scope| {
            for category in Category::ALL {
                let tx = tx.clone();
                let fanout = &fanout;
                let source = &self.source;
                scope.spawn(move || {
                    let result = source
                        .active_calls(category, fanout)
                        .map(|calls| Fetched::Feed(category, calls))
                        .map_err(|e| (HarvestInput::Feed(category), Box::new(e) as Box<dyn Error + Send>));
                    let _ = tx.send(result);
                });
            }

            // The last sender moves into the store thread, so `rx` ends
            // once all three reads have reported.
            let fanout = &fanout;
            let store = &self.store;
            scope.spawn(move || {
                let result = store
                    .active_calls(fanout)
                    .map(Fetched::Stored)
                    .map_err(|e| (HarvestInput::Store, Box::new(e) as Box<dyn Error + Send>));
                let _ = tx.send(result);
            });

            for result in rx {
                match result {
                    Ok(Fetched::Feed(Category::Police, calls)) => police = Some(calls),
                    Ok(Fetched::Feed(Category::Fire, calls)) => fire = Some(calls),
                    Ok(Fetched::Stored(calls)) => stored = Some(calls),
                    Err(err) => {
                        if failure.is_none() {
                            fanout.cancel();
                            failure = Some(err);
                        }
                    }
                }
            }
        });

        if cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }
        if let Some((input, source)) = failure {
            log::warn!("harvest aborted: {} failed: {}", input, source);
            return Err(HarvestError::Fetch { input, source });
        }
        match (police, fire, stored) {
            (Some(police), Some(fire), Some(stored)) => Ok((police, fire, stored)),
            _ => Err(HarvestError::Cancelled),
        }
    }

    fn execute(&self, plan: &Reconciliation, cancel: &CancelToken) -> Result<(), HarvestError> {
        for command in &plan.commands {
            if cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }
            let call = command.call();
            let result = match command {
                Command::Create(call) => self.store.create(call, cancel),
                Command::Update { call, .. } => self.store.update_status(call, cancel),
            };
            if let Err(e) = result {
                if cancel.is_cancelled() {
                    return Err(HarvestError::Cancelled);
                }
                return Err(HarvestError::CommandExecution {
                    category: plan.category,
                    command: command.label(),
                    sort_key: call.sort_key.clone(),
                    source: Box::new(e),
                });
            }
            log::debug!(
                "{} {} {} ({})",
                command.label(),
                plan.category,
                call.sort_key,
                call.last_known_status
            );
        }
        Ok(())
    }
}
