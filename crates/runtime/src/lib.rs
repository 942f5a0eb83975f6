//! The `tania` process: open the configured engine, bring the read side up to
//! date, then flag overdue tasks on a fixed interval until Ctrl-C.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use tania_infra::{TaniaConfig, TaniaCore};

pub async fn run(config: TaniaConfig) -> anyhow::Result<()> {
    info!(
        engine = %config.persistence.engine,
        sweep_secs = config.due_sweep_interval.as_secs(),
        "starting farm core"
    );
    let core = TaniaCore::build(&config)
        .await
        .context("failed to open the persistence engine")?;

    if config.rebuild_on_start {
        core.rebuild()
            .await
            .context("failed to rebuild the read side")?;
    } else if let Err(err) = core.verify().await {
        warn!(error = %err, "read side differs from the ledger; set TANIA_REBUILD_ON_START=true to repair");
    }

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    run_until(&core, config.due_sweep_interval, shutdown).await;

    core.shutdown().await;
    info!("farm core stopped");
    Ok(())
}

/// Sweep for overdue tasks every `interval` until `shutdown` resolves.
///
/// Returns the number of sweeps that ran. A failed sweep is logged and the
/// loop carries on.
pub async fn run_until<F>(core: &TaniaCore, interval: Duration, shutdown: F) -> usize
where
    F: Future<Output = ()>,
{
    let sweeper = core.due_sweeper();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut sweeps = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(sweeps, "shutdown requested");
                return sweeps;
            }
            _ = ticker.tick() => {
                sweeps += 1;
                if let Err(err) = sweeper.sweep(Utc::now()).await {
                    error!(error = %err, "due sweep failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration as ChronoDuration;
    use tania_tasks::{CreateTask, TaskCategory, TaskCommand, TaskDomain, TaskId, TaskPriority};

    #[tokio::test]
    async fn sweeps_until_shutdown_and_flags_overdue_tasks() {
        let core = TaniaCore::in_memory();
        let task_id = TaskId::generate();
        let created = Utc::now() - ChronoDuration::seconds(1);
        core.tasks()
            .task(TaskCommand::Create(CreateTask {
                task_id,
                title: "Check the pump".to_string(),
                description: String::new(),
                due_date: Some(created),
                priority: TaskPriority::Urgent,
                category: TaskCategory::Reservoir,
                domain: TaskDomain::General,
                asset_id: None,
                occurred_at: created,
            }))
            .await
            .unwrap();

        let sweeps = run_until(
            &core,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await;

        assert!(sweeps >= 1);
        let row = core.views().tasks.get(task_id.aggregate_id()).await.unwrap();
        assert!(row.is_due);
    }

    #[tokio::test]
    async fn immediate_shutdown_stops_the_loop() {
        let core = TaniaCore::in_memory();
        let report = core.rebuild().await.unwrap();
        assert_eq!(report.events_replayed(), 0);

        let sweeps = run_until(&core, Duration::from_secs(3600), async {}).await;
        assert!(sweeps <= 1);
    }
}
