use pricetrail_db::migrations;

use crate::commands::{build_runtime, load_config, open_pool, CommandResult, EXIT_QUERY};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match open_pool("migrate", &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };

        let outcome = migrations::apply_pending(&pool).await;
        pool.close().await;
        let report = match outcome {
            Ok(report) => report,
            Err(error) => {
                let message = error.to_string();
                return CommandResult::failure("migrate", "migration", message, EXIT_QUERY);
            }
        };

        tracing::info!(
            event_name = "db.migrations.applied",
            applied = report.applied.len(),
            total = report.current.len(),
            "database migrations applied"
        );

        CommandResult::success_with_data(
            "migrate",
            format!("applied {} pending migration(s)", report.applied.len()),
            serde_json::json!({ "applied": report.applied, "current": report.current }),
        )
    })
}
