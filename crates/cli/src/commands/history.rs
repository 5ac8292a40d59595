use pricetrail_core::audit::AuditHistory;
use pricetrail_core::domain::snapshot::ServicePriceId;
use pricetrail_core::errors::ApplicationError;
use pricetrail_db::SqlAuditRecordRepository;

use crate::commands::{application_failure, build_runtime, load_config, open_pool, CommandResult};

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Audit records for one price, newest first.
pub fn run(price_id: i64, limit: u32) -> CommandResult {
    let config = match load_config("history") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("history") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match open_pool("history", &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };
        let repository = SqlAuditRecordRepository::new(pool.clone());
        let result = repository.history_for_price(ServicePriceId(price_id), limit).await;
        pool.close().await;

        match result {
            Ok(records) => CommandResult::success_with_data(
                "history",
                format!("{} audit record(s) for price {price_id}", records.len()),
                records,
            ),
            Err(error) => application_failure("history", ApplicationError::from(error)),
        }
    })
}
