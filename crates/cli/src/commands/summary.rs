use std::collections::BTreeMap;

use pricetrail_core::audit::AuditHistory;
use pricetrail_core::domain::snapshot::ServicePriceId;
use pricetrail_core::errors::ApplicationError;
use pricetrail_db::SqlAuditRecordRepository;

use crate::commands::{application_failure, build_runtime, load_config, open_pool, CommandResult};

/// Count of audit records per change type for one price.
pub fn run(price_id: i64) -> CommandResult {
    let config = match load_config("summary") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("summary") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match open_pool("summary", &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };
        let repository = SqlAuditRecordRepository::new(pool.clone());
        let result = repository.change_summary(ServicePriceId(price_id)).await;
        pool.close().await;

        match result {
            Ok(counts) => {
                let total: u64 = counts.values().sum();
                let by_type: BTreeMap<&str, u64> = counts
                    .into_iter()
                    .map(|(change_type, count)| (change_type.as_str(), count))
                    .collect();
                CommandResult::success_with_data(
                    "summary",
                    format!("{total} change(s) recorded for price {price_id}"),
                    by_type,
                )
            }
            Err(error) => application_failure("summary", ApplicationError::from(error)),
        }
    })
}
