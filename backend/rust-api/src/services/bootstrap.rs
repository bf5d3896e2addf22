//! Idempotent startup reconciliation, invoked exactly once from `main`
//! before the server starts accepting traffic. No handle is retained
//! afterwards; re-running it is always safe.

use crate::services::AppState;
use crate::store::MongoAttemptStore;

pub async fn reconcile(state: &AppState) -> anyhow::Result<()> {
    if let Some(db) = &state.mongo {
        // Unique indexes back the one-attempt-per-booking and
        // one-writing-submission-per-section invariants.
        MongoAttemptStore::new(db.clone()).ensure_indexes().await?;
        tracing::info!("Store indexes reconciled");
    }

    let warnings = state.catalog.validate().await?;
    for warning in &warnings {
        tracing::warn!("Band map: {}", warning);
    }
    tracing::info!(
        "Startup reconciliation complete ({} band map warnings)",
        warnings.len()
    );

    Ok(())
}
