//! Background loops: draft TTL expiry, the weekly settlement sweep and the nightly serving reset.
use chrono::{Duration, Utc};
use log::*;
use tiffin_engine::{
    helpers::ist,
    MarketplaceDatabase,
    PaymentFlowApi,
    PaymentGateway,
    SettlementApi,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

/// Sweeps for drafts whose payment confirmation never arrived. Do not await the returned JoinHandle, as it runs
/// indefinitely.
pub fn start_draft_expiry_worker<B, G>(api: PaymentFlowApi<B, G>, ttl: Duration) -> JoinHandle<()>
where
    B: MarketplaceDatabase + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        info!("🕰️ Draft expiry worker started (TTL {}h)", ttl.num_hours());
        loop {
            timer.tick().await;
            match api.expire_stale_drafts(ttl).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No stale drafts"),
                Ok(expired) => info!("🕰️ {} drafts expired", expired.len()),
                Err(e) => error!("🕰️ Error running draft expiry job: {e}"),
            }
        }
    })
}

/// Runs the settlement batch on a coarse interval. The batch is idempotent (the unique week triple skips existing
/// settlements), so the exact firing time does not matter — only that it fires at least once after each Thursday
/// boundary.
pub fn start_settlement_worker<B>(api: SettlementApi<B>) -> JoinHandle<()>
where B: MarketplaceDatabase + Send + Sync + 'static {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(6 * 3600));
        info!("🕰️ Weekly settlement worker started");
        loop {
            timer.tick().await;
            match api.run_weekly_batch(Utc::now()).await {
                Ok(summary) => {
                    if summary.created > 0 || summary.failed > 0 {
                        info!(
                            "🕰️ Settlement sweep: {} created, {} skipped, {} failed",
                            summary.created, summary.skipped, summary.failed
                        );
                    }
                },
                Err(e) => error!("🕰️ Error running settlement sweep: {e}"),
            }
        }
    })
}

/// Turns every hotel off-serving at IST midnight; restaurants opt back in when they open.
pub fn start_serving_reset_worker(db: SqliteDatabase) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("🕰️ Nightly serving-reset worker started");
        loop {
            tokio::time::sleep(until_next_ist_midnight()).await;
            match db.reset_all_serving().await {
                Ok(count) => info!("🕰️ {count} restaurants set to not serving at IST midnight"),
                Err(e) => error!("🕰️ Error running nightly serving reset: {e}"),
            }
        }
    })
}

fn until_next_ist_midnight() -> std::time::Duration {
    let now = Utc::now().with_timezone(&ist());
    let tomorrow = now.date_naive().succ_opt().expect("not the end of time");
    let midnight = tomorrow.and_hms_opt(0, 0, 0).expect("midnight exists");
    let next = midnight.and_local_timezone(ist()).single().expect("fixed offsets are unambiguous");
    (next - now).to_std().unwrap_or_else(|_| std::time::Duration::from_secs(60))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn midnight_sleep_is_less_than_a_day() {
        let wait = until_next_ist_midnight();
        assert!(wait <= std::time::Duration::from_secs(24 * 3600));
        assert!(wait > std::time::Duration::ZERO);
    }
}
