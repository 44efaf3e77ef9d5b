//! Background expiry of client leases

use super::{Lease, SharedRouteTable};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Expire leases as they come due until `token` is cancelled
///
/// The reaper sleeps until the earliest lease expiry, or at most `ceiling`, so
/// leases added while it sleeps are picked up within one ceiling interval.
/// Each expired lease is handed to `on_expire` while the table lock is held.
pub async fn run<T, F>(
    table: SharedRouteTable<T>,
    ceiling: Duration,
    token: CancellationToken,
    mut on_expire: F,
) where
    F: FnMut(Lease<T>),
{
    log::info!("Lease reaper started");

    loop {
        let deadline = {
            let mut table = table.lock().await;
            let now = Instant::now();
            for lease in table.expire(now) {
                log::info!("Lease {} expired", lease.prefix);
                on_expire(lease);
            }
            match (table.next_expiry(), now.checked_add(ceiling)) {
                (Some(expires), Some(cap)) => Some(expires.min(cap)),
                (expires, cap) => expires.or(cap),
            }
        };

        // No deadline only when the table is empty and the ceiling overflows
        let Some(deadline) = deadline else {
            token.cancelled().await;
            break;
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep_until(deadline) => {}
        }
    }

    log::info!("Lease reaper stopped");
}
