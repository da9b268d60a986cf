use crate::api::CatalogService;
use crate::cancel::{sleep_cancellable, CancelToken};
use crate::error::{Result, SyncError};
use crate::models::{Ticket, TicketStatus};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// Polls a bulk-mutation ticket until it completes. Pending keeps looping
/// at a fixed interval; any other terminal status fails immediately; a
/// ticket still pending after `max_attempts` polls is a timeout.
pub struct TicketPoller {
    catalog: Arc<dyn CatalogService>,
    interval: Duration,
    max_attempts: u32,
    cancel: CancelToken,
}

impl TicketPoller {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        interval: Duration,
        max_attempts: u32,
        cancel: CancelToken,
    ) -> Self {
        Self {
            catalog,
            interval,
            max_attempts: max_attempts.max(1),
            cancel,
        }
    }

    /// Resolve once the ticket reports complete. The first probe goes out
    /// immediately; the interval separates subsequent probes.
    pub async fn await_completion(&self, ticket: &Ticket) -> Result<()> {
        let mut attempts: u32 = 0;
        loop {
            self.cancel.check()?;
            attempts += 1;
            match self.catalog.ticket_status(ticket).await {
                Ok(TicketStatus::Complete) => {
                    debug!("ticket {} complete after {} poll(s)", ticket, attempts);
                    return Ok(());
                }
                Ok(TicketStatus::Pending) => {}
                Ok(TicketStatus::Other(status)) => {
                    return Err(SyncError::TicketFailed {
                        ticket: ticket.0.clone(),
                        status,
                    });
                }
                // a dropped status probe is not a verdict on the job;
                // spend the attempt and keep polling
                Err(e) if e.is_transient() => {
                    warn!("status poll for ticket {} failed: {}", ticket, e);
                }
                Err(e) => return Err(e),
            }
            if attempts >= self.max_attempts {
                return Err(SyncError::TicketTimeout {
                    ticket: ticket.0.clone(),
                    attempts,
                });
            }
            sleep_cancellable(&self.cancel, self.interval).await?;
        }
    }
}
