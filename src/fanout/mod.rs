//! Delivery fan-out
//!
//! Pushes one acquired collection date to every registered backend.
//! Calendars run first so notifier consumers observing the date can rely
//! on the event being written; backends inside each group run
//! concurrently and fail independently.

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{info, warn};

use crate::integrations::{DeliveryStatus, IntegrationRegistry};
use crate::models::CollectionAttributes;

/// Event subject used when the caller does not override it
pub const DEFAULT_TITLE: &str = "Bin collection";

/// Event location used when the caller does not override it
pub const DEFAULT_LOCATION: &str = "Belfast";

/// Calendar reminder lead time in minutes (6 hours, the evening before)
pub const DEFAULT_REMINDER_MINUTES: u32 = 360;

// ============================================================================
// Fanout Report
// ============================================================================

/// Per-backend outcomes of one fan-out pass
#[derive(Debug, Default)]
pub struct FanoutReport {
    deliveries: Vec<DeliveryStatus>,
}

impl FanoutReport {
    pub fn deliveries(&self) -> &[DeliveryStatus] {
        &self.deliveries
    }

    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.success).count()
    }

    pub fn failed(&self) -> usize {
        self.deliveries.iter().filter(|d| !d.success).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.deliveries.iter().all(|d| d.success)
    }
}

// ============================================================================
// Fanout Coordinator
// ============================================================================

/// Drives one delivery pass over a backend registry
pub struct FanoutCoordinator<'a> {
    registry: &'a IntegrationRegistry,
    reminder_minutes: u32,
}

impl<'a> FanoutCoordinator<'a> {
    pub fn new(registry: &'a IntegrationRegistry) -> Self {
        Self {
            registry,
            reminder_minutes: DEFAULT_REMINDER_MINUTES,
        }
    }

    pub fn with_reminder_minutes(mut self, reminder_minutes: u32) -> Self {
        self.reminder_minutes = reminder_minutes;
        self
    }

    /// Deliver the date to every backend and report per-backend outcomes
    ///
    /// Always returns a report; backend failures are recorded in it, never
    /// raised. The status API is updated last, whatever the outcomes.
    pub async fn publish(&self, date: NaiveDate, title: &str, location: &str) -> FanoutReport {
        let attributes = CollectionAttributes::new(title, date);
        let end = date + chrono::Duration::days(1);
        let mut report = FanoutReport::default();

        let calendar_runs = self.registry.calendars().iter().map(|calendar| async move {
            let outcome = calendar
                .create_event(title, date, end, location, self.reminder_minutes)
                .await;
            (calendar.name().to_string(), outcome)
        });
        for (backend, outcome) in join_all(calendar_runs).await {
            report.deliveries.push(match outcome {
                Ok(true) => DeliveryStatus::success_with_detail(backend, "event created"),
                Ok(false) => DeliveryStatus::success_with_detail(backend, "event already present"),
                Err(e) => {
                    warn!(%backend, error = %e, "calendar delivery failed");
                    DeliveryStatus::failure(backend, e.to_string())
                }
            });
        }

        let attrs = &attributes;
        let notifier_runs = self.registry.notifiers().iter().map(|notifier| async move {
            let outcome = notifier.notify(attrs).await;
            (notifier.name().to_string(), outcome)
        });
        for (backend, outcome) in join_all(notifier_runs).await {
            report.deliveries.push(match outcome {
                Ok(true) => DeliveryStatus::success(backend),
                Ok(false) => DeliveryStatus::failure(backend, "delivery not confirmed"),
                Err(e) => {
                    warn!(%backend, error = %e, "notifier delivery failed");
                    DeliveryStatus::failure(backend, e.to_string())
                }
            });
        }

        if let Some(handle) = self.registry.status_handle() {
            handle.update(&attributes).await;
        }

        info!(
            date = %date,
            delivered = report.delivered(),
            failed = report.failed(),
            "fan-out complete"
        );
        report
    }
}
