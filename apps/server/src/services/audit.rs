//! Access audit logging.
//!
//! Every successful gate pass produces one access-log record. Records are
//! handed to a background writer over a bounded channel; emission is
//! best-effort and must not block or fail the primary request path.

use crate::db::Repository;
use crate::metrics::{AUDIT_RECORDS_DROPPED_TOTAL, AUDIT_RECORDS_WRITTEN_TOTAL};
use crate::models::{new_id, AccessRecord, GatePlatform};
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct AccessEvent {
    pub platform: GatePlatform,
    pub route: String,
    pub method: String,
    pub request_id: Option<String>,
    pub body: JsonValue,
    pub grant: JsonValue,
    /// Raw id of the patient whose data is read.
    pub patient_id: String,
}

#[derive(Clone)]
pub struct AccessAuditService {
    enabled: bool,
    sender: mpsc::Sender<AccessRecord>,
}

impl AccessAuditService {
    pub fn new(repository: Repository, enabled: bool, queue_capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<AccessRecord>(queue_capacity.max(1));

        tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                match repository.insert_access_record(&record).await {
                    Ok(()) => AUDIT_RECORDS_WRITTEN_TOTAL.inc(),
                    Err(e) => {
                        AUDIT_RECORDS_DROPPED_TOTAL.inc();
                        tracing::warn!(
                            patient_id = %record.created_by,
                            route = %record.route,
                            "Failed to persist access record: {}",
                            e
                        );
                    }
                }
            }
        });

        tracing::info!(enabled, "Access audit logging initialized");

        Self { enabled, sender }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn enqueue(&self, event: AccessEvent) {
        if !self.enabled {
            return;
        }

        let record = build_record(event);
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(record)) => {
                // Preserve request latency by deferring the await to a background task.
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    if let Err(e) = sender.send(record).await {
                        AUDIT_RECORDS_DROPPED_TOTAL.inc();
                        tracing::warn!("Failed to enqueue access record: {}", e);
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(_record)) => {
                AUDIT_RECORDS_DROPPED_TOTAL.inc();
                tracing::warn!("Access audit queue closed; dropping record");
            }
        }
    }
}

fn build_record(event: AccessEvent) -> AccessRecord {
    AccessRecord {
        id: new_id(),
        platform: event.platform,
        route: event.route.clone(),
        data: json!({
            "request": {
                "method": event.method,
                "route": event.route,
                "requestId": event.request_id,
                "body": event.body,
            },
            "grant": event.grant,
        }),
        created_by: event.patient_id,
        date: Utc::now(),
    }
}
