use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ledger entry. Reads always carry the related service name when the
/// event hangs off a treatment; `meta` is parsed leniently (malformed
/// stored payloads decode to `None` rather than failing the read).
#[derive(Debug, Clone, Serialize)]
pub struct PatientEvent {
    pub id: i64,
    pub patient_id: i64,
    pub patient_service_id: Option<i64>,
    pub patient_service_group_id: Option<i64>,
    pub event_type: String,
    pub message: String,
    pub meta: Option<Value>,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub service_name: Option<String>,
}

/// Append input. At least one of `patient_service_id` /
/// `patient_service_group_id` is required; the group id is auto-resolved
/// from the treatment when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub patient_service_id: Option<i64>,
    pub patient_service_group_id: Option<i64>,
    pub event_type: String,
    pub message: String,
    pub meta: Option<Value>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub patient_service_id: Option<i64>,
    pub patient_service_group_id: Option<i64>,
    pub event_type: Option<String>,
    /// created_at lower bound (inclusive)
    pub from: Option<String>,
    /// created_at upper bound (inclusive)
    pub to: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// One page of events, newest first, plus the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct EventPage {
    pub items: Vec<PatientEvent>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}
