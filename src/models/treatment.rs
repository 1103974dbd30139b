use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::TreatmentStatus;

/// One billable unit of care, as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Treatment {
    pub id: i64,
    pub patient_id: i64,
    /// Either the id of the batch's first treatment (self-referential) or
    /// the id of an explicit patient_service_groups row. Set exactly once.
    pub group_id: Option<i64>,
    pub service_id: i64,
    pub service_date: NaiveDate,
    pub status: TreatmentStatus,
    pub total_cost: f64,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Treatment list row joined with its service and category for display.
#[derive(Debug, Clone, Serialize)]
pub struct TreatmentView {
    pub treatment_id: i64,
    pub patient_id: i64,
    pub group_id: Option<i64>,
    pub service_id: i64,
    pub service_date: String,
    pub notes: Option<String>,
    pub status: String,
    pub total_cost: f64,
    pub service_name: String,
    pub service_category_id: i64,
    pub service_category: String,
    pub service_category_sort_order: i64,
}

/// One batch entry for treatment creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTreatment {
    pub service_id: Option<i64>,
    pub service_date: Option<String>,
    pub status: Option<String>,
    pub total_cost: Option<f64>,
    pub notes: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreatmentPatch {
    pub total_cost: Option<f64>,
    pub notes: Option<String>,
    pub service_date: Option<String>,
    pub service_id: Option<i64>,
    pub status: Option<String>,
}

impl TreatmentPatch {
    pub fn is_empty(&self) -> bool {
        self.total_cost.is_none()
            && self.notes.is_none()
            && self.service_date.is_none()
            && self.service_id.is_none()
            && self.status.is_none()
    }
}

/// Read-back row for a freshly created batch member.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedTreatment {
    pub treatment_id: i64,
    pub patient_id: i64,
    pub service_id: i64,
    pub service_date: String,
    pub total_cost: f64,
    pub status: String,
    pub group_id: i64,
    pub service_name: Option<String>,
}

/// Result of a batch creation: the shared group id plus the members in
/// insertion order.
#[derive(Debug, Clone, Serialize)]
pub struct CreateBatchResult {
    pub group_id: i64,
    pub items: Vec<CreatedTreatment>,
}
