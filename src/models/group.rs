use serde::{Deserialize, Serialize};

/// Explicit treatment package row. Treatments created as a batch may
/// instead share a self-referential group id (the first member's own id);
/// both shapes resolve through the same group queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentGroup {
    pub id: i64,
    pub patient_id: i64,
    pub title: String,
    pub start_date: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGroup {
    pub title: String,
    pub start_date: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Read-time view of a group. Nothing here is stored: start date is the
/// earliest member service_date (unless an explicit row pins one), last
/// activity the latest payment against any member.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub group_id: i64,
    pub title: Option<String>,
    pub start_date: Option<String>,
    pub member_count: i64,
    pub total_cost: f64,
    pub last_activity: Option<String>,
}
