//! Group resolution and read-time group aggregates.
//!
//! A group id comes in two shapes: the id of the first treatment of a
//! batch (self-referential) or the id of an explicit
//! patient_service_groups row. Everything here treats both uniformly.

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::repository;
use crate::db::DatabaseError;
use crate::error::DomainError;
use crate::models::{GroupSummary, NewGroup, TreatmentGroup};

/// Resolve the group id to attach to an event or payment.
///
/// An explicit id always wins; otherwise the treatment's stored group_id
/// is used; with neither input there is no group.
pub fn resolve_group_id(
    conn: &Connection,
    explicit_group_id: Option<i64>,
    treatment_id: Option<i64>,
) -> Result<Option<i64>, DatabaseError> {
    if let Some(group_id) = explicit_group_id {
        return Ok(Some(group_id));
    }
    match treatment_id {
        Some(treatment_id) => repository::stored_group_id(conn, treatment_id),
        None => Ok(None),
    }
}

/// Create an explicit treatment package row.
pub fn create_group(
    conn: &Connection,
    patient_id: i64,
    group: &NewGroup,
) -> Result<TreatmentGroup, DomainError> {
    if patient_id <= 0 {
        return Err(DomainError::validation("patient_id must be a positive integer"));
    }
    if group.title.trim().is_empty() {
        return Err(DomainError::validation("title is required"));
    }
    if let Some(ref start_date) = group.start_date {
        if NaiveDate::parse_from_str(start_date, "%Y-%m-%d").is_err() {
            return Err(DomainError::validation("start_date must be YYYY-MM-DD"));
        }
    }

    let id = repository::insert_group(conn, patient_id, group)?;
    repository::get_group(conn, patient_id, id)?
        .ok_or_else(|| DomainError::not_found("group", id))
}

/// Read-time view of a group, valid for both id shapes. Start date is the
/// explicit row's pinned date when present, otherwise the earliest member
/// service date; last activity is the latest payment against any member.
pub fn group_summary(
    conn: &Connection,
    patient_id: i64,
    group_id: i64,
) -> Result<GroupSummary, DomainError> {
    let explicit = repository::get_group(conn, patient_id, group_id)?;
    let (member_count, total_cost) = repository::group_member_stats(conn, group_id)?;

    if explicit.is_none() && member_count == 0 {
        return Err(DomainError::not_found("group", group_id));
    }

    let derived_start = repository::group_start_date(conn, group_id)?;
    let start_date = explicit
        .as_ref()
        .and_then(|g| g.start_date.clone())
        .or(derived_start);
    let last_activity = repository::group_last_activity(conn, patient_id, group_id)?;

    Ok(GroupSummary {
        group_id,
        title: explicit.map(|g| g.title),
        start_date,
        member_count,
        total_cost,
        last_activity,
    })
}
