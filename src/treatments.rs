//! Treatment store — patient services and their packaging rules.
//!
//! Treatments are created singly or as a batch ("package"); every batch,
//! even of size one, shares a group id equal to the first inserted row's
//! own id. All batch validation runs before any row is written, and the
//! inserts run inside one transaction so a failure leaves nothing behind.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

use crate::db::repository::{self, TreatmentChanges, TreatmentRow};
use crate::error::DomainError;
use crate::events::{self, EVENT_COST_CHANGED, EVENT_TREATMENT_CREATED};
use crate::models::{
    CreateBatchResult, NewEvent, NewTreatment, TreatmentPatch, TreatmentStatus, TreatmentView,
    VALID_STATUSES,
};

fn money(amount: f64) -> String {
    format!("${amount:.2}")
}

fn require_positive(id: i64, field: &str) -> Result<(), DomainError> {
    if id <= 0 {
        return Err(DomainError::validation(format!(
            "{field} must be a positive integer"
        )));
    }
    Ok(())
}

fn parse_service_date(raw: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::validation("service_date must be a YYYY-MM-DD date"))
}

fn normalize_status(raw: Option<&str>) -> Result<TreatmentStatus, DomainError> {
    match raw {
        None => Ok(TreatmentStatus::default()),
        Some(value) => TreatmentStatus::normalize(value).ok_or_else(|| {
            DomainError::invalid_choice(format!("invalid status: {value}"), &VALID_STATUSES)
        }),
    }
}

/// Absent cost defaults to 0; negative or non-finite values are rejected.
fn validate_cost(cost: Option<f64>) -> Result<f64, DomainError> {
    let value = cost.unwrap_or(0.0);
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::validation(
            "total_cost must be a non-negative number",
        ));
    }
    Ok(value)
}

/// Treatments for a patient, newest service date first, with service and
/// category joined for display. Zero rows is a valid result.
pub fn list(conn: &Connection, patient_id: i64) -> Result<Vec<TreatmentView>, DomainError> {
    require_positive(patient_id, "patient_id")?;
    Ok(repository::list_treatments(conn, patient_id)?)
}

/// Create 1..N treatments as one package.
///
/// Insert sequence: the first item goes in without a group, its own id is
/// then stamped as the group id, and the remaining items are inserted with
/// that group id pre-set. The whole sequence is transactional.
pub fn create_batch(
    conn: &mut Connection,
    patient_id: i64,
    items: &[NewTreatment],
    created_by: Option<i64>,
) -> Result<CreateBatchResult, DomainError> {
    require_positive(patient_id, "patient_id")?;
    if items.is_empty() {
        return Err(DomainError::validation("at least one treatment is required"));
    }

    // every item is validated before anything is written
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let service_id = item
            .service_id
            .ok_or_else(|| DomainError::validation("service_id is required"))?;
        if !repository::service_exists(conn, service_id)? {
            return Err(DomainError::validation(format!(
                "service_id {service_id} does not exist"
            )));
        }

        let service_date = item
            .service_date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| DomainError::validation("service_date is required"))?;
        parse_service_date(service_date)?;

        rows.push(TreatmentRow {
            service_id,
            service_date,
            notes: item.notes.as_deref().filter(|n| !n.is_empty()),
            status: normalize_status(item.status.as_deref())?,
            total_cost: validate_cost(item.total_cost)?,
            group_id: None,
            created_by,
        });
    }

    let tx = conn.transaction()?;
    let first_id = repository::insert_treatment(&tx, patient_id, &rows[0])?;
    let group_id = first_id;
    repository::assign_group_id(&tx, patient_id, first_id, group_id)?;
    for row in &mut rows[1..] {
        row.group_id = Some(group_id);
        repository::insert_treatment(&tx, patient_id, row)?;
    }
    tx.commit()?;

    let members = repository::list_group_members(conn, patient_id, group_id)?;
    let treatment_ids: Vec<i64> = members.iter().map(|m| m.treatment_id).collect();

    events::append_contained(
        conn,
        patient_id,
        &NewEvent {
            patient_service_id: Some(first_id),
            patient_service_group_id: Some(group_id),
            event_type: EVENT_TREATMENT_CREATED.into(),
            message: format!("Registered {} treatment(s)", members.len()),
            meta: Some(json!({
                "group_id": group_id,
                "count": members.len(),
                "treatment_ids": treatment_ids,
            })),
            created_by,
        },
    );

    Ok(CreateBatchResult {
        group_id,
        items: members,
    })
}

/// Partial update. Each present field is validated on its own; an empty
/// patch is a validation error. A cost change is audited with the old and
/// new value, but only when they actually differ.
pub fn patch(
    conn: &Connection,
    patient_id: i64,
    treatment_id: i64,
    patch: &TreatmentPatch,
    created_by: Option<i64>,
) -> Result<(), DomainError> {
    require_positive(patient_id, "patient_id")?;
    require_positive(treatment_id, "treatment_id")?;
    if patch.is_empty() {
        return Err(DomainError::validation("no fields to update"));
    }

    let mut changes = TreatmentChanges::default();
    let mut cost_change: Option<(f64, f64, Option<i64>)> = None;

    if let Some(raw_cost) = patch.total_cost {
        let new_cost = validate_cost(Some(raw_cost))?;
        // the old value must be read before the write so the audit entry
        // can report the transition
        let prev = repository::get_treatment(conn, patient_id, treatment_id)?
            .ok_or_else(|| DomainError::not_found("treatment", treatment_id))?;
        if prev.total_cost != new_cost {
            cost_change = Some((prev.total_cost, new_cost, prev.group_id));
        }
        changes.total_cost = Some(new_cost);
    }
    if let Some(ref notes) = patch.notes {
        changes.notes = Some(if notes.is_empty() {
            None
        } else {
            Some(notes.clone())
        });
    }
    if let Some(ref service_date) = patch.service_date {
        if service_date.trim().is_empty() {
            return Err(DomainError::validation("service_date must not be empty"));
        }
        parse_service_date(service_date)?;
        changes.service_date = Some(service_date.trim().to_string());
    }
    if let Some(service_id) = patch.service_id {
        if !repository::service_exists(conn, service_id)? {
            return Err(DomainError::validation(format!(
                "service_id {service_id} does not exist"
            )));
        }
        changes.service_id = Some(service_id);
    }
    if let Some(ref status) = patch.status {
        changes.status = Some(normalize_status(Some(status))?);
    }

    let updated = repository::update_treatment(conn, patient_id, treatment_id, &changes)?;
    if updated == 0 {
        return Err(DomainError::not_found("treatment", treatment_id));
    }

    if let Some((old_cost, new_cost, group_id)) = cost_change {
        emit_cost_changed(conn, patient_id, treatment_id, group_id, old_cost, new_cost, created_by);
    }
    Ok(())
}

/// Narrow variant of [`patch`] for the status column.
pub fn set_status(
    conn: &Connection,
    patient_id: i64,
    treatment_id: i64,
    status: &str,
) -> Result<TreatmentStatus, DomainError> {
    require_positive(patient_id, "patient_id")?;
    require_positive(treatment_id, "treatment_id")?;

    let status = normalize_status(Some(status))?;
    let updated = repository::update_treatment(
        conn,
        patient_id,
        treatment_id,
        &TreatmentChanges {
            status: Some(status),
            ..Default::default()
        },
    )?;
    if updated == 0 {
        return Err(DomainError::not_found("treatment", treatment_id));
    }
    Ok(status)
}

/// Narrow variant of [`patch`] for the cost column. Reads the prior row so
/// the audit entry carries the old value and the group attribution.
pub fn set_cost(
    conn: &Connection,
    patient_id: i64,
    treatment_id: i64,
    cost: Option<f64>,
    created_by: Option<i64>,
) -> Result<f64, DomainError> {
    require_positive(patient_id, "patient_id")?;
    require_positive(treatment_id, "treatment_id")?;

    let new_cost = validate_cost(cost)?;
    let prev = repository::get_treatment(conn, patient_id, treatment_id)?
        .ok_or_else(|| DomainError::not_found("treatment", treatment_id))?;

    let updated = repository::update_treatment(
        conn,
        patient_id,
        treatment_id,
        &TreatmentChanges {
            total_cost: Some(new_cost),
            ..Default::default()
        },
    )?;
    if updated == 0 {
        return Err(DomainError::not_found("treatment", treatment_id));
    }

    if prev.total_cost != new_cost {
        emit_cost_changed(
            conn,
            patient_id,
            treatment_id,
            prev.group_id,
            prev.total_cost,
            new_cost,
            created_by,
        );
    }
    Ok(new_cost)
}

/// Delete a treatment and its dependent events, events first so no
/// orphaned audit rows survive. Both deletes share one transaction; a
/// missing or unowned treatment rolls everything back.
pub fn delete(
    conn: &mut Connection,
    patient_id: i64,
    treatment_id: i64,
) -> Result<(), DomainError> {
    require_positive(patient_id, "patient_id")?;
    require_positive(treatment_id, "treatment_id")?;

    let tx = conn.transaction()?;
    repository::delete_events_for_treatment(&tx, patient_id, treatment_id)?;
    let deleted = repository::delete_treatment(&tx, patient_id, treatment_id)?;
    if deleted == 0 {
        // dropping the transaction restores the events
        return Err(DomainError::not_found("treatment", treatment_id));
    }
    tx.commit()?;
    Ok(())
}

fn emit_cost_changed(
    conn: &Connection,
    patient_id: i64,
    treatment_id: i64,
    group_id: Option<i64>,
    old_cost: f64,
    new_cost: f64,
    created_by: Option<i64>,
) {
    events::append_contained(
        conn,
        patient_id,
        &NewEvent {
            patient_service_id: Some(treatment_id),
            patient_service_group_id: group_id,
            event_type: EVENT_COST_CHANGED.into(),
            message: format!("Cost updated: {} → {}", money(old_cost), money(new_cost)),
            meta: Some(json!({ "old_cost": old_cost, "new_cost": new_cost })),
            created_by,
        },
    );
}
