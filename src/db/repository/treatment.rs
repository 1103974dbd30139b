use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{CreatedTreatment, Treatment, TreatmentStatus, TreatmentView};

/// Validated column values for one treatment insert.
#[derive(Debug)]
pub struct TreatmentRow<'a> {
    pub service_id: i64,
    pub service_date: &'a str,
    pub notes: Option<&'a str>,
    pub status: TreatmentStatus,
    pub total_cost: f64,
    pub group_id: Option<i64>,
    pub created_by: Option<i64>,
}

pub fn insert_treatment(
    conn: &Connection,
    patient_id: i64,
    row: &TreatmentRow<'_>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patient_services
           (patient_id, service_id, service_date, notes, status, total_cost, group_id, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            patient_id,
            row.service_id,
            row.service_date,
            row.notes,
            row.status.as_str(),
            row.total_cost,
            row.group_id,
            row.created_by,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Stamp the group id onto an existing treatment (the batch-create step
/// that turns the first member's own id into the group key).
pub fn assign_group_id(
    conn: &Connection,
    patient_id: i64,
    treatment_id: i64,
    group_id: i64,
) -> Result<usize, DatabaseError> {
    let updated = conn.execute(
        "UPDATE patient_services
         SET group_id = ?1, updated_at = datetime('now')
         WHERE id = ?2 AND patient_id = ?3",
        params![group_id, treatment_id, patient_id],
    )?;
    Ok(updated)
}

pub fn get_treatment(
    conn: &Connection,
    patient_id: i64,
    treatment_id: i64,
) -> Result<Option<Treatment>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, patient_id, group_id, service_id, service_date, status,
                    total_cost, notes, created_by, created_at, updated_at
             FROM patient_services
             WHERE id = ?1 AND patient_id = ?2",
            params![treatment_id, patient_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<i64>>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                ))
            },
        )
        .optional()?;

    let Some((id, patient_id, group_id, service_id, date, status, cost, notes, by, created, updated)) =
        row
    else {
        return Ok(None);
    };

    Ok(Some(Treatment {
        id,
        patient_id,
        group_id,
        service_id,
        service_date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| DatabaseError::ConstraintViolation(format!("bad service_date: {e}")))?,
        status: TreatmentStatus::from_str(&status)?,
        total_cost: cost,
        notes,
        created_by: by,
        created_at: created,
        updated_at: updated,
    }))
}

/// Treatments for a patient, newest service date first, joined with the
/// service and category for display.
pub fn list_treatments(conn: &Connection, patient_id: i64) -> Result<Vec<TreatmentView>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT
            ps.id, ps.patient_id, ps.group_id, ps.service_id, ps.service_date,
            ps.notes, ps.status, ps.total_cost,
            s.name, c.id, c.name, c.sort_order
         FROM patient_services ps
         JOIN services s ON ps.service_id = s.id
         JOIN service_categories c ON c.id = s.category_id
         WHERE ps.patient_id = ?1
         ORDER BY ps.service_date DESC, ps.id DESC",
    )?;

    let rows = stmt.query_map(params![patient_id], |row| {
        Ok(TreatmentView {
            treatment_id: row.get(0)?,
            patient_id: row.get(1)?,
            group_id: row.get(2)?,
            service_id: row.get(3)?,
            service_date: row.get(4)?,
            notes: row.get(5)?,
            status: row.get(6)?,
            total_cost: row.get(7)?,
            service_name: row.get(8)?,
            service_category_id: row.get(9)?,
            service_category: row.get(10)?,
            service_category_sort_order: row.get(11)?,
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Read back the members of a group in insertion order (batch-create
/// response shape).
pub fn list_group_members(
    conn: &Connection,
    patient_id: i64,
    group_id: i64,
) -> Result<Vec<CreatedTreatment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT ps.id, ps.patient_id, ps.service_id, ps.service_date,
                ps.total_cost, ps.status, ps.group_id, s.name
         FROM patient_services ps
         LEFT JOIN services s ON s.id = ps.service_id
         WHERE ps.patient_id = ?1 AND ps.group_id = ?2
         ORDER BY ps.id ASC",
    )?;

    let rows = stmt.query_map(params![patient_id, group_id], |row| {
        Ok(CreatedTreatment {
            treatment_id: row.get(0)?,
            patient_id: row.get(1)?,
            service_id: row.get(2)?,
            service_date: row.get(3)?,
            total_cost: row.get(4)?,
            status: row.get(5)?,
            group_id: row.get(6)?,
            service_name: row.get(7)?,
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Column changes for a partial update. Validation happens upstream; this
/// builds the SET clause from whichever fields are present.
#[derive(Debug, Default)]
pub struct TreatmentChanges {
    pub total_cost: Option<f64>,
    pub notes: Option<Option<String>>,
    pub service_date: Option<String>,
    pub service_id: Option<i64>,
    pub status: Option<TreatmentStatus>,
}

pub fn update_treatment(
    conn: &Connection,
    patient_id: i64,
    treatment_id: i64,
    changes: &TreatmentChanges,
) -> Result<usize, DatabaseError> {
    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(cost) = changes.total_cost {
        values.push(Box::new(cost));
        sets.push(format!("total_cost = ?{}", values.len()));
    }
    if let Some(ref notes) = changes.notes {
        values.push(Box::new(notes.clone()));
        sets.push(format!("notes = ?{}", values.len()));
    }
    if let Some(ref date) = changes.service_date {
        values.push(Box::new(date.clone()));
        sets.push(format!("service_date = ?{}", values.len()));
    }
    if let Some(service_id) = changes.service_id {
        values.push(Box::new(service_id));
        sets.push(format!("service_id = ?{}", values.len()));
    }
    if let Some(status) = changes.status {
        values.push(Box::new(status.as_str()));
        sets.push(format!("status = ?{}", values.len()));
    }

    if sets.is_empty() {
        return Ok(0);
    }
    sets.push("updated_at = datetime('now')".into());

    values.push(Box::new(treatment_id));
    let id_idx = values.len();
    values.push(Box::new(patient_id));
    let patient_idx = values.len();

    let sql = format!(
        "UPDATE patient_services SET {} WHERE id = ?{} AND patient_id = ?{}",
        sets.join(", "),
        id_idx,
        patient_idx,
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let updated = conn.execute(&sql, params_ref.as_slice())?;
    Ok(updated)
}

pub fn delete_treatment(
    conn: &Connection,
    patient_id: i64,
    treatment_id: i64,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM patient_services WHERE id = ?1 AND patient_id = ?2",
        params![treatment_id, patient_id],
    )?;
    Ok(deleted)
}
