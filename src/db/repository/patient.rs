use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{NewPatient, Patient};

pub fn insert_patient(conn: &Connection, patient: &NewPatient) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patients (first_name, last_name, email, phone)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            patient.first_name,
            patient.last_name,
            patient.email,
            patient.phone,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_patient(conn: &Connection, patient_id: i64) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        "SELECT id, first_name, last_name, email, phone, created_at, updated_at
         FROM patients WHERE id = ?1",
        params![patient_id],
        |row| {
            Ok(Patient {
                id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                email: row.get(3)?,
                phone: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}
