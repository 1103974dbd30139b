use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::{Payment, PaymentView};

#[derive(Debug)]
pub struct PaymentRow<'a> {
    pub patient_service_id: Option<i64>,
    pub fecha: &'a str,
    pub monto: f64,
    pub payment_method_id: i64,
    pub payment_status_id: i64,
    pub numero_factura: &'a str,
    pub notas: Option<&'a str>,
}

pub fn insert_payment(
    conn: &Connection,
    patient_id: i64,
    row: &PaymentRow<'_>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patient_payments
           (patient_id, patient_service_id, fecha, monto, payment_method_id,
            payment_status_id, numero_factura, notas)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            patient_id,
            row.patient_service_id,
            row.fecha,
            row.monto,
            row.payment_method_id,
            row.payment_status_id,
            row.numero_factura,
            row.notas,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_payment(
    conn: &Connection,
    patient_id: i64,
    payment_id: i64,
) -> Result<Option<Payment>, DatabaseError> {
    conn.query_row(
        "SELECT id, patient_id, patient_service_id, fecha, monto,
                payment_method_id, payment_status_id, numero_factura, notas,
                created_at, updated_at
         FROM patient_payments
         WHERE id = ?1 AND patient_id = ?2",
        params![payment_id, patient_id],
        |row| {
            Ok(Payment {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                patient_service_id: row.get(2)?,
                fecha: row.get(3)?,
                monto: row.get(4)?,
                payment_method_id: row.get(5)?,
                payment_status_id: row.get(6)?,
                numero_factura: row.get(7)?,
                notas: row.get(8)?,
                created_at: row.get(9)?,
                updated_at: row.get(10)?,
            })
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Full-row update with already-merged values (partial-update semantics are
/// resolved by the caller against the existing row).
pub fn update_payment(
    conn: &Connection,
    patient_id: i64,
    payment_id: i64,
    merged: &Payment,
) -> Result<usize, DatabaseError> {
    let updated = conn.execute(
        "UPDATE patient_payments
         SET fecha = ?1, patient_service_id = ?2, monto = ?3,
             payment_method_id = ?4, payment_status_id = ?5, notas = ?6,
             updated_at = datetime('now')
         WHERE id = ?7 AND patient_id = ?8",
        params![
            merged.fecha,
            merged.patient_service_id,
            merged.monto,
            merged.payment_method_id,
            merged.payment_status_id,
            merged.notas,
            payment_id,
            patient_id,
        ],
    )?;
    Ok(updated)
}

pub fn delete_payment(
    conn: &Connection,
    patient_id: i64,
    payment_id: i64,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM patient_payments WHERE id = ?1 AND patient_id = ?2",
        params![payment_id, patient_id],
    )?;
    Ok(deleted)
}

const PAYMENT_VIEW_SELECT: &str = "
    SELECT
        pp.id,
        pp.fecha,
        pp.patient_service_id,
        sv.group_id,
        gstart.group_start_date,
        s.name                                          AS tratamiento,
        sv.total_cost,
        pp.monto,
        IFNULL(pagg.total_pagado, 0)                    AS total_pagado,
        (sv.total_cost - IFNULL(pagg.total_pagado, 0))  AS saldo_pendiente,
        pm.id,
        pm.name                                         AS metodo_pago,
        st.id,
        st.name                                         AS estado,
        pp.numero_factura,
        pp.notas,
        pp.created_at,
        pp.updated_at
    FROM patient_payments pp
    LEFT JOIN patient_services sv ON sv.id = pp.patient_service_id
    LEFT JOIN services s ON s.id = sv.service_id

    -- amount already paid per treatment, recomputed on every read
    LEFT JOIN (
        SELECT patient_service_id, SUM(monto) AS total_pagado
        FROM patient_payments
        WHERE patient_service_id IS NOT NULL
        GROUP BY patient_service_id
    ) pagg ON pagg.patient_service_id = pp.patient_service_id

    LEFT JOIN payment_methods pm ON pm.id = pp.payment_method_id
    LEFT JOIN payment_statuses st ON st.id = pp.payment_status_id

    -- group start: earliest member service_date
    LEFT JOIN (
        SELECT sv2.group_id, MIN(sv2.service_date) AS group_start_date
        FROM patient_services sv2
        WHERE sv2.group_id IS NOT NULL
        GROUP BY sv2.group_id
    ) gstart ON gstart.group_id = sv.group_id

    -- group last activity: latest payment against any member
    LEFT JOIN (
        SELECT sv3.group_id, MAX(pp3.created_at) AS group_last_activity
        FROM patient_payments pp3
        JOIN patient_services sv3 ON sv3.id = pp3.patient_service_id
        WHERE sv3.group_id IS NOT NULL
        GROUP BY sv3.group_id
    ) glast ON glast.group_id = sv.group_id
";

fn payment_view_from_row(row: &Row<'_>) -> Result<PaymentView, rusqlite::Error> {
    Ok(PaymentView {
        id: row.get(0)?,
        fecha: row.get(1)?,
        patient_service_id: row.get(2)?,
        group_id: row.get(3)?,
        group_start_date: row.get(4)?,
        tratamiento: row.get(5)?,
        total_cost: row.get(6)?,
        monto: row.get(7)?,
        total_pagado: row.get(8)?,
        saldo_pendiente: row.get(9)?,
        payment_method_id: row.get(10)?,
        metodo_pago: row.get(11)?,
        payment_status_id: row.get(12)?,
        estado: row.get(13)?,
        numero_factura: row.get(14)?,
        notas: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

/// Payments for a patient with display joins and query-time balances.
///
/// Ordering is a user-facing contract: grouped payments first, most
/// recently active group on top (group id breaks ties), newest payment
/// first within a group.
pub fn list_payments(conn: &Connection, patient_id: i64) -> Result<Vec<PaymentView>, DatabaseError> {
    let sql = format!(
        "{PAYMENT_VIEW_SELECT}
         WHERE pp.patient_id = ?1
         ORDER BY
             (sv.group_id IS NULL) ASC,
             glast.group_last_activity DESC,
             sv.group_id DESC,
             pp.created_at DESC,
             pp.id DESC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id], payment_view_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Single payment with the same display joins (create/read-back shape).
pub fn get_payment_view(
    conn: &Connection,
    payment_id: i64,
) -> Result<Option<PaymentView>, DatabaseError> {
    let sql = format!("{PAYMENT_VIEW_SELECT} WHERE pp.id = ?1");
    conn.query_row(&sql, params![payment_id], payment_view_from_row)
        .optional()
        .map_err(DatabaseError::from)
}
