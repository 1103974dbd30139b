//! Payment ledger.
//!
//! Payments reference a treatment (optionally) and therefore a group;
//! balances are recomputed from the payment rows on every read, never
//! cached. Every mutation leaves a best-effort audit event behind — an
//! event failure never fails the payment write.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::json;

use crate::db::repository::{self, PaymentRow};
use crate::error::DomainError;
use crate::events::{self, EVENT_PAYMENT_CREATED, EVENT_PAYMENT_DELETED, EVENT_PAYMENT_UPDATED};
use crate::models::{NewEvent, NewPayment, Payment, PaymentPatch, PaymentView};

/// Sentinel ids used when the named catalog row is absent.
pub const DEFAULT_PAYMENT_STATUS_ID: i64 = 1;
pub const DEFAULT_PAYMENT_METHOD_ID: i64 = 1;

const DEFAULT_STATUS_NAME: &str = "finalizado";
const DEFAULT_METHOD_NAME: &str = "efectivo";

fn require_positive(id: i64, field: &str) -> Result<(), DomainError> {
    if id <= 0 {
        return Err(DomainError::validation(format!(
            "{field} must be a positive integer"
        )));
    }
    Ok(())
}

fn validate_monto(monto: f64) -> Result<(), DomainError> {
    if !monto.is_finite() || monto <= 0.0 {
        return Err(DomainError::validation("monto must be a positive number"));
    }
    Ok(())
}

fn parse_fecha(raw: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::validation("fecha must be a YYYY-MM-DD date"))
}

/// Payments for a patient with treatment, balance and group context.
/// Grouped payments sort first, most recently active group on top, newest
/// payment first within each group.
pub fn list(conn: &Connection, patient_id: i64) -> Result<Vec<PaymentView>, DomainError> {
    require_positive(patient_id, "patient_id")?;
    Ok(repository::list_payments(conn, patient_id)?)
}

/// Record a payment.
///
/// Missing status/method ids resolve by catalog name ("finalizado" /
/// "efectivo"), falling back to the sentinel ids when the catalog row is
/// absent. The invoice number is generated here, once, and never
/// recomputed.
pub fn create(
    conn: &Connection,
    patient_id: i64,
    input: &NewPayment,
    created_by: Option<i64>,
) -> Result<PaymentView, DomainError> {
    require_positive(patient_id, "patient_id")?;

    let fecha = input
        .fecha
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| DomainError::validation("fecha is required"))?;
    parse_fecha(fecha)?;

    let monto = input
        .monto
        .ok_or_else(|| DomainError::validation("monto is required"))?;
    validate_monto(monto)?;

    let payment_status_id = match input.payment_status_id {
        Some(id) => id,
        None => repository::lookup_id_by_name(conn, "payment_statuses", DEFAULT_STATUS_NAME)?
            .unwrap_or(DEFAULT_PAYMENT_STATUS_ID),
    };
    let payment_method_id = match input.payment_method_id {
        Some(id) => id,
        None => repository::lookup_id_by_name(conn, "payment_methods", DEFAULT_METHOD_NAME)?
            .unwrap_or(DEFAULT_PAYMENT_METHOD_ID),
    };

    let numero_factura = format!("F-{}", Utc::now().timestamp_millis());

    let payment_id = repository::insert_payment(
        conn,
        patient_id,
        &PaymentRow {
            patient_service_id: input.patient_service_id,
            fecha,
            monto,
            payment_method_id,
            payment_status_id,
            numero_factura: &numero_factura,
            notas: input.notas.as_deref(),
        },
    )?;

    events::append_contained(
        conn,
        patient_id,
        &NewEvent {
            patient_service_id: input.patient_service_id,
            patient_service_group_id: None,
            event_type: EVENT_PAYMENT_CREATED.into(),
            message: format!("Payment of ${monto:.2} received (invoice {numero_factura})"),
            meta: Some(json!({
                "payment_id": payment_id,
                "monto": monto,
                "fecha": fecha,
                "payment_method_id": payment_method_id,
                "payment_status_id": payment_status_id,
                "numero_factura": numero_factura,
                "notas": input.notas,
            })),
            created_by,
        },
    );

    repository::get_payment_view(conn, payment_id)?
        .ok_or_else(|| DomainError::not_found("payment", payment_id))
}

/// Update a payment. Absent fields keep their stored values; `estado` and
/// `metodo_pago` names resolve through the catalogs and fail naming the
/// unknown value. The audit event carries a before/after snapshot.
pub fn update(
    conn: &Connection,
    patient_id: i64,
    payment_id: i64,
    patch: &PaymentPatch,
    created_by: Option<i64>,
) -> Result<PaymentView, DomainError> {
    require_positive(patient_id, "patient_id")?;
    require_positive(payment_id, "payment_id")?;

    // read first: 404 before any validation side effects, and the event
    // needs the prior state
    let before = repository::get_payment(conn, patient_id, payment_id)?
        .ok_or_else(|| DomainError::not_found("payment", payment_id))?;

    let mut payment_status_id = patch.payment_status_id;
    if payment_status_id.is_none() {
        if let Some(ref estado) = patch.estado {
            let id = repository::lookup_id_by_name(conn, "payment_statuses", estado)?
                .ok_or_else(|| DomainError::validation(format!("unknown estado: {estado}")))?;
            payment_status_id = Some(id);
        }
    }

    let mut payment_method_id = patch.payment_method_id;
    if payment_method_id.is_none() {
        if let Some(ref metodo) = patch.metodo_pago {
            let id = repository::lookup_id_by_name(conn, "payment_methods", metodo)?
                .ok_or_else(|| DomainError::validation(format!("unknown metodo_pago: {metodo}")))?;
            payment_method_id = Some(id);
        }
    }

    if let Some(monto) = patch.monto {
        validate_monto(monto)?;
    }
    if let Some(ref fecha) = patch.fecha {
        parse_fecha(fecha)?;
    }

    let merged = Payment {
        id: before.id,
        patient_id: before.patient_id,
        patient_service_id: patch.patient_service_id.or(before.patient_service_id),
        fecha: patch.fecha.clone().unwrap_or_else(|| before.fecha.clone()),
        monto: patch.monto.unwrap_or(before.monto),
        payment_method_id: payment_method_id.unwrap_or(before.payment_method_id),
        payment_status_id: payment_status_id.unwrap_or(before.payment_status_id),
        numero_factura: before.numero_factura.clone(),
        notas: patch.notas.clone().or_else(|| before.notas.clone()),
        created_at: before.created_at.clone(),
        updated_at: before.updated_at.clone(),
    };

    let updated = repository::update_payment(conn, patient_id, payment_id, &merged)?;
    if updated == 0 {
        return Err(DomainError::not_found("payment", payment_id));
    }

    events::append_contained(
        conn,
        patient_id,
        &NewEvent {
            patient_service_id: merged.patient_service_id,
            patient_service_group_id: None,
            event_type: EVENT_PAYMENT_UPDATED.into(),
            message: format!("Payment {payment_id} updated"),
            meta: Some(json!({ "payment_id": payment_id, "before": before, "after": merged })),
            created_by,
        },
    );

    repository::get_payment_view(conn, payment_id)?
        .ok_or_else(|| DomainError::not_found("payment", payment_id))
}

/// Delete a payment. The prior row is read first so the audit event keeps
/// its snapshot.
pub fn delete(
    conn: &Connection,
    patient_id: i64,
    payment_id: i64,
    created_by: Option<i64>,
) -> Result<(), DomainError> {
    require_positive(patient_id, "patient_id")?;
    require_positive(payment_id, "payment_id")?;

    let before = repository::get_payment(conn, patient_id, payment_id)?
        .ok_or_else(|| DomainError::not_found("payment", payment_id))?;

    let deleted = repository::delete_payment(conn, patient_id, payment_id)?;
    if deleted == 0 {
        return Err(DomainError::not_found("payment", payment_id));
    }

    events::append_contained(
        conn,
        patient_id,
        &NewEvent {
            patient_service_id: before.patient_service_id,
            patient_service_group_id: None,
            event_type: EVENT_PAYMENT_DELETED.into(),
            message: format!("Payment {payment_id} deleted"),
            meta: Some(json!({ "payment_id": payment_id, "before": before })),
            created_by,
        },
    );

    Ok(())
}
