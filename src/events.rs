//! Patient event ledger.
//!
//! Append-only audit trail for everything that happens to a patient's
//! treatments and payments, plus manual notes. Only `note` entries are
//! mutable; every other event type is a system-generated fact and stays
//! append-only forever.

use rusqlite::Connection;
use serde_json::Value;

use crate::db::repository::{self, EventRow};
use crate::error::DomainError;
use crate::groups;
use crate::models::{EventFilter, EventPage, NewEvent, PatientEvent};

pub const EVENT_NOTE: &str = "note";
pub const EVENT_TREATMENT_CREATED: &str = "treatment_created";
pub const EVENT_COST_CHANGED: &str = "cost_changed";
pub const EVENT_PAYMENT_CREATED: &str = "payment_created";
pub const EVENT_PAYMENT_UPDATED: &str = "payment_updated";
pub const EVENT_PAYMENT_DELETED: &str = "payment_deleted";

pub const DEFAULT_PAGE_SIZE: u32 = 200;
pub const MAX_PAGE_SIZE: u32 = 500;

fn require_patient(patient_id: i64) -> Result<(), DomainError> {
    if patient_id <= 0 {
        return Err(DomainError::validation("patient_id must be a positive integer"));
    }
    Ok(())
}

/// Append an event to the ledger and return it with its display joins.
///
/// Every event must link to a treatment or a group. When only the
/// treatment is given, the group id is resolved from its stored group so
/// group-level timelines stay complete.
pub fn append(
    conn: &Connection,
    patient_id: i64,
    event: &NewEvent,
) -> Result<PatientEvent, DomainError> {
    require_patient(patient_id)?;
    if event.event_type.trim().is_empty() {
        return Err(DomainError::validation("event_type is required"));
    }
    if event.message.trim().is_empty() {
        return Err(DomainError::validation("message is required"));
    }
    if event.patient_service_id.is_none() && event.patient_service_group_id.is_none() {
        return Err(DomainError::validation(
            "either patient_service_id or patient_service_group_id is required",
        ));
    }

    let group_id = groups::resolve_group_id(
        conn,
        event.patient_service_group_id,
        event.patient_service_id,
    )?;
    let meta_json = event.meta.as_ref().map(|m| m.to_string());

    let id = repository::insert_event(
        conn,
        patient_id,
        &EventRow {
            patient_service_id: event.patient_service_id,
            patient_service_group_id: group_id,
            event_type: event.event_type.trim(),
            message: event.message.trim(),
            meta_json,
            created_by: event.created_by,
        },
    )?;

    repository::get_event(conn, id)?.ok_or_else(|| DomainError::not_found("event", id))
}

/// Best-effort append for mutation side effects. A failure here is logged
/// and swallowed — the primary write has already succeeded and must not be
/// reported as failed because its audit trail could not be written.
pub fn append_contained(conn: &Connection, patient_id: i64, event: &NewEvent) {
    if let Err(err) = append(conn, patient_id, event) {
        tracing::warn!(
            patient_id,
            event_type = %event.event_type,
            error = %err,
            "patient event append failed; primary mutation unaffected"
        );
    }
}

/// Filtered, paginated event feed, newest first.
pub fn list(
    conn: &Connection,
    patient_id: i64,
    filter: &EventFilter,
) -> Result<EventPage, DomainError> {
    require_patient(patient_id)?;

    let limit = match filter.limit {
        None | Some(0) => DEFAULT_PAGE_SIZE,
        Some(n) => n.min(MAX_PAGE_SIZE),
    };
    let offset = filter.offset.unwrap_or(0);

    let (items, total) = repository::list_events(conn, patient_id, filter, limit, offset)?;
    Ok(EventPage {
        items,
        total,
        limit,
        offset,
    })
}

/// Edit a manual note. Any other event type is immutable.
pub fn update_note(
    conn: &Connection,
    patient_id: i64,
    event_id: i64,
    message: &str,
    meta: Option<&Value>,
) -> Result<(), DomainError> {
    require_patient(patient_id)?;
    if message.trim().is_empty() {
        return Err(DomainError::validation("message is required"));
    }

    let (_, event_type) = repository::get_event_header(conn, patient_id, event_id)?
        .ok_or_else(|| DomainError::not_found("event", event_id))?;
    if event_type != EVENT_NOTE {
        return Err(DomainError::Forbidden(
            "only note events can be edited".into(),
        ));
    }

    let meta_json = meta.map(|m| m.to_string());
    let updated = repository::update_note_row(conn, patient_id, event_id, message.trim(), meta_json)?;
    if updated == 0 {
        return Err(DomainError::not_found("event", event_id));
    }
    Ok(())
}

/// Delete a manual note. Any other event type is immutable.
pub fn delete_note(conn: &Connection, patient_id: i64, event_id: i64) -> Result<(), DomainError> {
    require_patient(patient_id)?;

    let (_, event_type) = repository::get_event_header(conn, patient_id, event_id)?
        .ok_or_else(|| DomainError::not_found("event", event_id))?;
    if event_type != EVENT_NOTE {
        return Err(DomainError::Forbidden(
            "only note events can be deleted".into(),
        ));
    }

    let deleted = repository::delete_event_row(conn, patient_id, event_id)?;
    if deleted == 0 {
        return Err(DomainError::not_found("event", event_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{
        assign_group_id, insert_category, insert_patient, insert_service, insert_treatment,
        TreatmentRow,
    };
    use crate::db::sqlite::open_memory_database;
    use crate::models::{NewPatient, TreatmentStatus};
    use serde_json::json;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn seed_patient(conn: &Connection) -> i64 {
        insert_patient(
            conn,
            &NewPatient {
                first_name: "Ana".into(),
                last_name: "Lopez".into(),
                email: None,
                phone: None,
            },
        )
        .unwrap()
    }

    fn seed_treatment(conn: &Connection, patient_id: i64) -> i64 {
        let cat = insert_category(conn, "General", 1).unwrap();
        let svc = insert_service(conn, cat, "Consulta").unwrap();
        insert_treatment(
            conn,
            patient_id,
            &TreatmentRow {
                service_id: svc,
                service_date: "2024-01-10",
                notes: None,
                status: TreatmentStatus::PorIniciar,
                total_cost: 100.0,
                group_id: None,
                created_by: None,
            },
        )
        .unwrap()
    }

    fn note(treatment_id: i64, message: &str) -> NewEvent {
        NewEvent {
            patient_service_id: Some(treatment_id),
            patient_service_group_id: None,
            event_type: EVENT_NOTE.into(),
            message: message.into(),
            meta: None,
            created_by: None,
        }
    }

    #[test]
    fn append_requires_a_linking_id() {
        let conn = test_db();
        let patient = seed_patient(&conn);
        let result = append(
            &conn,
            patient,
            &NewEvent {
                patient_service_id: None,
                patient_service_group_id: None,
                event_type: EVENT_NOTE.into(),
                message: "sin enlace".into(),
                meta: None,
                created_by: None,
            },
        );
        match result {
            Err(DomainError::Validation { message, .. }) => {
                assert!(message.contains("patient_service_id"));
                assert!(message.contains("patient_service_group_id"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn append_rejects_blank_message() {
        let conn = test_db();
        let patient = seed_patient(&conn);
        let treatment = seed_treatment(&conn, patient);
        let result = append(&conn, patient, &note(treatment, "   "));
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn append_auto_resolves_group_from_treatment() {
        let conn = test_db();
        let patient = seed_patient(&conn);
        let treatment = seed_treatment(&conn, patient);
        assign_group_id(&conn, patient, treatment, treatment).unwrap();

        let event = append(&conn, patient, &note(treatment, "visita")).unwrap();
        assert_eq!(event.patient_service_group_id, Some(treatment));
        assert_eq!(event.service_name.as_deref(), Some("Consulta"));
    }

    #[test]
    fn append_keeps_explicit_group_id() {
        let conn = test_db();
        let patient = seed_patient(&conn);
        let treatment = seed_treatment(&conn, patient);
        assign_group_id(&conn, patient, treatment, treatment).unwrap();

        let mut event = note(treatment, "visita");
        event.patient_service_group_id = Some(999);
        let stored = append(&conn, patient, &event).unwrap();
        assert_eq!(stored.patient_service_group_id, Some(999));
    }

    #[test]
    fn append_round_trips_meta() {
        let conn = test_db();
        let patient = seed_patient(&conn);
        let treatment = seed_treatment(&conn, patient);

        let mut event = note(treatment, "con meta");
        event.meta = Some(json!({"old_cost": 100.0, "new_cost": 150.0}));
        let stored = append(&conn, patient, &event).unwrap();
        assert_eq!(stored.meta.unwrap()["new_cost"], 150.0);
    }

    #[test]
    fn append_contained_swallows_failures() {
        let conn = test_db();
        let patient = seed_patient(&conn);
        // no linking id: append fails validation, containment swallows it
        append_contained(
            &conn,
            patient,
            &NewEvent {
                patient_service_id: None,
                patient_service_group_id: None,
                event_type: EVENT_PAYMENT_CREATED.into(),
                message: "pago".into(),
                meta: None,
                created_by: None,
            },
        );
        let page = list(&conn, patient, &EventFilter::default()).unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn list_clamps_limit_and_defaults() {
        let conn = test_db();
        let patient = seed_patient(&conn);

        let oversized = EventFilter {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(list(&conn, patient, &oversized).unwrap().limit, MAX_PAGE_SIZE);

        let zero = EventFilter {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(list(&conn, patient, &zero).unwrap().limit, DEFAULT_PAGE_SIZE);

        assert_eq!(
            list(&conn, patient, &EventFilter::default()).unwrap().limit,
            DEFAULT_PAGE_SIZE
        );
    }

    #[test]
    fn list_rejects_bad_patient_id() {
        let conn = test_db();
        assert!(matches!(
            list(&conn, 0, &EventFilter::default()),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn update_note_changes_message_and_meta() {
        let conn = test_db();
        let patient = seed_patient(&conn);
        let treatment = seed_treatment(&conn, patient);
        let event = append(&conn, patient, &note(treatment, "borrador")).unwrap();

        update_note(&conn, patient, event.id, "texto final", Some(&json!({"edited": true})))
            .unwrap();

        let page = list(&conn, patient, &EventFilter::default()).unwrap();
        assert_eq!(page.items[0].message, "texto final");
        assert_eq!(page.items[0].meta.as_ref().unwrap()["edited"], true);
    }

    #[test]
    fn non_note_events_are_immutable() {
        let conn = test_db();
        let patient = seed_patient(&conn);
        let treatment = seed_treatment(&conn, patient);

        let mut event = note(treatment, "costo cambiado");
        event.event_type = EVENT_COST_CHANGED.into();
        let stored = append(&conn, patient, &event).unwrap();

        assert!(matches!(
            update_note(&conn, patient, stored.id, "no", None),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            delete_note(&conn, patient, stored.id),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn foreign_patient_note_is_not_found() {
        let conn = test_db();
        let patient = seed_patient(&conn);
        let other = seed_patient(&conn);
        let treatment = seed_treatment(&conn, patient);
        let event = append(&conn, patient, &note(treatment, "privada")).unwrap();

        assert!(matches!(
            update_note(&conn, other, event.id, "intruso", None),
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            delete_note(&conn, other, event.id),
            Err(DomainError::NotFound { .. })
        ));

        // the note is untouched
        let page = list(&conn, patient, &EventFilter::default()).unwrap();
        assert_eq!(page.items[0].message, "privada");
    }

    #[test]
    fn delete_note_removes_entry() {
        let conn = test_db();
        let patient = seed_patient(&conn);
        let treatment = seed_treatment(&conn, patient);
        let event = append(&conn, patient, &note(treatment, "temporal")).unwrap();

        delete_note(&conn, patient, event.id).unwrap();
        assert_eq!(list(&conn, patient, &EventFilter::default()).unwrap().total, 0);
    }
}
