use serde::{Deserialize, Serialize};

/// Payment row as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub patient_id: i64,
    pub patient_service_id: Option<i64>,
    pub fecha: String,
    pub monto: f64,
    pub payment_method_id: i64,
    pub payment_status_id: i64,
    pub numero_factura: String,
    pub notas: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Payment creation input. Missing method/status ids are resolved from the
/// catalogs by name with sentinel fallbacks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPayment {
    pub fecha: Option<String>,
    pub patient_service_id: Option<i64>,
    pub monto: Option<f64>,
    pub payment_method_id: Option<i64>,
    pub payment_status_id: Option<i64>,
    pub notas: Option<String>,
}

/// Partial update; absent fields keep the stored value. `estado` and
/// `metodo_pago` accept catalog names in place of numeric ids.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentPatch {
    pub fecha: Option<String>,
    pub patient_service_id: Option<i64>,
    pub monto: Option<f64>,
    pub payment_method_id: Option<i64>,
    pub payment_status_id: Option<i64>,
    pub estado: Option<String>,
    pub metodo_pago: Option<String>,
    pub notas: Option<String>,
}

/// Payment list row with display joins and the query-time balance.
/// `total_pagado` / `saldo_pendiente` are recomputed on every read.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    pub id: i64,
    pub fecha: String,
    pub patient_service_id: Option<i64>,
    pub group_id: Option<i64>,
    pub group_start_date: Option<String>,
    pub tratamiento: Option<String>,
    pub total_cost: Option<f64>,
    pub monto: f64,
    pub total_pagado: f64,
    pub saldo_pendiente: Option<f64>,
    pub payment_method_id: Option<i64>,
    pub metodo_pago: Option<String>,
    pub payment_status_id: Option<i64>,
    pub estado: Option<String>,
    pub numero_factura: String,
    pub notas: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
