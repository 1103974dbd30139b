use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;

/// Canonical treatment status labels, in the order shown to users.
pub const VALID_STATUSES: [&str; 3] = ["Por Iniciar", "En proceso", "Terminado"];

/// Treatment lifecycle. Stored verbatim as the canonical label; free-text
/// input goes through [`TreatmentStatus::normalize`] exactly once, at the
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreatmentStatus {
    #[serde(rename = "Por Iniciar")]
    PorIniciar,
    #[serde(rename = "En proceso")]
    EnProceso,
    #[serde(rename = "Terminado")]
    Terminado,
}

impl TreatmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PorIniciar => "Por Iniciar",
            Self::EnProceso => "En proceso",
            Self::Terminado => "Terminado",
        }
    }

    /// Lenient input parse: case- and whitespace-insensitive. Empty input
    /// falls back to the default `Por Iniciar`; anything outside the three
    /// recognized spellings is `None`.
    pub fn normalize(raw: &str) -> Option<Self> {
        let v = raw.trim().to_lowercase();
        if v.is_empty() {
            return Some(Self::PorIniciar);
        }
        match v.as_str() {
            "por iniciar" => Some(Self::PorIniciar),
            "en proceso" => Some(Self::EnProceso),
            "terminado" => Some(Self::Terminado),
            _ => None,
        }
    }
}

impl Default for TreatmentStatus {
    fn default() -> Self {
        Self::PorIniciar
    }
}

impl std::str::FromStr for TreatmentStatus {
    type Err = DatabaseError;

    /// Exact parse of a stored canonical label (database round-trip).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Por Iniciar" => Ok(Self::PorIniciar),
            "En proceso" => Ok(Self::EnProceso),
            "Terminado" => Ok(Self::Terminado),
            _ => Err(DatabaseError::InvalidEnum {
                field: "TreatmentStatus".into(),
                value: s.into(),
            }),
        }
    }
}
