//! One respondent's demographic/contextual feature vector.
//!
//! The profile shape is fixed: fifteen required fields, numeric for age and
//! socioeconomic stratum, categorical strings otherwise. Schema validation
//! happens at the deserialization boundary (missing or unknown fields are
//! rejected by serde); by the time a profile reaches the aggregator it is
//! immutable and complete.

use serde::{Deserialize, Serialize};

/// Names of the numeric feature columns, in canonical encoding order.
pub const NUMERIC_COLUMNS: [&str; 2] = ["edad", "estrato"];

/// Names of the categorical feature columns, in canonical encoding order.
pub const CATEGORICAL_COLUMNS: [&str; 13] = [
    "municipio",
    "universidad",
    "semestre",
    "programa",
    "rol",
    "sexo",
    "orientacion",
    "identidad",
    "discapacidad",
    "etnia",
    "religion",
    "estado_civil",
    "origen",
];

/// One respondent's answers, as received in an inference request or read from
/// one training row. Every field is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputProfile {
    pub municipio: String,
    pub universidad: String,
    pub semestre: String,
    pub programa: String,
    pub rol: String,
    pub edad: i64,
    pub sexo: String,
    pub orientacion: String,
    pub identidad: String,
    pub discapacidad: String,
    pub etnia: String,
    pub religion: String,
    pub estado_civil: String,
    pub origen: String,
    pub estrato: i64,
}

impl InputProfile {
    /// Numeric feature values, aligned with [`NUMERIC_COLUMNS`].
    pub fn numeric_values(&self) -> [f64; 2] {
        [self.edad as f64, self.estrato as f64]
    }

    /// Categorical feature values, aligned with [`CATEGORICAL_COLUMNS`].
    pub fn categorical_values(&self) -> [&str; 13] {
        [
            &self.municipio,
            &self.universidad,
            &self.semestre,
            &self.programa,
            &self.rol,
            &self.sexo,
            &self.orientacion,
            &self.identidad,
            &self.discapacidad,
            &self.etnia,
            &self.religion,
            &self.estado_civil,
            &self.origen,
        ]
    }
}

/// A fully populated profile for unit tests across the crate.
#[cfg(test)]
pub(crate) fn sample_profile() -> InputProfile {
    InputProfile {
        municipio: "Valledupar".to_string(),
        universidad: "UPC".to_string(),
        semestre: "quinto".to_string(),
        programa: "Derecho".to_string(),
        rol: "Estudiante".to_string(),
        edad: 22,
        sexo: "hembra".to_string(),
        orientacion: "hetero".to_string(),
        identidad: "mujer".to_string(),
        discapacidad: "ninguna".to_string(),
        etnia: "ninguna".to_string(),
        religion: "catolicismo".to_string(),
        estado_civil: "soltero".to_string(),
        origen: "municipioLocal".to_string(),
        estrato: 3,
    }
}
