//! # Category Taxonomy and ModelKey Grammar
//!
//! The single declarative table both halves of the system agree on. Training
//! persists one binary sub-model per entry-derived key; inference walks the
//! same table to assemble the response. Member keys are embedded verbatim in
//! ModelKeys and artifact filenames, so this table must never drift from the
//! artifacts already on disk.
//!
//! The key grammar is `<groupPrefix>` for complementary-pair groups (one
//! model scores the `si` side; `no` is derived) and `<groupPrefix>__<member>`
//! for decomposed multi-valued groups, e.g. `tipo__fisica`.

/// Literal prefix every persisted artifact filename carries.
pub const ARTIFACT_PREFIX: &str = "tov_r1_";

/// Canonical artifact extension (TOML documents, see `model`).
pub const ARTIFACT_EXT: &str = "toml";

/// Separator between a group prefix and a decomposed member value.
pub const KEY_SEPARATOR: &str = "__";

/// ModelKey of the overall-presence sub-model. Its score feeds the
/// presence-derived fallback of the violence-type group.
pub const PRESENCE_PREFIX: &str = "vg";

/// How a group's member percentages relate to one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// A `si`/`no` pair scored by a single bare-prefix model; `no` is always
    /// `100 - si` (to one decimal), so the pair sums to 100 by construction.
    ComplementaryPair,
    /// Independently derived percentages, one candidate sub-model per member.
    MultiValued,
}

/// Which percentages stand in for members with no usable sub-model score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackRule {
    /// `round(100 / |members|, 1)` per member (50.0 for pairs).
    Uniform,
    /// The presence score split evenly across members, falling back to the
    /// uniform prior when the presence score is exactly zero.
    PresenceShare,
    /// Degenerate 0/100 split: an absent model contributes 0.0 to `si`.
    /// Used only by the presence group itself.
    Zero,
}

/// One named output distribution.
#[derive(Debug, Clone, Copy)]
pub struct CategoryGroup {
    /// Key of this group in the response object.
    pub name: &'static str,
    /// Group prefix of every ModelKey belonging to this group.
    pub prefix: &'static str,
    pub kind: GroupKind,
    pub fallback: FallbackRule,
    /// Ordered member keys, unique within the group.
    pub members: &'static [&'static str],
}

impl CategoryGroup {
    /// ModelKey under which the sub-model for `member` is persisted.
    /// Complementary pairs share one bare-prefix key for the whole group.
    pub fn member_key(&self, member: &str) -> String {
        match self.kind {
            GroupKind::ComplementaryPair => self.prefix.to_string(),
            GroupKind::MultiValued => format!("{}{}{}", self.prefix, KEY_SEPARATOR, member),
        }
    }

    /// Default granularity of this group: `round(100 / |members|, 1)`.
    pub fn uniform_share(&self) -> f64 {
        round1(100.0 / self.members.len() as f64)
    }
}

/// The full response taxonomy, in response-key order. The presence group
/// comes first: its resolved score parameterizes the violence-type fallback.
pub const TAXONOMY: &[CategoryGroup] = &[
    CategoryGroup {
        name: "siYnoVg",
        prefix: PRESENCE_PREFIX,
        kind: GroupKind::ComplementaryPair,
        fallback: FallbackRule::Zero,
        members: &["si", "no"],
    },
    CategoryGroup {
        name: "tiposDeViolencia",
        prefix: "tipo",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::PresenceShare,
        members: &[
            "fisica",
            "psicologica",
            "sexual",
            "economica",
            "patrimonial",
            "social",
            "vicaria",
        ],
    },
    CategoryGroup {
        name: "frecuencia",
        prefix: "frecuencia",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &["siempre", "casisiempre", "puntomedio", "casinunca", "nunca"],
    },
    CategoryGroup {
        name: "siYnoCd",
        prefix: "denuncia",
        kind: GroupKind::ComplementaryPair,
        fallback: FallbackRule::Uniform,
        members: &["si", "no"],
    },
    CategoryGroup {
        name: "siYnoApoyoU",
        prefix: "apoyo",
        kind: GroupKind::ComplementaryPair,
        fallback: FallbackRule::Uniform,
        members: &["si", "no"],
    },
    CategoryGroup {
        name: "percepcion",
        prefix: "percepcion",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &["muyBuena", "buena", "regular", "mala", "muyMala"],
    },
    CategoryGroup {
        name: "semestre",
        prefix: "semestre",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &[
            "primero", "segundo", "tercero", "cuarto", "quinto", "sexto", "septimo", "octavo",
            "noveno", "decimo",
        ],
    },
    CategoryGroup {
        name: "programas",
        prefix: "programa",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &[
            "Derecho",
            "ContaduriaPublica",
            "Psicologia",
            "IngenieriaSistemas",
            "AdministracionEmpresas",
        ],
    },
    CategoryGroup {
        name: "roles",
        prefix: "rol",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &["Estudiante", "Administrativx", "Docente", "Externo"],
    },
    CategoryGroup {
        name: "rangoEdad",
        prefix: "rangoEdad",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &["menores18", "entre18y25", "entre26y40", "mayores40"],
    },
    CategoryGroup {
        name: "sexos",
        prefix: "sexo",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &["macho", "hembra", "intersexual"],
    },
    CategoryGroup {
        name: "orientacionSexual",
        prefix: "orientacion",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &["hetero", "gay", "lesbiana", "bisexual", "otra"],
    },
    CategoryGroup {
        name: "identidadDeGenero",
        prefix: "identidad",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &["hombre", "mujer", "otra"],
    },
    CategoryGroup {
        name: "discapacidades",
        prefix: "discapacidad",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &[
            "fisicas",
            "sensoriales",
            "intelectuales",
            "psicosociales",
            "multiples",
        ],
    },
    CategoryGroup {
        name: "etnias",
        prefix: "etnia",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &[
            "indigena",
            "afrocolombianos",
            "raizales",
            "gitanos",
            "ninguna",
        ],
    },
    CategoryGroup {
        name: "religiones",
        prefix: "religion",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &[
            "catolicismo",
            "evangelismo",
            "agnosticismo",
            "ateismo",
            "cristianismo",
            "otra",
        ],
    },
    CategoryGroup {
        name: "estadoCivil",
        prefix: "estadoCivil",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &["soltero", "casado", "unionLibre", "divorciado", "viudo"],
    },
    CategoryGroup {
        name: "origen",
        prefix: "origen",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &[
            "municipioLocal",
            "otroMunicipio",
            "otroDepartamento",
            "otroPais",
        ],
    },
    CategoryGroup {
        name: "estrato",
        prefix: "estrato",
        kind: GroupKind::MultiValued,
        fallback: FallbackRule::Uniform,
        members: &["1", "2", "3", "4", "5", "6"],
    },
];

/// Filename a sub-model keyed `key` is persisted under.
pub fn artifact_file_name(key: &str) -> String {
    format!("{ARTIFACT_PREFIX}{key}.{ARTIFACT_EXT}")
}

/// Inverse of [`artifact_file_name`]: extracts the ModelKey from a filename,
/// or `None` when the name does not match the artifact naming grammar.
pub fn key_from_file_name(file_name: &str) -> Option<&str> {
    let key = file_name
        .strip_prefix(ARTIFACT_PREFIX)?
        .strip_suffix(ARTIFACT_EXT)?
        .strip_suffix('.')?;
    if key.is_empty() { None } else { Some(key) }
}

/// Rounds to one decimal place, the precision of every output percentage.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
