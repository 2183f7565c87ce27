//! End-to-end aggregation scenarios: persisted artifacts on disk, a loaded
//! registry, and the full fallback algebra of the response.

use ndarray::Array1;
use tov_engine::aggregate::infer;
use tov_engine::features::Preprocessor;
use tov_engine::model::{LogisticModel, ScoringArtifact, TrainingReport};
use tov_engine::profile::InputProfile;
use tov_engine::registry::ModelRegistry;
use tov_engine::taxonomy::TAXONOMY;

fn sample_profile() -> InputProfile {
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

/// An artifact scoring every profile with the same probability.
fn constant_artifact(key: &str, probability: f64) -> ScoringArtifact {
    let profiles = vec![sample_profile()];
    let preprocessor = Preprocessor::fit(&profiles);
    let width = preprocessor.width();
    ScoringArtifact {
        key: key.to_string(),
        preprocessor,
        model: LogisticModel {
            intercept: (probability / (1.0 - probability)).ln(),
            coefficients: Array1::zeros(width),
        },
        report: TrainingReport::default(),
    }
}

#[test]
fn empty_model_directory_produces_all_default_distributions() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::load(dir.path()).unwrap();
    assert!(registry.is_empty());

    let response = infer(&registry, &sample_profile());
    let group_names: Vec<&str> = response.iter().map(|(name, _)| name).collect();
    let expected: Vec<&str> = TAXONOMY.iter().map(|g| g.name).collect();
    assert_eq!(group_names, expected, "exactly the 19 named groups, in order");

    let presence = response.group("siYnoVg").unwrap();
    assert_eq!(presence.get("si"), Some(0.0));
    assert_eq!(presence.get("no"), Some(100.0));

    for (name, distribution) in response.iter() {
        let group = TAXONOMY.iter().find(|g| g.name == name).unwrap();
        assert_eq!(distribution.len(), group.members.len());
    }

    // Every multi-valued member equals its default granularity; presence is
    // zero, so even the violence types use the uniform prior.
    let tipos = response.group("tiposDeViolencia").unwrap();
    for (_, value) in tipos.iter() {
        assert_eq!(value, 14.3);
    }
    let semestre = response.group("semestre").unwrap();
    for (_, value) in semestre.iter() {
        assert_eq!(value, 10.0);
    }
    let estrato = response.group("estrato").unwrap();
    for (_, value) in estrato.iter() {
        assert_eq!(value, 16.7);
    }
}

#[test]
fn missing_reporting_and_support_models_yield_even_splits() {
    let registry = ModelRegistry::from_artifacts([]);
    let response = infer(&registry, &sample_profile());
    for name in ["siYnoCd", "siYnoApoyoU"] {
        let pair = response.group(name).unwrap();
        assert_eq!(pair.get("si"), Some(50.0));
        assert_eq!(pair.get("no"), Some(50.0));
    }
}

#[test]
fn presence_model_at_eighty_percent_drives_the_type_fallback() {
    let dir = tempfile::tempdir().unwrap();
    constant_artifact("vg", 0.8).save(dir.path()).unwrap();
    let registry = ModelRegistry::load(dir.path()).unwrap();

    let response = infer(&registry, &sample_profile());
    let presence = response.group("siYnoVg").unwrap();
    assert_eq!(presence.get("si"), Some(80.0));
    assert_eq!(presence.get("no"), Some(20.0));

    let tipos = response.group("tiposDeViolencia").unwrap();
    for (_, value) in tipos.iter() {
        assert_eq!(value, 11.4, "round(80/7, 1)");
    }
}

#[test]
fn persisted_keys_round_trip_through_the_naming_grammar() {
    let dir = tempfile::tempdir().unwrap();
    let keys = ["vg", "tipo__fisica", "programa__Derecho", "denuncia"];
    for key in keys {
        constant_artifact(key, 0.3).save(dir.path()).unwrap();
    }

    let registry = ModelRegistry::load(dir.path()).unwrap();
    assert_eq!(registry.len(), keys.len());
    for key in keys {
        let artifact = registry.lookup(key).unwrap();
        assert_eq!(artifact.key, key, "lookup key resolves to its own artifact");
    }
    assert!(registry.lookup("tipo__sexual").is_none());
}

#[test]
fn identical_profiles_yield_byte_identical_responses() {
    let registry = ModelRegistry::from_artifacts([
        constant_artifact("vg", 0.42),
        constant_artifact("frecuencia__siempre", 0.07),
        constant_artifact("apoyo", 0.66),
    ]);

    let first = serde_json::to_vec(&infer(&registry, &sample_profile())).unwrap();
    let second = serde_json::to_vec(&infer(&registry, &sample_profile())).unwrap();
    assert_eq!(first, second);
}

#[test]
fn complement_pairs_sum_to_one_hundred_for_scored_and_fallback_sides() {
    let registry = ModelRegistry::from_artifacts([
        constant_artifact("vg", 0.734),
        constant_artifact("denuncia", 0.219),
    ]);
    let response = infer(&registry, &sample_profile());
    for name in ["siYnoVg", "siYnoCd", "siYnoApoyoU"] {
        let pair = response.group(name).unwrap();
        let sum = pair.get("si").unwrap() + pair.get("no").unwrap();
        assert!((sum - 100.0).abs() <= 0.1, "{name} summed to {sum}");
    }
}
