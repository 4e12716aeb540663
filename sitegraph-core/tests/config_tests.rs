// Tests for analysis configuration

use sitegraph_core::config::AnalysisConfig;
use sitegraph_core::error::CoreError;
use std::fs;
use tempfile::TempDir;

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn test_defaults() {
    let config = AnalysisConfig::default();

    assert_eq!(config.roots, vec!["/"]);
    assert_eq!(config.max_hops, 5);
    assert_eq!(config.equity.damping, 0.85);
    assert_eq!(config.equity.max_iterations, 100);
    assert_eq!(config.cannibalization.close_rank_gap, 2);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_json_uses_defaults() {
    let config: AnalysisConfig =
        serde_json::from_str(r#"{"max_hops": 3, "equity": {"damping": 0.9}}"#).unwrap();

    assert_eq!(config.max_hops, 3);
    assert_eq!(config.equity.damping, 0.9);
    assert_eq!(config.equity.tolerance, 1e-4);
    assert_eq!(config.roots, vec!["/"]);
    assert_eq!(config.cannibalization.dominant_share, 0.70);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_damping_out_of_range() {
    for damping in [0.0, 1.0, -0.2, 1.5] {
        let mut config = AnalysisConfig::default();
        config.equity.damping = damping;
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }
}

#[test]
fn test_zero_iterations_rejected() {
    let mut config = AnalysisConfig::default();
    config.equity.max_iterations = 0;

    assert!(config.validate().is_err());
}

#[test]
fn test_empty_roots_rejected() {
    let config = AnalysisConfig::default().with_roots(vec![]);

    assert!(config.validate().is_err());
}

#[test]
fn test_share_thresholds_validated() {
    let mut config = AnalysisConfig::default();
    config.cannibalization.dominant_share = 1.2;
    assert!(config.validate().is_err());

    let mut config = AnalysisConfig::default();
    config.cannibalization.negligible_share = 0.5;
    assert!(config.validate().is_err());
}

// ============================================================================
// File Loading
// ============================================================================

#[test]
fn test_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sitegraph.json");
    fs::write(&path, r#"{"roots": ["/", "/shop"], "workers": 2}"#).unwrap();

    let config = AnalysisConfig::from_file(&path).unwrap();

    assert_eq!(config.roots, vec!["/", "/shop"]);
    assert_eq!(config.workers, 2);
}

#[test]
fn test_from_file_invalid_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sitegraph.json");
    fs::write(&path, r#"{"equity": {"damping": 2.0}}"#).unwrap();

    assert!(matches!(
        AnalysisConfig::from_file(&path),
        Err(CoreError::InvalidConfig(_))
    ));
}

#[test]
fn test_from_file_malformed_json() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sitegraph.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        AnalysisConfig::from_file(&path),
        Err(CoreError::Serialization(_))
    ));
}

#[test]
fn test_from_missing_file() {
    let temp_dir = TempDir::new().unwrap();

    assert!(matches!(
        AnalysisConfig::from_file(&temp_dir.path().join("missing.json")),
        Err(CoreError::Io(_))
    ));
}
