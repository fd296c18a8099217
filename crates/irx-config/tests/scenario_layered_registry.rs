use irx_config::{load_layered_yaml, load_layered_yaml_from_strings};
use irx_schemas::FieldKind;

const BASE: &str = r#"
entities:
  jira_issues:
    unique_keys: [jira_key, repo_url]
    excluded_fields: [id, created_date]
    structured_fields: [issue_data]
"#;

const OVERRIDE: &str = r#"
entities:
  jira_issues:
    structured_fields: [issue_data, changelog]
  coverage_reports:
    unique_keys: [artifact_url, artifact_version]
"#;

#[test]
fn later_layer_overrides_and_extends() {
    let loaded = load_layered_yaml_from_strings(&[BASE, OVERRIDE]).expect("load");
    let reg = &loaded.registry;
    assert_eq!(reg.len(), 2);

    let jira = reg.lookup("jira_issues").unwrap();
    assert_eq!(jira.unique_keys(), &["jira_key", "repo_url"]);
    assert_eq!(jira.field_kind("changelog"), FieldKind::Structured);
    assert!(jira.is_excluded("created_date"));

    let cov = reg.lookup("coverage_reports").unwrap();
    assert!(cov.excluded_fields().is_empty());
}

#[test]
fn config_hash_is_stable_under_key_order() {
    let a = r#"
entities:
  t:
    unique_keys: [k]
    excluded_fields: [id]
"#;
    let b = r#"
entities:
  t:
    excluded_fields: [id]
    unique_keys: [k]
"#;
    let la = load_layered_yaml_from_strings(&[a]).unwrap();
    let lb = load_layered_yaml_from_strings(&[b]).unwrap();
    assert_eq!(la.config_hash, lb.config_hash);
    assert_eq!(la.config_hash.len(), 64);
}

#[test]
fn legacy_column_names_are_accepted() {
    let yaml = r#"
entities:
  manual_test_records:
    unique_keys: [jira_key, artifact_url]
    excluded_columns: [id, created_date]
    json_columns: [execution_result]
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let s = loaded.registry.lookup("manual_test_records").unwrap();
    assert!(s.is_excluded("id"));
    assert_eq!(s.field_kind("execution_result"), FieldKind::Structured);
}

#[test]
fn invalid_definitions_are_rejected() {
    let unknown_key = r#"
entities:
  t:
    unique_keys: [k]
    primary_key: [k]
"#;
    assert!(load_layered_yaml_from_strings(&[unknown_key]).is_err());

    let excluded_key = r#"
entities:
  t:
    unique_keys: [id]
    excluded_fields: [id]
"#;
    let err = load_layered_yaml_from_strings(&[excluded_key]).unwrap_err();
    assert!(format!("{err:#}").contains("also an excluded field"));

    let bad_name = r#"
entities:
  "bad table":
    unique_keys: [k]
"#;
    let err = load_layered_yaml_from_strings(&[bad_name]).unwrap_err();
    assert!(format!("{err:#}").contains("invalid entity type"));
}

#[test]
fn loads_from_files_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let over = dir.path().join("override.yaml");
    std::fs::write(&base, BASE).unwrap();
    std::fs::write(&over, OVERRIDE).unwrap();

    let base_s = base.to_string_lossy().to_string();
    let over_s = over.to_string_lossy().to_string();
    let loaded = load_layered_yaml(&[base_s.as_str(), over_s.as_str()]).unwrap();
    assert!(loaded.registry.lookup("coverage_reports").is_some());

    let missing = dir.path().join("missing.yaml").to_string_lossy().to_string();
    assert!(load_layered_yaml(&[missing.as_str()]).is_err());
}
