use super::*;

#[test]
fn defaults_are_sane() {
    let config = EngineConfig::default();
    assert_eq!(config.bunch_size, default_bunch_size());
    assert_eq!(config.thread_count, ThreadCount::Auto);
    assert!(config.hsml.is_none());
    assert!(!config.debug_checks);
}

#[test]
fn parses_minimal_toml() {
    let config = EngineConfig::from_toml_str(
        r#"
        import_buffer_boost = 1
        bunch_size = 5000
        thread_count = "auto"
        "#,
    )
    .unwrap();
    assert_eq!(config.import_buffer_boost, 1);
    assert_eq!(config.bunch_size, 5000);
    assert!(config.hsml.is_none());
}

#[test]
fn parses_toml_with_hsml_and_fixed_thread_count() {
    let toml = r#"
        import_buffer_boost = 2
        bunch_size = 20000

        [thread_count]
        count = 8

        [hsml]
        target_neighbours = 64
        tolerance = 3
        max_iterations = 40

        [buffer]
        safety_margin_bytes = 1048576
        mpi_transfer_ceiling_bytes = 2147483648
        min_export_records = 256
    "#;
    let config = EngineConfig::from_toml_str(toml).unwrap();
    assert_eq!(config.thread_count, ThreadCount::Count(8));
    let hsml = config.hsml.unwrap();
    assert_eq!(hsml.target_neighbours, 64);
    assert_eq!(hsml.tolerance, 3);
    assert_eq!(hsml.max_iterations, 40);
    assert_eq!(config.buffer.safety_margin_bytes, 1_048_576);
    assert_eq!(config.buffer.min_export_records, 256);
}

#[test]
fn parses_equivalent_yaml() {
    let yaml = "
import_buffer_boost: 1
bunch_size: 10000
thread_count: auto
hsml:
  target_neighbours: 32
  tolerance: 2
  max_iterations: 60
";
    let config = EngineConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.bunch_size, 10000);
    assert_eq!(config.hsml.unwrap().target_neighbours, 32);
}

#[test]
fn rejects_zero_bunch_size() {
    let err = EngineConfig::from_toml_str("bunch_size = 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn rejects_zero_min_export_records() {
    let toml = "
        bunch_size = 100

        [buffer]
        min_export_records = 0
    ";
    let err = EngineConfig::from_toml_str(toml).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn missing_file_surfaces_io_error() {
    let err = EngineConfig::from_toml_file("/nonexistent/treewalk.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn builder_methods_override_defaults() {
    let config = EngineConfig::new()
        .with_import_buffer_boost(3)
        .with_bunch_size(1234)
        .with_hsml(HsmlLoopConfig {
            target_neighbours: 48,
            tolerance: 1,
            max_iterations: 20,
        });
    assert_eq!(config.import_buffer_boost, 3);
    assert_eq!(config.bunch_size, 1234);
    assert_eq!(config.hsml.unwrap().target_neighbours, 48);
}

#[test]
fn thread_count_auto_resolves_to_at_least_one() {
    assert!(ThreadCount::Auto.resolve() >= 1);
    assert_eq!(ThreadCount::Count(0).resolve(), 1);
    assert_eq!(ThreadCount::Count(4).resolve(), 4);
}
