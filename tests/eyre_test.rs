use precon_stream::{throw, ConfigError, Result, WrapErr};

#[test]
// Verify if our exported Result can be used correctly
fn test_export_eyre_result() -> Result<()> {
    Ok(())
}

#[test]
fn test_export_eyre_macro() -> Result<()> {
    let report = throw!("topic {} is missing", "construction.projects");
    assert_eq!(report.to_string(), "topic construction.projects is missing");

    Ok(())
}

#[test]
fn config_errors_convert_into_reports() {
    let result: Result<()> = Err(ConfigError::Missing("kafka-bootstrap-servers"))
        .wrap_err("Invalid configuration");

    let report = result.unwrap_err();
    assert_eq!(report.to_string(), "Invalid configuration");
    assert_eq!(
        report.root_cause().to_string(),
        "missing required setting `kafka-bootstrap-servers`"
    );
}
