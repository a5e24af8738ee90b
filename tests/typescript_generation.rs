//! TypeScript Generation Tests
//!
//! Validates that snapshot types can be exported to TypeScript when the tauri
//! feature is enabled, so dashboards can share the relay's JSON shape.

#[cfg(feature = "tauri")]
#[test]
fn test_snapshot_types_implement_specta_type() {
    use specta::Type;

    // If this compiles, all types are properly configured for TypeScript export.
    fn assert_type<T: Type>() {}

    assert_type::<f1m_telemetry::Snapshot>();
    assert_type::<f1m_telemetry::EntitySnapshot>();
    assert_type::<f1m_telemetry::SessionData>();
    assert_type::<f1m_telemetry::DriverData>();
    assert_type::<f1m_telemetry::CarData>();
    assert_type::<f1m_telemetry::WeatherData>();
    assert_type::<f1m_telemetry::FieldId>();
    assert_type::<f1m_telemetry::EnumTable>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types still compile and serialize without specta::Type.
    let json = serde_json::to_string(&f1m_telemetry::Snapshot::new()).unwrap();
    assert_eq!(json, "{}");
}
