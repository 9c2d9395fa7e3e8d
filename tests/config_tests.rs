// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use isp_export::PipelineConfig;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = PipelineConfig::default();

    // Check sensible defaults
    assert_eq!(
        config.completion_timeout(),
        None,
        "Completion should wait indefinitely by default"
    );
    assert!(!config.debug_dump, "Debug dump should be off by default");
    assert_eq!(config.debug_dump_bytes, 5);
}

#[test]
fn test_config_partial_json() {
    // Missing keys fall back to defaults
    let config = PipelineConfig::from_json(r#"{ "completion_timeout_ms": 250 }"#).unwrap();
    assert_eq!(config.completion_timeout(), Some(Duration::from_millis(250)));
    assert_eq!(config.dma_heap, PathBuf::from("/dev/dma_heap/linux,cma"));
}

#[test]
fn test_config_file_roundtrip() {
    let config = PipelineConfig {
        completion_timeout_ms: Some(1000),
        debug_dump: true,
        debug_dump_bytes: 16,
        dma_heap: PathBuf::from("/dev/dma_heap/system"),
    };

    let path = std::env::temp_dir().join(format!("isp-export-config-{}.json", std::process::id()));
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    let loaded = PipelineConfig::load(&path);
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.unwrap(), config);
}

#[test]
fn test_config_missing_file() {
    // Loading a file that does not exist is an I/O error
    let result = PipelineConfig::load(std::path::Path::new("/nonexistent/isp-export.json"));
    assert!(matches!(result, Err(isp_export::ExportError::Io(_))));
}
