//! Config loading and defaults integration tests

use sealgate::config::Config;
use std::path::PathBuf;

#[test]
fn test_empty_config_uses_defaults() {
    let config: Config = toml::from_str("").expect("valid TOML");

    assert_eq!(config.server.http_port, 5000);
    assert_eq!(config.server.max_upload_bytes, 100 * 1024 * 1024);
    assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
    assert_eq!(config.storage.output_dir, PathBuf::from("output"));
    assert_eq!(config.pipeline.command, "python3");
    assert_eq!(config.pipeline.script, Some(PathBuf::from("obfuscator.py")));
}

#[test]
fn test_config_with_all_fields() {
    let toml_str = r#"
[server]
http_port = 8080
max_upload_bytes = 1048576

[storage]
upload_dir = "/var/lib/sealgate/uploads"
output_dir = "/var/lib/sealgate/output"

[pipeline]
command = "/usr/local/bin/obfuscator"
"#;

    let config: Config = toml::from_str(toml_str).expect("valid TOML");

    assert_eq!(config.server.http_port, 8080);
    assert_eq!(config.server.max_upload_bytes, 1_048_576);
    assert_eq!(
        config.storage.upload_dir,
        PathBuf::from("/var/lib/sealgate/uploads")
    );
    assert_eq!(config.pipeline.command, "/usr/local/bin/obfuscator");
    // Script default still applies when the section is partial
    assert_eq!(config.pipeline.script, Some(PathBuf::from("obfuscator.py")));
}

#[test]
fn test_partial_sections_use_field_defaults() {
    let toml_str = r#"
[server]
http_port = 9999
"#;

    let config: Config = toml::from_str(toml_str).expect("valid TOML");
    assert_eq!(config.server.http_port, 9999);
    assert_eq!(config.server.max_upload_bytes, 100 * 1024 * 1024);
}
