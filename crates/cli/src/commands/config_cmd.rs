//! `stratum check-config` and `stratum default-config`.

use std::path::Path;
use stratum_config::{ConfigError, EngineConfig};

/// Load `file`, resolve `mode` (or the file's default mode) and render the
/// snapshot as pretty JSON.
pub fn resolve_snapshot(file: &Path, mode: Option<&str>) -> Result<String, ConfigError> {
    if !file.exists() {
        return Err(ConfigError::ReadError {
            path: file.to_path_buf(),
            reason: "file not found".into(),
        });
    }

    let config = EngineConfig::load_from(file)?;
    let resolved = match mode {
        Some(mode) => config.resolve(mode)?,
        None => config.resolve_default()?,
    };
    tracing::debug!(mode = %resolved.mode, "Resolved configuration");

    serde_json::to_string_pretty(&resolved.snapshot())
        .map_err(|e| ConfigError::ValidationError(format!("snapshot is not serializable: {e}")))
}

pub async fn check(file: &Path, mode: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    match resolve_snapshot(file, mode) {
        Ok(json) => {
            println!("{json}");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Config error: {e}");
            Err(e.into())
        }
    }
}

pub async fn show_default() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", EngineConfig::default_toml());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn resolves_named_mode() {
        let file = write_config(
            r#"
default_mode = "standard"

[modes.strict]
validation_level = "full"
max_iterations = 4
"#,
        );
        let json = resolve_snapshot(file.path(), Some("strict")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["mode"], "strict");
        assert_eq!(value["reasoning"]["max_iterations"], 4);
    }

    #[test]
    fn defaults_to_file_default_mode() {
        let file = write_config("default_mode = \"lightweight\"\n");
        let json = resolve_snapshot(file.path(), None).unwrap();
        assert!(json.contains("\"lightweight\""));
    }

    #[test]
    fn unknown_mode_is_an_error() {
        let file = write_config("");
        let err = resolve_snapshot(file.path(), Some("turbo")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMode(_)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = resolve_snapshot(Path::new("/definitely/not/here.toml"), None).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
