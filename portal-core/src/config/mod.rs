use config::{Config, ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable that points directly at a configuration directory.
pub const CONFIG_DIR_ENV: &str = "CONFIG_DIR";

/// Resolve the `config/` directory of a workspace member.
///
/// Works both when the binary is started from the workspace root and from
/// inside the crate directory. `CONFIG_DIR` wins when set.
pub fn configuration_directory(crate_name: &str) -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    let base_path = std::env::current_dir().map_err(|e| {
        ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;

    if base_path.ends_with(crate_name) {
        Ok(base_path.join("config"))
    } else {
        Ok(base_path.join(crate_name).join("config"))
    }
}

/// Load settings from `base.yaml`, an optional `local.yaml`, then environment
/// variables named `<PREFIX>_<SECTION>__<KEY>`.
pub fn load_layered<T: DeserializeOwned>(directory: &Path, env_prefix: &str) -> Result<T, ConfigError> {
    dotenvy::dotenv().ok();

    let settings = Config::builder()
        .add_source(File::from(directory.join("base.yaml")).required(true))
        .add_source(File::from(directory.join("local.yaml")).required(false))
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;

    #[derive(Debug, Deserialize)]
    struct Sample {
        server: SampleServer,
    }

    #[derive(Debug, Deserialize)]
    struct SampleServer {
        host: String,
        port: u16,
    }

    #[test]
    fn local_file_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "server:\n  host: 127.0.0.1\n  port: 5000\n",
        )
        .unwrap();
        fs::write(dir.path().join("local.yaml"), "server:\n  port: 6000\n").unwrap();

        let sample: Sample = load_layered(dir.path(), "CORETESTLOCAL").unwrap();
        assert_eq!(sample.server.host, "127.0.0.1");
        assert_eq!(sample.server.port, 6000);
    }

    #[test]
    fn environment_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "server:\n  host: 127.0.0.1\n  port: 5000\n",
        )
        .unwrap();
        std::env::set_var("CORETESTENV_SERVER__HOST", "0.0.0.0");

        let sample: Sample = load_layered(dir.path(), "CORETESTENV").unwrap();
        assert_eq!(sample.server.host, "0.0.0.0");
        assert_eq!(sample.server.port, 5000);

        std::env::remove_var("CORETESTENV_SERVER__HOST");
    }

    #[test]
    fn missing_base_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Sample, _> = load_layered(dir.path(), "CORETESTMISSING");
        assert!(result.is_err());
    }
}
