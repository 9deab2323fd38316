//! Integration tests for config

#[cfg(test)]
mod tests {
    use ferry_config::constants::*;
    use ferry_config::*;
    use ferry_errors::{ConfigError, Error};
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            ENV_WORKERS,
            ENV_QUEUE_CAPACITY,
            ENV_INDEX,
            ENV_ARCHIVES,
            ENV_STATE_DIR,
            ENV_DOWNLOAD_URL,
        ] {
            std::env::remove_var(var);
        }
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
workers = 8
queue_capacity = 16

[paths]
index = "/srv/crates.io-index"
archives = "/srv/crates"

[network]
download_url = "https://static.crates.io/crates/{{crate}}/{{crate}}-{{version}}.crate"
timeout = 60

[verify]
skip_missing = true
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.general.workers, 8);
        assert_eq!(config.general.queue_capacity, 16);
        assert_eq!(config.general.shutdown_grace_secs, 10);
        assert_eq!(
            config.index_path().unwrap(),
            PathBuf::from("/srv/crates.io-index")
        );
        assert_eq!(config.network.timeout, 60);
        assert_eq!(config.network.connect_timeout, 30);
        assert!(config.verify.skip_missing);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_error() {
        let result = Config::load_from_file(std::path::Path::new("/nonexistent/ferry.toml")).await;
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var(ENV_WORKERS, "4");
        std::env::set_var(ENV_INDEX, "/tmp/index");
        std::env::set_var(ENV_DOWNLOAD_URL, "https://mirror.example/{crate}/{version}");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.general.workers, 4);
        assert_eq!(config.paths.index, Some(PathBuf::from("/tmp/index")));
        assert_eq!(
            config.network.download_url.as_deref(),
            Some("https://mirror.example/{crate}/{version}")
        );

        clear_env();
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var(ENV_QUEUE_CAPACITY, "lots");

        let mut config = Config::default();
        assert!(config.merge_env().is_err());

        clear_env();
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.paths.index = Some(PathBuf::from("/i"));
        config.paths.archives = Some(PathBuf::from("/a"));
        assert!(config.validate().is_ok());

        config.general.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_paths() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField { ref field }) if field == "paths.index"
        ));
    }
}
