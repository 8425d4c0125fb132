use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::KeplerConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["kepler.yaml", "config/kepler.yaml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// 显式指定的路径必须存在；未指定时依次查找默认路径，全部缺失则使用默认配置。
/// 环境变量覆盖在解析后统一应用。
pub fn load_config(path: Option<PathBuf>) -> Result<KeplerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_file(&path)?,
        None => {
            let mut found = None;
            for candidate in DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from) {
                if candidate.exists() {
                    found = Some(read_file(&candidate)?);
                    break;
                }
            }
            found.unwrap_or_default()
        }
    };
    config.apply_env();
    Ok(config)
}

fn read_file(path: &Path) -> Result<KeplerConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<KeplerConfig, ConfigError> {
    if contents.trim().is_empty() {
        return Ok(KeplerConfig::default());
    }
    serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(dir.path().join("absent.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn reads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kepler.yaml");
        fs::write(
            &path,
            "gas:\n  budget: 9000000\n  price: 750\nbuild:\n  binary: /opt/sui/bin/sui\n  work_root: /var/tmp\n",
        )
        .unwrap();
        let config = read_file(&path).unwrap();
        assert_eq!(config.gas.budget, 9_000_000);
        assert_eq!(config.gas.price, Some(750));
        assert_eq!(config.build.binary, "/opt/sui/bin/sui");
        assert_eq!(config.build.build_args.len(), 3);
        assert_eq!(config.build.work_root, Some(PathBuf::from("/var/tmp")));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let err = parse_config("gas: [", Path::new("broken.yaml")).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
        assert!(parse_config("  \n", Path::new("empty.yaml")).is_ok());
    }

    #[test]
    fn bundled_template_parses() {
        let template = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/kepler.yaml"));
        let config = parse_config(template, Path::new("kepler.yaml")).unwrap();
        assert!(!config.global.rpc_urls().is_empty());
    }
}
