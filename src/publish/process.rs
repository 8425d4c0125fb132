use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::engine::{EngineError, EngineResult};

use super::artifact::excerpt;

/// 外部构建工具链配置，默认 `sui move build --dump-bytecode-as-base64`。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    pub binary: String,
    pub build_args: Vec<String>,
    pub environment: HashMap<String, String>,
    /// 临时工作目录的父目录，为空时使用系统临时目录。
    pub work_root: Option<PathBuf>,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            binary: "sui".to_string(),
            build_args: vec![
                "move".to_string(),
                "build".to_string(),
                "--dump-bytecode-as-base64".to_string(),
            ],
            environment: HashMap::new(),
            work_root: None,
        }
    }
}

#[derive(Debug)]
pub struct BuildOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolchainSettings {
    fn resolve_binary(&self) -> EngineResult<PathBuf> {
        let binary = Path::new(&self.binary);
        if binary.components().count() > 1 {
            return Ok(binary.to_path_buf());
        }
        which::which(&self.binary).map_err(|err| {
            EngineError::BuildFailed(format!("找不到构建工具 `{}`: {err}", self.binary))
        })
    }

    /// 运行构建：`<binary> <build_args…> --path <package> --install-dir <workdir>`。
    /// 进程在 `workdir` 中运行，两个路径都先转成绝对路径再传入。
    /// 调用方放弃等待时进程不会被杀掉，由其自行结束。
    pub async fn run_build(&self, package: &Path, workdir: &Path) -> EngineResult<BuildOutput> {
        let package = std::path::absolute(package)?;
        let workdir = std::path::absolute(workdir)?;
        let package = package.as_path();
        let workdir = workdir.as_path();
        let binary = self.resolve_binary()?;
        let mut command = Command::new(&binary);
        command
            .args(&self.build_args)
            .arg("--path")
            .arg(package)
            .arg("--install-dir")
            .arg(workdir)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if !self.environment.contains_key("NO_COLOR") {
            command.env("NO_COLOR", "1");
        }
        for (key, value) in &self.environment {
            command.env(key, value);
        }

        debug!(
            target: "publish",
            binary = %binary.display(),
            package = %package.display(),
            workdir = %workdir.display(),
            "spawning build toolchain"
        );
        let started = Instant::now();
        let output = command.output().await.map_err(|err| {
            EngineError::BuildFailed(format!("无法启动构建工具 `{}`: {err}", binary.display()))
        })?;
        let elapsed = started.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let diagnostic = if stderr.trim().is_empty() {
                &stdout
            } else {
                &stderr
            };
            return Err(EngineError::BuildFailed(format!(
                "构建工具退出码 {}: {}",
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |code| code.to_string()),
                excerpt(diagnostic)
            )));
        }

        Ok(BuildOutput {
            stdout,
            stderr,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_build_failure() {
        let settings = ToolchainSettings {
            binary: "kepler-no-such-toolchain".into(),
            ..ToolchainSettings::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let err = settings.run_build(dir.path(), dir.path()).await.unwrap_err();
        assert!(matches!(err, EngineError::BuildFailed(_)));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_diagnostics() {
        let settings = ToolchainSettings {
            binary: "sh".into(),
            build_args: vec!["-c".into(), "echo 'unbound module' >&2; exit 3".into()],
            ..ToolchainSettings::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let err = settings.run_build(dir.path(), dir.path()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("3"), "{message}");
        assert!(message.contains("unbound module"), "{message}");
    }

    #[tokio::test]
    async fn relative_package_resolves_against_caller_directory() {
        let settings = ToolchainSettings {
            binary: "sh".into(),
            build_args: vec![
                "-c".into(),
                "test -d \"$2\" || { echo \"missing $2\" >&2; exit 1; }".into(),
                "sh".into(),
            ],
            ..ToolchainSettings::default()
        };
        let package = tempfile::Builder::new()
            .prefix("kepler-relative-")
            .tempdir_in(".")
            .unwrap();
        let relative = Path::new(package.path().file_name().unwrap());
        let workdir = tempfile::tempdir().unwrap();
        settings.run_build(relative, workdir.path()).await.unwrap();
    }

    #[tokio::test]
    async fn passes_package_and_install_dir() {
        let settings = ToolchainSettings {
            binary: "sh".into(),
            build_args: vec!["-c".into(), "echo \"$1 $2 $3 $4 $KEPLER_MARK\"".into(), "sh".into()],
            environment: HashMap::from([("KEPLER_MARK".to_string(), "ok".to_string())]),
            ..ToolchainSettings::default()
        };
        let package = tempfile::tempdir().unwrap();
        let workdir = tempfile::tempdir().unwrap();
        let output = settings
            .run_build(package.path(), workdir.path())
            .await
            .unwrap();
        assert_eq!(
            output.stdout.trim(),
            format!(
                "--path {} --install-dir {} ok",
                package.path().display(),
                workdir.path().display()
            )
        );
    }
}
