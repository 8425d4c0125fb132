use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;

use crate::engine::{EngineError, EngineResult};
use crate::types::ObjectId;

#[derive(Debug, Deserialize)]
struct RawArtifact {
    modules: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    digest: Vec<u8>,
}

/// 构建产物：模块字节码与依赖包 ID，只被一次发布消费。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishArtifact {
    pub modules: Vec<Vec<u8>>,
    pub dependencies: Vec<ObjectId>,
    pub digest: Vec<u8>,
}

impl PublishArtifact {
    /// 解析 `--dump-bytecode-as-base64` 输出；JSON 之前的提示行会被跳过。
    pub fn parse(stdout: &str) -> EngineResult<Self> {
        let start = stdout.find('{').ok_or_else(|| {
            EngineError::BuildFailed(format!(
                "构建输出中没有 JSON 产物: {}",
                excerpt(stdout)
            ))
        })?;
        let raw: RawArtifact = serde_json::Deserializer::from_str(&stdout[start..])
            .into_iter::<RawArtifact>()
            .next()
            .ok_or_else(|| EngineError::BuildFailed("构建输出为空".into()))?
            .map_err(|err| EngineError::BuildFailed(format!("构建产物 JSON 解析失败: {err}")))?;

        if raw.modules.is_empty() {
            return Err(EngineError::BuildFailed("构建产物没有任何模块".into()));
        }
        let modules = raw
            .modules
            .iter()
            .enumerate()
            .map(|(index, module)| {
                general_purpose::STANDARD.decode(module).map_err(|err| {
                    EngineError::BuildFailed(format!("模块 #{index} 不是合法 base64: {err}"))
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;
        let dependencies = raw
            .dependencies
            .iter()
            .map(|dependency| {
                dependency.parse::<ObjectId>().map_err(|err| {
                    EngineError::BuildFailed(format!("依赖包 ID `{dependency}` 非法: {err}"))
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(Self {
            modules,
            dependencies,
            digest: raw.digest,
        })
    }
}

pub(crate) fn excerpt(text: &str) -> String {
    const LIMIT: usize = 512;
    let trimmed = text.trim();
    if trimmed.len() <= LIMIT {
        return trimmed.to_string();
    }
    let mut cut = trimmed.len() - LIMIT;
    while !trimmed.is_char_boundary(cut) {
        cut += 1;
    }
    format!("…{}", &trimmed[cut..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_build_output_after_banner() {
        let stdout = "UPDATING GIT DEPENDENCY https://github.com/MystenLabs/sui.git\n{\"modules\":[\"oRzrCwYAAAA=\",\"AQID\"],\"dependencies\":[\"0x1\",\"0x2\"],\"digest\":[7,8]}\n";
        let artifact = PublishArtifact::parse(stdout).unwrap();
        assert_eq!(artifact.modules.len(), 2);
        assert_eq!(artifact.modules[1], vec![1, 2, 3]);
        assert_eq!(
            artifact.dependencies,
            vec![ObjectId::from_low_u64(1), ObjectId::from_low_u64(2)]
        );
        assert_eq!(artifact.digest, vec![7, 8]);
    }

    #[test]
    fn rejects_malformed_output() {
        for stdout in [
            "",
            "error[E01002]: unexpected token",
            "{\"modules\":[]}",
            "{\"modules\":[\"***\"]}",
            "{\"modules\":[\"AQID\"],\"dependencies\":[\"zz\"]}",
            "{\"modules\":",
        ] {
            assert!(
                matches!(PublishArtifact::parse(stdout), Err(EngineError::BuildFailed(_))),
                "accepted {stdout:?}"
            );
        }
    }

    #[test]
    fn excerpt_keeps_the_tail() {
        let long = "x".repeat(600) + "tail";
        let cut = excerpt(&long);
        assert!(cut.ends_with("tail"));
        assert!(cut.chars().count() <= 513);
    }
}
