use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::crypto::TransactionSigner;
use crate::engine::submission::{GasSettings, fill_gas, submit};
use crate::engine::{EngineError, EngineResult, TransactionBuilder};
use crate::monitoring::events;
use crate::rpc::ChainClient;
use crate::wallet::ResolvedIdentity;

use super::artifact::PublishArtifact;
use super::process::ToolchainSettings;
use super::types::{PublishOutcome, PublishTracker};

const WORKDIR_PREFIX: &str = "kepler-publish-";

/// 构建并发布 Move 合约包。每次发布独占一个临时工作目录，任何退出路径都会删除。
pub struct PackagePublisher {
    toolchain: ToolchainSettings,
    chain: Arc<dyn ChainClient>,
    gas: GasSettings,
}

impl PackagePublisher {
    pub fn new(toolchain: ToolchainSettings, chain: Arc<dyn ChainClient>, gas: GasSettings) -> Self {
        Self {
            toolchain,
            chain,
            gas,
        }
    }

    pub fn toolchain(&self) -> &ToolchainSettings {
        &self.toolchain
    }

    /// 相对路径按调用方当前目录解析，构建工具拿到的始终是绝对路径。
    pub async fn publish(
        &self,
        package: &Path,
        signer: &ResolvedIdentity,
    ) -> EngineResult<PublishOutcome> {
        let package = std::path::absolute(package)?;
        let mut tracker = PublishTracker::new(&package);
        let result = self.run(&package, signer, &mut tracker).await;
        match &result {
            Ok(outcome) => {
                tracker.advance();
                info!(
                    target: "publish",
                    package_id = %outcome.package_id,
                    digest = %outcome.digest,
                    "合约包发布成功"
                );
            }
            Err(err) => {
                tracker.fail(err.to_string());
            }
        }
        result
    }

    async fn run(
        &self,
        package: &Path,
        signer: &ResolvedIdentity,
        tracker: &mut PublishTracker,
    ) -> EngineResult<PublishOutcome> {
        tracker.advance();
        validate_package(package)?;
        let workdir = self.create_workdir()?;

        tracker.advance();
        let artifact = self.build_in(package, &workdir).await?;

        tracker.advance();
        let mut builder = TransactionBuilder::new();
        let upgrade_cap = builder.publish(artifact.modules, artifact.dependencies)?;
        builder.transfer_objects(vec![upgrade_cap], signer.address)?;
        fill_gas(self.chain.as_ref(), &mut builder, signer.address, &self.gas).await?;
        let tx_bytes = builder.finalize()?;
        let signature = signer.keypair.sign(&tx_bytes);
        let response = submit(self.chain.as_ref(), signer.address, tx_bytes, vec![signature]).await?;

        let package_id = response.published_package().ok_or_else(|| {
            EngineError::PublishResultMalformed(format!(
                "交易 {} 的对象变更中没有 published 记录",
                response.digest
            ))
        })?;
        let upgrade_cap = response.created_of_type("::package::UpgradeCap");
        drop(workdir);

        Ok(PublishOutcome {
            package_id,
            upgrade_cap,
            digest: response.digest,
            effects: response.effects,
        })
    }

    fn create_workdir(&self) -> EngineResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKDIR_PREFIX);
        let workdir = match &self.toolchain.work_root {
            Some(root) => builder.tempdir_in(std::path::absolute(root)?)?,
            None => builder.tempdir()?,
        };
        debug!(target: "publish", workdir = %workdir.path().display(), "created build workdir");
        Ok(workdir)
    }

    async fn build_in(&self, package: &Path, workdir: &TempDir) -> EngineResult<PublishArtifact> {
        let label = package.display().to_string();
        let output = match self.toolchain.run_build(package, workdir.path()).await {
            Ok(output) => output,
            Err(err) => {
                events::build_finished(&label, 0, Default::default(), false);
                return Err(err);
            }
        };
        if !output.stderr.trim().is_empty() {
            debug!(target: "publish", stderr = %output.stderr.trim(), "build toolchain stderr");
        }
        let artifact = PublishArtifact::parse(&output.stdout);
        events::build_finished(
            &label,
            artifact.as_ref().map_or(0, |artifact| artifact.modules.len()),
            output.elapsed,
            artifact.is_ok(),
        );
        artifact
    }
}

fn validate_package(package: &Path) -> EngineResult<()> {
    if package.is_dir() {
        Ok(())
    } else {
        Err(EngineError::PackageNotFound(package.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SuiKeyPair;
    use crate::rpc::InMemoryLedger;
    use crate::types::SuiAddress;

    const ARTIFACT_JSON: &str =
        r#"{"modules":["oRzrCwYAAAA="],"dependencies":["0x1","0x2"],"digest":[1,2,3]}"#;

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        signer: ResolvedIdentity,
        work_root: TempDir,
        package: TempDir,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::default());
        let signer = ResolvedIdentity::from(SuiKeyPair::generate());
        ledger.mint_sui(signer.address, 1_000_000_000);
        Fixture {
            ledger,
            signer,
            work_root: tempfile::tempdir().unwrap(),
            package: tempfile::tempdir().unwrap(),
        }
    }

    fn publisher(fixture: &Fixture, binary: &str, build_args: Vec<String>) -> PackagePublisher {
        PackagePublisher::new(
            ToolchainSettings {
                binary: binary.into(),
                build_args,
                work_root: Some(fixture.work_root.path().to_path_buf()),
                ..ToolchainSettings::default()
            },
            fixture.ledger.clone(),
            GasSettings::default(),
        )
    }

    fn work_root_entries(fixture: &Fixture) -> usize {
        std::fs::read_dir(fixture.work_root.path()).unwrap().count()
    }

    #[tokio::test]
    async fn missing_package_creates_no_workdir() {
        let fixture = fixture();
        let publisher = publisher(&fixture, "sh", vec!["-c".into(), "exit 0".into()]);
        let missing = fixture.package.path().join("does-not-exist");
        let err = publisher.publish(&missing, &fixture.signer).await.unwrap_err();
        assert!(matches!(err, EngineError::PackageNotFound(path) if path == missing));
        assert_eq!(work_root_entries(&fixture), 0);
        assert_eq!(fixture.ledger.submission_count(), 0);
    }

    #[tokio::test]
    async fn build_failure_cleans_workdir_and_skips_network() {
        let fixture = fixture();
        let publisher = publisher(&fixture, "false", Vec::new());
        let err = publisher
            .publish(fixture.package.path(), &fixture.signer)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BuildFailed(_)));
        assert_eq!(work_root_entries(&fixture), 0);
        assert_eq!(fixture.ledger.submission_count(), 0);
    }

    #[tokio::test]
    async fn malformed_build_output_is_build_failure() {
        let fixture = fixture();
        let publisher = publisher(
            &fixture,
            "sh",
            vec!["-c".into(), "echo 'BUILDING counter'".into()],
        );
        let err = publisher
            .publish(fixture.package.path(), &fixture.signer)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BuildFailed(_)));
        assert_eq!(work_root_entries(&fixture), 0);
    }

    #[tokio::test]
    async fn publishes_and_reports_package() {
        let fixture = fixture();
        let artifact_path = fixture.package.path().join("artifact.json");
        std::fs::write(&artifact_path, ARTIFACT_JSON).unwrap();
        let publisher = publisher(
            &fixture,
            "sh",
            vec![
                "-c".into(),
                "test -d \"$4\" && cat \"$0\"".into(),
                artifact_path.display().to_string(),
            ],
        );

        let outcome = publisher
            .publish(fixture.package.path(), &fixture.signer)
            .await
            .unwrap();
        assert!(!outcome.package_id.is_zero());
        let cap = outcome.upgrade_cap.expect("upgrade cap");
        assert_eq!(
            fixture.ledger.owner_of(&cap).and_then(|owner| owner.address()),
            Some(fixture.signer.address)
        );
        assert_eq!(work_root_entries(&fixture), 0);
        assert_eq!(fixture.ledger.submission_count(), 1);
    }

    #[tokio::test]
    async fn relative_package_path_reaches_toolchain() {
        let fixture = fixture();
        let package = tempfile::Builder::new()
            .prefix("kepler-relative-")
            .tempdir_in(".")
            .unwrap();
        let relative = Path::new(package.path().file_name().unwrap());
        assert!(relative.is_relative());
        let artifact_path = fixture.package.path().join("artifact.json");
        std::fs::write(&artifact_path, ARTIFACT_JSON).unwrap();
        let publisher = publisher(
            &fixture,
            "sh",
            vec![
                "-c".into(),
                "test -d \"$2\" && cat \"$0\"".into(),
                artifact_path.display().to_string(),
            ],
        );

        let outcome = publisher.publish(relative, &fixture.signer).await.unwrap();
        assert!(!outcome.package_id.is_zero());
        assert_eq!(work_root_entries(&fixture), 0);
        assert_eq!(fixture.ledger.submission_count(), 1);
    }

    #[tokio::test]
    async fn rejected_submission_still_cleans_workdir() {
        let fixture = fixture();
        let artifact_path = fixture.package.path().join("artifact.json");
        std::fs::write(&artifact_path, ARTIFACT_JSON).unwrap();
        let publisher = publisher(
            &fixture,
            "sh",
            vec!["-c".into(), "cat \"$0\"".into(), artifact_path.display().to_string()],
        );
        let broke = ResolvedIdentity::from(SuiKeyPair::generate());
        assert_ne!(broke.address, SuiAddress::ZERO);

        let err = publisher
            .publish(fixture.package.path(), &broke)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance { .. }));
        assert_eq!(work_root_entries(&fixture), 0);
    }
}
