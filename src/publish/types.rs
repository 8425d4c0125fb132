use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::monitoring::events;
use crate::rpc::TransactionEffects;
use crate::types::ObjectId;

/// 发布流程状态机。`Done` 与 `Failed` 为终态。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishStage {
    Idle,
    Validating,
    Building,
    Submitting,
    Done,
    Failed(String),
}

impl PublishStage {
    pub fn name(&self) -> &'static str {
        match self {
            PublishStage::Idle => "idle",
            PublishStage::Validating => "validating",
            PublishStage::Building => "building",
            PublishStage::Submitting => "submitting",
            PublishStage::Done => "done",
            PublishStage::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishStage::Done | PublishStage::Failed(_))
    }

    fn successor(&self) -> Option<PublishStage> {
        match self {
            PublishStage::Idle => Some(PublishStage::Validating),
            PublishStage::Validating => Some(PublishStage::Building),
            PublishStage::Building => Some(PublishStage::Submitting),
            PublishStage::Submitting => Some(PublishStage::Done),
            PublishStage::Done | PublishStage::Failed(_) => None,
        }
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishStage::Failed(reason) => write!(f, "failed({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// 记录一次发布的阶段切换，非法切换直接忽略并告警。
#[derive(Debug)]
pub struct PublishTracker {
    package: PathBuf,
    stage: PublishStage,
    history: Vec<&'static str>,
}

impl PublishTracker {
    pub fn new(package: &Path) -> Self {
        Self {
            package: package.to_path_buf(),
            stage: PublishStage::Idle,
            history: vec![PublishStage::Idle.name()],
        }
    }

    pub fn stage(&self) -> &PublishStage {
        &self.stage
    }

    pub fn history(&self) -> &[&'static str] {
        &self.history
    }

    /// 前进到下一个阶段。
    pub fn advance(&mut self) -> &PublishStage {
        match self.stage.successor() {
            Some(next) => self.transition(next),
            None => warn!(
                target: "publish",
                package = %self.package.display(),
                stage = %self.stage,
                "发布流程已结束，忽略阶段切换"
            ),
        }
        &self.stage
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> &PublishStage {
        if self.stage.is_terminal() {
            warn!(
                target: "publish",
                package = %self.package.display(),
                stage = %self.stage,
                "发布流程已结束，忽略失败切换"
            );
        } else {
            self.transition(PublishStage::Failed(reason.into()));
        }
        &self.stage
    }

    fn transition(&mut self, next: PublishStage) {
        let from = self.stage.name();
        let to = next.name();
        match &next {
            PublishStage::Failed(reason) => warn!(
                target: "publish",
                package = %self.package.display(),
                from,
                to,
                reason = %reason,
                "发布阶段切换"
            ),
            _ => info!(
                target: "publish",
                package = %self.package.display(),
                from,
                to,
                "发布阶段切换"
            ),
        }
        events::publish_stage(from, to);
        self.history.push(to);
        self.stage = next;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishOutcome {
    pub package_id: ObjectId,
    pub upgrade_cap: Option<ObjectId>,
    pub digest: String,
    pub effects: Option<TransactionEffects>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_the_happy_path() {
        let mut tracker = PublishTracker::new(Path::new("/tmp/pkg"));
        for expected in ["validating", "building", "submitting", "done"] {
            assert_eq!(tracker.advance().name(), expected);
        }
        assert!(tracker.stage().is_terminal());
        assert_eq!(tracker.advance(), &PublishStage::Done);
        assert_eq!(tracker.fail("late"), &PublishStage::Done);
        assert_eq!(
            tracker.history(),
            ["idle", "validating", "building", "submitting", "done"]
        );
    }

    #[test]
    fn fails_from_any_open_stage() {
        let mut tracker = PublishTracker::new(Path::new("/tmp/pkg"));
        tracker.advance();
        tracker.advance();
        let stage = tracker.fail("exit status 1").clone();
        assert_eq!(stage, PublishStage::Failed("exit status 1".into()));
        assert_eq!(stage.to_string(), "failed(exit status 1)");
        assert_eq!(tracker.advance().name(), "failed");
    }
}
