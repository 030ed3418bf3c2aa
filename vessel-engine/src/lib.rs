pub mod chains;
pub mod classifier;
pub mod command;
pub mod events;
pub mod host;
pub mod handles;
pub mod predicates;
pub mod scene;
pub mod segments;

pub mod errors {
    use thiserror::Error;

    use crate::classifier::{AmbiguityReason, RoleSlot, SegmentFamily};
    use crate::segments::EndCapAlignment;

    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum EngineError {
        #[error("document is not initialized")]
        DocumentNotInitialized,
        #[error("component {component} has {found} constraints, at least 3 are required")]
        InsufficientConstraints { component: String, found: usize },
        #[error("component {component} is missing constraint roles {missing:?}")]
        IncompleteClassification {
            component: String,
            missing: Vec<RoleSlot>,
        },
        #[error("constraint {constraint} is ambiguous: {reason}")]
        AmbiguousConstraint {
            constraint: String,
            reason: AmbiguityReason,
        },
        #[error("entity {0} not found")]
        EntityNotFound(String),
        #[error("feature {0} not found")]
        FeatureNotFound(String),
        #[error("template {0} is not available")]
        TemplateMissing(String),
        #[error("failed to build segment {0}")]
        SynthesisFailed(String),
        #[error("{family} chain needs at least {required} components, found {found}")]
        ChainTooShort {
            family: SegmentFamily,
            required: usize,
            found: usize,
        },
        #[error("end cap {component} reports {found:?} alignment, expected {expected:?}")]
        UnexpectedAlignment {
            component: String,
            expected: EndCapAlignment,
            found: Option<EndCapAlignment>,
        },
    }
}

pub mod warnings {
    use tracing::{error, info, warn};

    /// 分级收集提示、警告与错误，不中断调用方。每条消息同时写入 `tracing`。
    #[derive(Debug, Clone, Default)]
    pub struct WarningService {
        infos: Vec<String>,
        warnings: Vec<String>,
        errors: Vec<String>,
    }

    impl WarningService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_info(&mut self, message: impl Into<String>) {
            let message = message.into();
            info!(%message, "提示");
            self.infos.push(message);
        }

        pub fn add_warning(&mut self, message: impl Into<String>) {
            let message = message.into();
            warn!(%message, "操作警告");
            self.warnings.push(message);
        }

        pub fn add_error(&mut self, message: impl Into<String>) {
            let message = message.into();
            error!(%message, "操作错误");
            self.errors.push(message);
        }

        #[inline]
        pub fn has_errors(&self) -> bool {
            !self.errors.is_empty()
        }

        #[inline]
        pub fn is_error_free(&self) -> bool {
            self.errors.is_empty()
        }

        #[inline]
        pub fn infos(&self) -> &[String] {
            &self.infos
        }

        #[inline]
        pub fn warnings(&self) -> &[String] {
            &self.warnings
        }

        #[inline]
        pub fn errors(&self) -> &[String] {
            &self.errors
        }

        pub fn last_error(&self) -> Option<&str> {
            self.errors.last().map(String::as_str)
        }

        pub fn clear(&mut self) {
            self.infos.clear();
            self.warnings.clear();
            self.errors.clear();
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn severities_are_kept_apart() {
            let mut service = WarningService::new();
            service.add_info("已是首段");
            service.add_warning("翻转失败");
            assert!(service.is_error_free());

            service.add_error("模板缺失");
            assert!(service.has_errors());
            assert_eq!(service.infos(), ["已是首段"]);
            assert_eq!(service.warnings(), ["翻转失败"]);
            assert_eq!(service.last_error(), Some("模板缺失"));

            service.clear();
            assert!(service.is_error_free());
            assert!(service.warnings().is_empty());
        }
    }
}
