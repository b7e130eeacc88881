pub mod classify;
pub mod convert;
pub mod pipeline;
pub mod pose;
pub mod reconcile;
pub mod recompute;
pub mod run_log;

pub mod errors {
    use std::path::PathBuf;

    use svgsketch_core::document::DocumentError;
    use svgsketch_io::IoError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum PipelineError {
        #[error("invalid arguments: {0}")]
        Argument(String),
        #[error("cannot parse \"{input}\": {reason}")]
        Parse { input: String, reason: String },
        #[error("import of {path:?} created no objects")]
        ImportFailure { path: PathBuf },
        #[error("failed to open or save the target document")]
        Persistence(#[source] IoError),
        #[error("failed to import the vector drawing")]
        Import(#[source] IoError),
        #[error("document operation failed")]
        Document(#[from] DocumentError),
    }

    impl PipelineError {
        pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
            Self::Parse {
                input: input.into(),
                reason: reason.into(),
            }
        }

        /// 进程退出码，与错误类别一一对应。
        pub fn exit_code(&self) -> i32 {
            match self {
                PipelineError::Argument(_) => 2,
                PipelineError::Parse { .. } => 3,
                PipelineError::ImportFailure { .. } => 4,
                PipelineError::Persistence(_) => 5,
                PipelineError::Import(_) | PipelineError::Document(_) => 1,
            }
        }
    }

    impl From<IoError> for PipelineError {
        /// 尺寸属性错误归入解析错误，其余读取错误归入导入错误。
        fn from(err: IoError) -> Self {
            match err {
                IoError::MissingDimension { attribute } => {
                    PipelineError::parse(attribute, "attribute is missing on the root element")
                }
                IoError::InvalidDimension { attribute, raw } => PipelineError::parse(
                    raw,
                    format!("`{attribute}` is not a number with a supported unit (mm, cm, in)"),
                ),
                other => PipelineError::Import(other),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn dimension_errors_become_parse_errors() {
            let err: PipelineError = IoError::InvalidDimension {
                attribute: "height",
                raw: "abc".to_string(),
            }
            .into();
            assert!(matches!(&err, PipelineError::Parse { input, .. } if input == "abc"));
            assert_eq!(err.exit_code(), 3);

            let err: PipelineError = IoError::InvalidMarkup("eof".to_string()).into();
            assert!(matches!(err, PipelineError::Import(_)));
            assert_eq!(err.exit_code(), 1);
        }

        #[test]
        fn exit_codes_follow_error_kind() {
            assert_eq!(PipelineError::Argument("x".into()).exit_code(), 2);
            assert_eq!(
                PipelineError::ImportFailure {
                    path: PathBuf::from("a.svg")
                }
                .exit_code(),
                4
            );
            assert_eq!(
                PipelineError::Persistence(IoError::InvalidDocument("x".into())).exit_code(),
                5
            );
        }
    }
}
