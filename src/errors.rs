use std::fmt;

use anyhow::Error;
use serde::Serialize;
use serde_json::Value;

/// How a coded error propagates through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodedErrorKind {
    /// Absorbed by the fallback path; never surfaced to the caller.
    Recoverable,
    /// Internal contract breach; surfaced immediately.
    Fatal,
    /// External-step failure; surfaced with diagnostic context.
    External,
    /// Caller misuse (bad arguments, unreadable input file).
    Usage,
}

pub const SCHEMA_VIOLATION: &str = "SCHEMA_VIOLATION";
pub const UNSAFE_CONTENT: &str = "UNSAFE_CONTENT";
pub const ENHANCER_UNAVAILABLE: &str = "ENHANCER_UNAVAILABLE";
pub const CODEGEN_INCONSISTENCY: &str = "CODEGEN_INCONSISTENCY";
pub const RENDER_FAILURE: &str = "RENDER_FAILURE";
pub const ARTIFACT_NOT_FOUND: &str = "ARTIFACT_NOT_FOUND";
pub const USAGE: &str = "USAGE";

#[derive(Debug, Clone)]
pub struct CodedError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub kind: CodedErrorKind,
}

impl CodedError {
    fn new(code: &'static str, kind: CodedErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind,
        }
    }

    pub fn schema_violation(message: impl Into<String>) -> Self {
        Self::new(SCHEMA_VIOLATION, CodedErrorKind::Recoverable, message)
    }

    pub fn unsafe_content(message: impl Into<String>) -> Self {
        Self::new(UNSAFE_CONTENT, CodedErrorKind::Recoverable, message)
    }

    pub fn enhancer_unavailable(message: impl Into<String>) -> Self {
        Self::new(ENHANCER_UNAVAILABLE, CodedErrorKind::Recoverable, message)
    }

    pub fn codegen_inconsistency(message: impl Into<String>) -> Self {
        Self::new(CODEGEN_INCONSISTENCY, CodedErrorKind::Fatal, message)
    }

    pub fn render_failure(message: impl Into<String>) -> Self {
        Self::new(RENDER_FAILURE, CodedErrorKind::External, message)
    }

    pub fn artifact_not_found(message: impl Into<String>) -> Self {
        Self::new(ARTIFACT_NOT_FOUND, CodedErrorKind::External, message)
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, CodedErrorKind::Usage, message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// True when the orchestrator may absorb this error by falling back.
    pub fn is_recoverable(&self) -> bool {
        self.kind == CodedErrorKind::Recoverable
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: self.code.to_owned(),
                message: self.message.clone(),
                details: self.details.clone(),
            },
        }
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CodedError {}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub fn find_coded_error(error: &Error) -> Option<&CodedError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CodedError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn coded_error_survives_context_wrapping() {
        let error: Error = Error::new(CodedError::render_failure("manim exited with status 1"))
            .context("while rendering scene Demo");
        let coded = find_coded_error(&error).expect("coded error should be found");
        assert_eq!(coded.code, RENDER_FAILURE);
        assert_eq!(coded.kind, CodedErrorKind::External);
    }

    #[test]
    fn envelope_serializes_without_empty_details() {
        let envelope = CodedError::schema_violation("bad plan").envelope();
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"code\":\"SCHEMA_VIOLATION\""));
        assert!(!json.contains("details"));
    }

    #[test]
    fn recoverable_codes_are_absorbed() {
        assert!(CodedError::schema_violation("x").is_recoverable());
        assert!(CodedError::unsafe_content("x").is_recoverable());
        assert!(CodedError::enhancer_unavailable("x").is_recoverable());
        assert!(!CodedError::codegen_inconsistency("x").is_recoverable());
        assert!(!CodedError::render_failure("x").is_recoverable());
    }
}
