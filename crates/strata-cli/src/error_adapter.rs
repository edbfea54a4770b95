//! Error adapter for converting StrataError to miette diagnostics.
//!
//! This module provides the bridge between the library's standard error types
//! and miette's rich diagnostic formatting used in the CLI.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan};

use strata::StrataError;

/// Adapter rendering a [`StrataError`] through miette.
///
/// Layout failures carry the engine version and, for failures that cannot be
/// caused by the input, a hint to report the diagram.
pub struct ErrorAdapter<'a>(pub &'a StrataError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(self.0)
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            StrataError::Io(_) => "strata::io",
            StrataError::Render { .. } => "strata::render",
            StrataError::Config(_) => "strata::config",
            StrataError::Export(_) => "strata::export",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let StrataError::Render {
            err,
            engine_version,
            ..
        } = &self.0
        else {
            return None;
        };

        let version = engine_version.as_deref().unwrap_or("unknown");
        let mut help = format!("Graphviz version: {version}");
        if err.is_invariant_violation() {
            help.push_str(
                "\nThe engine response could not be read back. \
                 Check that a supported Graphviz version is installed.",
            );
        }
        Some(Box::new(help))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        None
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use strata::LayoutError;

    use super::*;

    fn help_of(err: &StrataError) -> Option<String> {
        ErrorAdapter(err).help().map(|help| help.to_string())
    }

    #[test]
    fn test_codes() {
        let io = StrataError::Io(std::io::Error::other("disk"));
        let config = StrataError::Config("bad".to_string());
        let render = StrataError::new_render_error(LayoutError::EmptyResponse, "src", None);

        let code = |err: &StrataError| ErrorAdapter(err).code().map(|c| c.to_string());
        assert_eq!(code(&io).as_deref(), Some("strata::io"));
        assert_eq!(code(&config).as_deref(), Some("strata::config"));
        assert_eq!(code(&render).as_deref(), Some("strata::render"));
    }

    #[test]
    fn test_render_help_names_version() {
        let err = StrataError::new_render_error(
            LayoutError::EmptyResponse,
            "src",
            Some("2.43.0".to_string()),
        );

        let help = help_of(&err).unwrap();
        assert_eq!(help, "Graphviz version: 2.43.0");
    }

    #[test]
    fn test_invariant_violation_help() {
        let err = StrataError::new_render_error(LayoutError::MissingHeader, "src", None);

        let help = help_of(&err).unwrap();
        assert!(help.starts_with("Graphviz version: unknown\n"));
        assert!(help.contains("supported Graphviz version"));
    }

    #[test]
    fn test_non_render_errors_have_no_help() {
        let err = StrataError::Config("bad".to_string());
        assert!(help_of(&err).is_none());
        assert_eq!(ErrorAdapter(&err).to_string(), "Configuration error: bad");
    }
}
