use crate::language::errors::SyntaxErrors;
use crate::runtime::error::RuntimeError;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
}

pub fn emit_syntax_errors(path: &Path, source: &str, errors: &SyntaxErrors) {
    for err in &errors.errors {
        let diagnostic = SyntaxDiagnostic {
            src: NamedSource::new(path.display().to_string(), source.to_string()),
            span: err.span.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
        };
        eprintln!("{:?}", Report::new(diagnostic));
    }
}

pub fn report_runtime_error(error: &RuntimeError) {
    eprintln!("Runtime error: {}", error);
}

pub fn report_io_error(path: &Path, error: &std::io::Error) {
    eprintln!("Failed to access {}: {}", path.display(), error);
}
