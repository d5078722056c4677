use miette::Diagnostic;
use thiserror::Error;
use zero_ast::Span;

#[derive(Debug, Clone, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum VerifyError {
    /// Fatal to one function; siblings are still verified.
    #[error("configuration error in `{function}`: {message}")]
    #[diagnostic(code(zero::verify::configuration))]
    Configuration {
        function: String,
        message: String,
        #[label("here")]
        span: Span,
    },

    /// Fatal to one path.
    #[error("unsupported {construct}")]
    #[diagnostic(code(zero::verify::unsupported))]
    UnsupportedConstruct {
        construct: String,
        #[label]
        span: Span,
    },

    /// Fatal to the whole run.
    #[error("cannot resolve type of `{name}`: {message}")]
    #[diagnostic(code(zero::verify::type_resolution))]
    TypeResolution {
        name: String,
        message: String,
        #[label]
        span: Span,
    },

    #[error("solver error: {message}")]
    #[diagnostic(code(zero::verify::solver))]
    Solver { message: String },
}

impl VerifyError {
    pub fn configuration(function: &str, span: Span, message: impl Into<String>) -> Self {
        VerifyError::Configuration {
            function: function.to_string(),
            message: message.into(),
            span,
        }
    }

    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        VerifyError::UnsupportedConstruct {
            construct: construct.into(),
            span,
        }
    }

    pub fn type_resolution(name: impl Into<String>, message: impl Into<String>) -> Self {
        VerifyError::TypeResolution {
            name: name.into(),
            message: message.into(),
            span: zero_ast::span(0, 0),
        }
    }

    /// Attach the declaration a type-resolution failure was reached from.
    pub fn at_declaration(self, name: &str, decl_span: Span) -> Self {
        match self {
            VerifyError::TypeResolution { message, .. } => VerifyError::TypeResolution {
                name: name.to_string(),
                message,
                span: decl_span,
            },
            other => other,
        }
    }
}
