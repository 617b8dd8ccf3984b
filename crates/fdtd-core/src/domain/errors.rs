use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure classes, each with its own process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FdtdErrorCategory {
    /// Bad file names, configurations, policies or command lines.
    InputValidation,
    /// The filesystem or the solver process could not be used.
    IoSystem,
    /// Inputs were readable but their content is unusable.
    Computation,
    /// The adapter was driven through an impossible state.
    Internal,
}

impl FdtdErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidation => 2,
            Self::IoSystem => 3,
            Self::Computation => 4,
            Self::Internal => 5,
        }
    }

    /// Leading segment shared by every diagnostic code of this category.
    pub const fn code_prefix(self) -> &'static str {
        match self {
            Self::InputValidation => "INPUT",
            Self::IoSystem => "IO",
            Self::Computation => "RUN",
            Self::Internal => "SYS",
        }
    }
}

/// Crate-wide error carried to the CLI boundary.
///
/// Module errors ([`FormatError`](crate::probes::FormatError),
/// [`ParseError`](crate::probes::ParseError),
/// [`ProcessError`](crate::solver::ProcessError), ...) convert into this type
/// so that every failure renders the same diagnostic line and exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdtdError {
    category: FdtdErrorCategory,
    code: &'static str,
    message: String,
}

impl FdtdError {
    fn new(category: FdtdErrorCategory, code: &'static str, message: impl Into<String>) -> Self {
        debug_assert!(
            code.starts_with(category.code_prefix()),
            "diagnostic code {code} does not belong to {category:?}"
        );
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn input_validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(FdtdErrorCategory::InputValidation, code, message)
    }

    pub fn io_system(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(FdtdErrorCategory::IoSystem, code, message)
    }

    pub fn computation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(FdtdErrorCategory::Computation, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(FdtdErrorCategory::Internal, code, message)
    }

    pub const fn category(&self) -> FdtdErrorCategory {
        self.category
    }

    /// Dotted diagnostic code, e.g. `INPUT.PROBE_FILENAME`.
    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.code, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

impl Display for FdtdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for FdtdError {}
