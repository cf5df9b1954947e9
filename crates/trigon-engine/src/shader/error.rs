use std::fmt;

use crate::gpu::ShaderStage;

/// Located driver error: the offending line plus its surrounding source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// 1-based source line named by the driver log.
    pub line: usize,
    /// 1-based column, when the driver reports one.
    pub column: Option<usize>,
    /// Line-numbered window of up to ±2 lines, offending line marked.
    pub window: String,
}

/// A shader stage failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub label: String,
    pub stage: ShaderStage,
    /// Raw driver info log.
    pub log: String,
    /// Full source with 1-based line numbers.
    pub annotated_source: String,
    /// `None` when the log has no parseable line reference.
    pub context: Option<ErrorContext>,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} shader `{}` failed to compile:", self.stage, self.label)?;
        writeln!(f, "{}", self.log.trim_end())?;
        if let Some(ctx) = &self.context {
            match ctx.column {
                Some(col) => writeln!(f, "--- error context (line {}, column {col}) ---", ctx.line)?,
                None => writeln!(f, "--- error context (line {}) ---", ctx.line)?,
            }
            writeln!(f, "{}", ctx.window)?;
        }
        writeln!(f, "--- {} source ---", self.stage)?;
        write!(f, "{}", self.annotated_source)
    }
}

impl std::error::Error for CompileError {}

/// A program failed to link. Both stage sources are carried line-numbered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkError {
    pub label: String,
    pub log: String,
    /// Debug rendering of the failed program object.
    pub program: String,
    pub vertex_source: String,
    pub fragment_source: String,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "program `{}` ({}) failed to link:", self.label, self.program)?;
        writeln!(f, "{}", self.log.trim_end())?;
        writeln!(f, "--- vertex source ---")?;
        writeln!(f, "{}", self.vertex_source)?;
        writeln!(f, "--- fragment source ---")?;
        write!(f, "{}", self.fragment_source)
    }
}

impl std::error::Error for LinkError {}

/// Any recoverable failure while building a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    Compile(CompileError),
    Link(LinkError),
    /// The device refused to create an object.
    Device(String),
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Compile(e) => e.fmt(f),
            ShaderError::Link(e) => e.fmt(f),
            ShaderError::Device(msg) => write!(f, "device error: {msg}"),
        }
    }
}

impl std::error::Error for ShaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShaderError::Compile(e) => Some(e),
            ShaderError::Link(e) => Some(e),
            ShaderError::Device(_) => None,
        }
    }
}

impl From<CompileError> for ShaderError {
    fn from(e: CompileError) -> Self {
        ShaderError::Compile(e)
    }
}

impl From<LinkError> for ShaderError {
    fn from(e: LinkError) -> Self {
        ShaderError::Link(e)
    }
}

/// Misuse of the registry API. These are programmer errors and are raised by
/// panicking (see [`violated`]); they never travel through `Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionViolation {
    DefaultSetMissing { set: String },
    DefaultSetAlreadyRegistered,
    DuplicateSet { set: String },
    MissingDefaultTechnique { technique: String },
    UnknownTechnique { set: String, technique: String },
    DefaultSetRemoval,
    NoSetsRegistered,
}

impl fmt::Display for PreconditionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("precondition violated: ")?;
        match self {
            Self::DefaultSetMissing { set } => write!(
                f,
                "shader set `{set}` registered before the default shader set"
            ),
            Self::DefaultSetAlreadyRegistered => {
                f.write_str("the default shader set is already registered")
            }
            Self::DuplicateSet { set } => write!(f, "shader set `{set}` is already registered"),
            Self::MissingDefaultTechnique { technique } => write!(
                f,
                "the default shader set must supply technique `{technique}`"
            ),
            Self::UnknownTechnique { set, technique } => write!(
                f,
                "shader set `{set}` supplies technique `{technique}` which the default set does not define"
            ),
            Self::DefaultSetRemoval => f.write_str("the default shader set cannot be removed"),
            Self::NoSetsRegistered => f.write_str("no shader sets are registered"),
        }
    }
}

impl std::error::Error for PreconditionViolation {}

/// Aborts on a contract violation.
#[track_caller]
pub(crate) fn violated(violation: PreconditionViolation) -> ! {
    log::error!("{violation}");
    panic!("{violation}");
}
