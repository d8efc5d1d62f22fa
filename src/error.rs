//! Contract-definition errors.
//!
//! These are distinct from match failures: a [`crate::result::MatchResult::Failure`]
//! says "this value/pattern does not fit", a [`ContractError`] says "the
//! contract itself cannot be used as written".

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractError {
    #[error("type {0} is not defined")]
    UnknownType(String),

    #[error("a rest operator ... can only be used in the last entry of an array (found at index {index})")]
    RestNotLast { index: usize },

    #[error("format error in example of \"{key}\": {message}")]
    InvalidExample { key: String, message: String },

    #[error("{0}")]
    Parse(String),

    #[error("type {0} cannot be generated: it contains itself with no way out")]
    EndlessRecursion(String),

    #[error("invalid stub record: {0}")]
    InvalidStub(String),

    #[error("invalid contract document: {0}")]
    Document(String),

    #[error("{breadcrumb} >> {source}")]
    Nested {
        breadcrumb: String,
        #[source]
        source: Box<ContractError>,
    },
}

impl ContractError {
    /// Nest this error under `breadcrumb` (outermost crumbs are added last).
    pub fn at(self, breadcrumb: impl Into<String>) -> Self {
        Self::Nested { breadcrumb: breadcrumb.into(), source: Box::new(self) }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Breadcrumb path from the outermost nesting inwards, rendered like a
    /// failure path (`[0].name`).
    pub fn path(&self) -> String {
        let mut crumbs = Vec::new();
        let mut current = self;
        while let Self::Nested { breadcrumb, source } = current {
            crumbs.push(breadcrumb.as_str());
            current = source;
        }
        crate::result::render_path(crumbs)
    }

    pub fn is_endless_recursion(&self) -> bool {
        matches!(self.root(), Self::EndlessRecursion(_))
    }

    /// The innermost, un-nested error.
    pub fn root(&self) -> &ContractError {
        match self {
            Self::Nested { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type ContractResult<T> = std::result::Result<T, ContractError>;
