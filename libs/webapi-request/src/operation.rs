use std::fmt;

/// Public operation a request is composed for.
///
/// The operation decides which descriptor fields are mandatory and switches on
/// the retrieve-only `$select` path shortcuts. Its name is embedded in every
/// [`ComposeError`](crate::ComposeError).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Operation {
    Create,
    Update,
    UpdateSingleProperty,
    Upsert,
    Delete,
    Retrieve,
    RetrieveMultiple,
    RetrieveAll,
    Count,
    CountAll,
    Fetch,
    FetchAll,
    Associate,
    Disassociate,
    CallFunction,
    ExecuteAction,
}

impl Operation {
    /// Wire name used in error messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::UpdateSingleProperty => "updateSingleProperty",
            Self::Upsert => "upsert",
            Self::Delete => "deleteRecord",
            Self::Retrieve => "retrieve",
            Self::RetrieveMultiple => "retrieveMultiple",
            Self::RetrieveAll => "retrieveAll",
            Self::Count => "count",
            Self::CountAll => "countAll",
            Self::Fetch => "fetch",
            Self::FetchAll => "fetchAll",
            Self::Associate => "associate",
            Self::Disassociate => "disassociate",
            Self::CallFunction => "callFunction",
            Self::ExecuteAction => "executeAction",
        }
    }

    /// Whether the operation addresses a single record and therefore needs
    /// `key` or `id`.
    #[must_use]
    pub const fn requires_key(self) -> bool {
        matches!(
            self,
            Self::Update
                | Self::UpdateSingleProperty
                | Self::Upsert
                | Self::Delete
                | Self::Associate
                | Self::Disassociate
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composition scope: the operation plus whether we are inside an `$expand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    operation: Operation,
    nested: bool,
}

impl Scope {
    /// Scope of a top-level descriptor.
    #[must_use]
    pub const fn top(operation: Operation) -> Self {
        Self {
            operation,
            nested: false,
        }
    }

    /// Scope of an `$expand` entry below this one.
    #[must_use]
    pub const fn expand(self) -> Self {
        Self {
            operation: self.operation,
            nested: true,
        }
    }

    /// Retrieve shortcuts only apply to the top-level descriptor.
    #[must_use]
    pub fn is_retrieve(self) -> bool {
        !self.nested && self.operation == Operation::Retrieve
    }

    #[must_use]
    pub const fn operation(self) -> Operation {
        self.operation
    }

    /// Operation name as reported in errors, e.g. `retrieve $expand`.
    #[must_use]
    pub fn label(self) -> String {
        if self.nested {
            format!("{} $expand", self.operation)
        } else {
            self.operation.as_str().to_owned()
        }
    }
}
