use std::borrow::Cow;

/// Every failure the media store can report.
///
/// [`StorageError::code`] yields a stable identifier per variant
/// (`unsupported_type`, `size_limit`, `containment`, `not_found`, `conflict`,
/// `io`, `bad_archive`, `internal`) for mapping onto transport statuses.
#[pixhost_derive::pixhost_error]
pub enum StorageError {
    #[error("Unsupported file type{}: {message}", format_context(.context))]
    UnsupportedType { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("File size limit exceeded{}: {message}", format_context(.context))]
    SizeLimit { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Path containment violation{}: {message}", format_context(.context))]
    Containment { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Object not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Destination already exists{}: {message}", format_context(.context))]
    Conflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Storage I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Invalid archive{}: {message}", format_context(.context))]
    BadArchive { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal storage error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl StorageError {
    pub(crate) fn not_found(what: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound { message: what.into(), context: None }
    }

    pub(crate) fn containment(
        what: impl Into<Cow<'static, str>>,
        reason: &'static str,
    ) -> Self {
        Self::Containment { message: what.into(), context: Some(reason.into()) }
    }

    pub(crate) fn bad_archive(message: impl Into<Cow<'static, str>>) -> Self {
        Self::BadArchive { message: message.into(), context: None }
    }

    /// `true` for failures detected before any filesystem mutation.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::UnsupportedType { .. } | Self::SizeLimit { .. } | Self::Containment { .. })
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal {
            message: err.to_string().into(),
            context: Some("Blocking storage task failed".into()),
        }
    }
}
