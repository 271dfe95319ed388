use pixhost_derive::pixhost_error;
use std::borrow::Cow;

#[pixhost_error]
pub enum ArchiveError {
    #[error("I/O error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn open() -> Result<Vec<u8>, ArchiveError> {
    std::fs::read("/definitely/missing/archive.zip").context("Opening snapshot")
}

fn main() {
    let err = open().unwrap_err();
    assert!(err.to_string().contains("(Opening snapshot)"));

    let internal: ArchiveError = "worker vanished".into();
    assert_eq!(internal.code(), "internal");
}
