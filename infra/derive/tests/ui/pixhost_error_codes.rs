use pixhost_derive::pixhost_error;
use std::borrow::Cow;

#[pixhost_error]
pub enum UploadError {
    #[error("Unsupported type: {message}")]
    UnsupportedType { message: Cow<'static, str> },

    #[error("Too large{}: {message}", format_context(.context))]
    SizeLimit { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Storage I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },
}

fn main() {
    let unsupported = UploadError::UnsupportedType { message: "exe".into() };
    assert_eq!(unsupported.code(), "unsupported_type");

    let limit = UploadError::SizeLimit { message: "11 MiB".into(), context: None };
    assert_eq!(limit.code(), "size_limit");

    let io: UploadError = std::io::Error::other("disk full").into();
    assert_eq!(io.code(), "io");
}
