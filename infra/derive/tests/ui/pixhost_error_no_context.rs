use pixhost_derive::pixhost_error;

#[pixhost_error]
pub enum StoreError {
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

fn main() {}
