use pixhost_derive::pixhost_error;

#[pixhost_error]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

fn main() {}
