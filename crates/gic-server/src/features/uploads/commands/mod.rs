pub mod authorize;

pub use authorize::{AuthorizeUploadCommand, AuthorizeUploadError, AuthorizeUploadResponse};
