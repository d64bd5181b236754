use http::StatusCode;

/// Domain errors that know how they should surface over HTTP
///
/// Implemented by each crate's error type so a transport layer can render
/// any failure without matching on crate-specific variants.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type (e.g. `invalid_request_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;
}
