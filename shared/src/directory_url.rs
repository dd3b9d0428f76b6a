use thiserror::Error;
use url::Url;

/// Reasons a directory service URL is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryUrlError {
    #[error("Directory URL `{url}` is invalid: {message}")]
    Invalid { url: String, message: String },

    #[error("Directory URL `{url}` must use http or https")]
    UnsupportedScheme { url: String },
}

/// Validates the URL of a directory service. Registration and listing both
/// speak plain HTTP(S).
pub fn parse_directory_url(url: &str) -> Result<Url, DirectoryUrlError> {
    let parsed = Url::parse(url).map_err(|error| DirectoryUrlError::Invalid {
        url: url.to_string(),
        message: error.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(DirectoryUrlError::UnsupportedScheme {
            url: url.to_string(),
        }),
    }
}
