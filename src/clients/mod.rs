#[cfg(feature = "anthropic")]
pub mod claude;
#[cfg(feature = "deepseek")]
pub mod deepseek;
pub mod flexible;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod mock;

#[cfg(feature = "anthropic")]
pub use claude::*;
#[cfg(feature = "deepseek")]
pub use deepseek::*;
pub use flexible::*;
#[cfg(feature = "gemini")]
pub use gemini::*;
pub use mock::*;

use crate::error::{AIError, ProviderError};
use tracing::{debug, error, warn};

/// Map a provider HTTP response onto the shared error taxonomy.
/// Returns the response untouched when the status is a success.
pub(crate) async fn check_status(
    response: reqwest::Response,
    provider: &'static str,
    wrap: fn(ProviderError) -> AIError,
) -> Result<reqwest::Response, AIError> {
    let status = response.status();
    debug!(provider, status = %status, "Received provider response");

    if status.as_u16() == 429 {
        warn!(provider, "Rate limit exceeded");
        return Err(wrap(ProviderError::RateLimit));
    }
    if status.as_u16() == 401 || status.as_u16() == 403 {
        error!(provider, "Authentication failed");
        return Err(wrap(ProviderError::Authentication));
    }
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(provider, status = %status, error = %error_text, "Provider API error");
        return Err(wrap(ProviderError::Api(error_text)));
    }
    Ok(response)
}

/// Split a `data:<mime>;base64,<payload>` URI into its MIME type and payload.
pub(crate) fn parse_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    if mime.is_empty() || payload.is_empty() {
        return None;
    }
    Some((mime, payload))
}

#[cfg(test)]
mod tests {
    use super::parse_data_uri;

    #[test]
    fn data_uri_parts() {
        assert_eq!(parse_data_uri("data:image/png;base64,iVBORw0"), Some(("image/png", "iVBORw0")));
        assert_eq!(parse_data_uri("data:image/png,raw"), None);
        assert_eq!(parse_data_uri("https://example.com/a.png"), None);
    }
}
