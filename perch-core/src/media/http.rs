//! HTTP media library provider.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{MediaError, MediaKind, MediaProvider, MediaRecord};
use crate::cache::SpeciesCode;
use crate::config::NetworkConfig;

/// Media library search client.
/// `GET <base>?taxonCode=<code>&mediaType=<photo|audio>&count=1`.
#[derive(Debug, Clone)]
pub struct HttpMediaProvider {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct MediaSearchResponse {
    results: Option<MediaResults>,
}

#[derive(Debug, Deserialize)]
struct MediaResults {
    #[serde(default)]
    content: Vec<MediaItemDto>,
}

#[derive(Debug, Deserialize)]
struct MediaItemDto {
    #[serde(rename = "mediaUrl")]
    media_url: Option<String>,
    #[serde(rename = "userDisplayName")]
    user_display_name: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

impl HttpMediaProvider {
    /// Creates a provider from network configuration.
    ///
    /// # Errors
    ///
    /// - `MediaError::Request` - Invalid base URL or client build failure
    pub fn new(config: &NetworkConfig) -> Result<Self, MediaError> {
        let base_url = Url::parse(&config.media_base_url).map_err(|e| MediaError::Request {
            reason: format!("invalid media base URL {}: {e}", config.media_base_url),
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| MediaError::Request {
                reason: format!("HTTP client build failed: {e}"),
            })?;

        Ok(Self { client, base_url })
    }

    /// Contributor profile URL on the media library site, or empty when the
    /// library did not attribute the asset to an account.
    fn contributor_url(&self, user_id: Option<&str>) -> String {
        match user_id {
            Some(id) => format!("{}/profile/{}", self.base_url, urlencoding::encode(id)),
            None => String::new(),
        }
    }
}

#[async_trait]
impl MediaProvider for HttpMediaProvider {
    async fn search(
        &self,
        species: &SpeciesCode,
        kind: MediaKind,
    ) -> Result<Option<MediaRecord>, MediaError> {
        let url = format!(
            "{}?taxonCode={}&mediaType={}&count=1",
            self.base_url,
            urlencoding::encode(species.as_str()),
            kind.as_query()
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MediaError::Request {
                reason: format!("media search for {species} ({kind}) failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let body: MediaSearchResponse =
            response
                .json()
                .await
                .map_err(|e| MediaError::InvalidResponse {
                    reason: format!("media body for {species} ({kind}) unparseable: {e}"),
                })?;

        let first = body
            .results
            .map(|results| results.content)
            .unwrap_or_default()
            .into_iter()
            .next();

        let Some(item) = first else {
            tracing::debug!("Media library has no {kind} entries for {species}");
            return Ok(None);
        };

        Ok(Some(MediaRecord {
            media_url: item.media_url.filter(|u| !u.is_empty()),
            contributor: item.user_display_name.unwrap_or_default(),
            contributor_url: self.contributor_url(item.user_id.as_deref()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_with_results_parses() {
        let body: MediaSearchResponse = serde_json::from_value(serde_json::json!({
            "results": {
                "content": [{
                    "mediaUrl": "https://cdn.example/robin.jpg",
                    "userDisplayName": "Jo Birder",
                    "userId": "USER123"
                }]
            }
        }))
        .unwrap();

        let item = &body.results.unwrap().content[0];
        assert_eq!(item.media_url.as_deref(), Some("https://cdn.example/robin.jpg"));
        assert_eq!(item.user_display_name.as_deref(), Some("Jo Birder"));
    }

    #[test]
    fn test_empty_and_missing_results_parse() {
        let empty: MediaSearchResponse =
            serde_json::from_value(serde_json::json!({"results": {"content": []}})).unwrap();
        assert!(empty.results.unwrap().content.is_empty());

        let missing: MediaSearchResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(missing.results.is_none());
    }
}
