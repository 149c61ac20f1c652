//! HTTP catalog provider.
//!
//! Parse-or-reject at the boundary: entries missing a species code or a
//! common name are dropped here so downstream logic never sees a partial
//! bird.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{CatalogBird, CatalogError, CatalogProvider, LocalizedNames};
use crate::cache::{RegionCode, SpeciesCode};
use crate::config::NetworkConfig;

/// Catalog API client. `GET <base>?region=<code>` returning `{ birds: [...] }`.
#[derive(Debug, Clone)]
pub struct HttpCatalogProvider {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    birds: Vec<CatalogBirdDto>,
}

/// Upstream entry with every field optional; presence is validated in
/// [`CatalogBirdDto::into_bird`].
#[derive(Debug, Deserialize)]
struct CatalogBirdDto {
    #[serde(rename = "speciesCode")]
    species_code: Option<String>,
    #[serde(rename = "comName")]
    common_name: Option<String>,
    #[serde(rename = "comNameFr")]
    common_name_fr: Option<String>,
    #[serde(rename = "comNameCn")]
    common_name_cn: Option<String>,
    #[serde(rename = "sciName")]
    scientific_name: Option<String>,
    description: Option<String>,
    #[serde(rename = "conservationStatus")]
    conservation_status: Option<String>,
}

impl CatalogBirdDto {
    fn into_bird(self) -> Option<CatalogBird> {
        let species_code = non_empty(self.species_code)?;
        let common_name = non_empty(self.common_name)?;

        Some(CatalogBird {
            species_code: SpeciesCode::new(species_code),
            common_name,
            localized_names: LocalizedNames {
                fr: non_empty(self.common_name_fr),
                cn: non_empty(self.common_name_cn),
            },
            scientific_name: non_empty(self.scientific_name).unwrap_or_default(),
            description: non_empty(self.description).unwrap_or_default(),
            conservation_status: non_empty(self.conservation_status).unwrap_or_default(),
        })
    }
}

/// Treats missing, empty, and `"N/A"` upstream fields uniformly as absent.
fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty() && value != "N/A")
}

impl HttpCatalogProvider {
    /// Creates a provider from network configuration.
    ///
    /// # Errors
    ///
    /// - `CatalogError::Request` - Invalid base URL or client build failure
    pub fn new(config: &NetworkConfig) -> Result<Self, CatalogError> {
        let base_url = Url::parse(&config.catalog_base_url).map_err(|e| CatalogError::Request {
            reason: format!("invalid catalog base URL {}: {e}", config.catalog_base_url),
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| CatalogError::Request {
                reason: format!("HTTP client build failed: {e}"),
            })?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl CatalogProvider for HttpCatalogProvider {
    async fn birds_in_region(&self, region: &RegionCode) -> Result<Vec<CatalogBird>, CatalogError> {
        let url = format!(
            "{}?region={}",
            self.base_url,
            urlencoding::encode(region.as_str())
        );

        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| CatalogError::Request {
                    reason: format!("catalog request for {region} failed: {e}"),
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::UpstreamStatus {
                status: status.as_u16(),
                region: region.clone(),
            });
        }

        let body: CatalogResponse =
            response
                .json()
                .await
                .map_err(|e| CatalogError::InvalidResponse {
                    reason: format!("catalog body for {region} unparseable: {e}"),
                })?;

        let total = body.birds.len();
        let birds: Vec<CatalogBird> = body
            .birds
            .into_iter()
            .filter_map(CatalogBirdDto::into_bird)
            .collect();

        if birds.len() < total {
            tracing::debug!(
                "Dropped {} incomplete catalog entries for {region}",
                total - birds.len()
            );
        }

        Ok(birds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(json: serde_json::Value) -> CatalogBirdDto {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_complete_entry_parses() {
        let bird = dto(serde_json::json!({
            "speciesCode": "amerob",
            "comName": "American Robin",
            "comNameFr": "Merle d'Amérique",
            "sciName": "Turdus migratorius",
            "description": "A common thrush.",
            "conservationStatus": "LC"
        }))
        .into_bird()
        .unwrap();

        assert_eq!(bird.species_code.as_str(), "amerob");
        assert_eq!(bird.localized_names.fr.as_deref(), Some("Merle d'Amérique"));
        assert_eq!(bird.localized_names.cn, None);
    }

    #[test]
    fn test_entry_without_species_code_is_rejected() {
        assert!(dto(serde_json::json!({"comName": "Mystery Bird"}))
            .into_bird()
            .is_none());
    }

    #[test]
    fn test_not_available_markers_become_absent() {
        let bird = dto(serde_json::json!({
            "speciesCode": "amerob",
            "comName": "American Robin",
            "comNameFr": "N/A",
            "sciName": "",
        }))
        .into_bird()
        .unwrap();

        assert_eq!(bird.localized_names.fr, None);
        assert_eq!(bird.scientific_name, "");
    }
}
