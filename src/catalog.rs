use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::{CatalogId, Descriptor};
use crate::error::{DecodeFailure, HarvestError};
use crate::http::{Fetcher, request};

const INFO_DOCUMENT: &str = "info.0.json";

#[derive(Debug, Deserialize)]
struct LatestInfo {
    num: u32,
}

#[derive(Debug, Deserialize)]
struct ComicInfo {
    img: String,
    title: String,
}

pub struct Catalog<F: Fetcher> {
    fetcher: F,
    api_root: String,
}

impl<F: Fetcher> Catalog<F> {
    pub fn new(fetcher: F, api_root: &str) -> Self {
        Self {
            fetcher,
            api_root: api_root.trim_end_matches('/').to_string(),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn latest_url(&self) -> String {
        format!("{}/{INFO_DOCUMENT}", self.api_root)
    }

    pub fn descriptor_url(&self, id: CatalogId) -> String {
        format!("{}/{id}/{INFO_DOCUMENT}", self.api_root)
    }

    /// Highest id currently published. Any error here aborts the whole run.
    pub fn upper_bound(&self) -> Result<u32, HarvestError> {
        let url = self.latest_url();
        let response = match self.fetcher.get(&url) {
            Ok(response) => response,
            Err(failure) => {
                error!(
                    kind = %failure.kind,
                    reason = %failure.message,
                    "{} in request last comic index from xkcd API", failure.kind
                );
                return Err(HarvestError::CatalogUnavailable(failure));
            }
        };

        if !response.is_ok() {
            warn!(
                status = response.status,
                "Error {} when getting last comic index from xkcd API", response.status
            );
            return Err(HarvestError::CatalogStatus {
                status: response.status,
            });
        }

        let latest: LatestInfo = decode(&response.body).map_err(|failure| {
            warn!(reason = %failure, "last comic index could not be decoded");
            HarvestError::CatalogDecode(failure)
        })?;
        info!(bound = latest.num, "Last comic index (comic id): {}", latest.num);
        Ok(latest.num)
    }

    pub fn resolve_descriptor(&self, id: CatalogId) -> Option<Descriptor> {
        let url = self.descriptor_url(id);
        let context = format!("in request comic id: {id} from xkcd API");
        let response = request(&self.fetcher, &url, &context)?;

        if !response.is_ok() {
            warn!(
                %id,
                status = response.status,
                "Error {} in xkcd API request from comic id: {id}", response.status
            );
            return None;
        }

        match decode::<ComicInfo>(&response.body) {
            Ok(comic) => {
                info!(%id, title = %comic.title, "URL from image comic id: {id} has been obtained from xkcd API");
                Some(Descriptor {
                    id,
                    asset_url: comic.img,
                    title: comic.title,
                })
            }
            Err(failure) => {
                warn!(%id, reason = %failure, "descriptor for comic id: {id} could not be decoded");
                None
            }
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, DecodeFailure> {
    serde_json::from_slice(body).map_err(DecodeFailure::from)
}
