use reqwest::Url;
use tracing::{info, warn};

use crate::domain::{AssetPayload, Descriptor};
use crate::http::{Fetcher, request};

const IMAGE_PREFIX: &str = "image";
const FALLBACK_EXTENSION: &str = "bin";

pub fn fetch_asset<F: Fetcher + ?Sized>(fetcher: &F, descriptor: &Descriptor) -> Option<AssetPayload> {
    let id = descriptor.id;
    let context = format!("in request for comic id image file: {id}");
    let response = request(fetcher, &descriptor.asset_url, &context)?;

    if !response.is_ok() {
        warn!(
            %id,
            status = response.status,
            "Error {} in request for comic id: {id}", response.status
        );
        return None;
    }

    let content_type = match response.header("content-type") {
        Some(value) if is_image(value) => value.to_string(),
        other => {
            info!(%id, content_type = other.unwrap_or(""), "The file for comic id: {id} is not a image");
            return None;
        }
    };

    let extension = image_extension(&content_type)
        .or_else(|| url_extension(&descriptor.asset_url))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

    Some(AssetPayload {
        bytes: response.body,
        content_type,
        extension,
    })
}

pub fn is_image(content_type: &str) -> bool {
    content_type.starts_with(IMAGE_PREFIX)
}

/// `image/png` -> `png`; media type parameters are dropped.
pub fn image_extension(content_type: &str) -> Option<String> {
    let (_, subtype) = content_type.split_once('/')?;
    let subtype = subtype.split(';').next().unwrap_or("").trim();
    if !is_file_safe(subtype) {
        return None;
    }
    Some(subtype.to_ascii_lowercase())
}

fn url_extension(asset_url: &str) -> Option<String> {
    let url = Url::parse(asset_url).ok()?;
    let name = url.path_segments()?.next_back()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn is_file_safe(extension: &str) -> bool {
    extension.chars().any(|ch| ch.is_ascii_alphanumeric())
        && extension
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_prefix_classification() {
        assert!(is_image("image/png"));
        assert!(is_image("image/jpeg; charset=binary"));
        assert!(!is_image("text/html; charset=utf-8"));
        assert!(!is_image("application/octet-stream"));
    }

    #[test]
    fn extension_from_subtype() {
        assert_eq!(image_extension("image/png").as_deref(), Some("png"));
        assert_eq!(image_extension("image/jpeg").as_deref(), Some("jpeg"));
        assert_eq!(image_extension("image/gif; q=1").as_deref(), Some("gif"));
        assert_eq!(image_extension("image/svg+xml").as_deref(), Some("svg+xml"));
        assert_eq!(image_extension("image"), None);
        assert_eq!(image_extension("image/"), None);
        assert_eq!(image_extension("image/../x"), None);
        assert_eq!(image_extension("image/.."), None);
        assert_eq!(image_extension("image/-+."), None);
        assert_eq!(image_extension("image/x-icon").as_deref(), Some("x-icon"));
    }

    #[test]
    fn extension_from_url_fallback() {
        assert_eq!(
            url_extension("https://imgs.xkcd.com/comics/barrel_cropped_(1).jpg").as_deref(),
            Some("jpg")
        );
        assert_eq!(url_extension("https://imgs.xkcd.com/comics/"), None);
        assert_eq!(url_extension("nonsense"), None);
    }
}
