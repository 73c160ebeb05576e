//! URL helpers for gallery images
//!
//! Gallery `src` attributes on the site are origin-relative, so they are
//! resolved against the configured base URL. The last path segment of the
//! resolved URL becomes the image's file name inside the archive.

use percent_encoding::percent_decode_str;
use url::Url;

/// File name used when an image URL has no usable last segment
pub const FALLBACK_IMAGE_NAME: &str = "image";

/// Resolves a gallery `src` attribute to an absolute image URL
///
/// Returns None if the source should be skipped:
/// - empty values
/// - data: URIs
/// - values that do not resolve to an HTTP(S) URL
///
/// # Examples
///
/// ```
/// use product_archiver::url::resolve_image_url;
/// use url::Url;
///
/// let base = Url::parse("https://2cent.ru").unwrap();
/// assert_eq!(
///     resolve_image_url(&base, "/upload/a.jpg"),
///     Some("https://2cent.ru/upload/a.jpg".to_string())
/// );
/// ```
pub fn resolve_image_url(base: &Url, src: &str) -> Option<String> {
    let src = src.trim();

    if src.is_empty() || src.starts_with("data:") {
        return None;
    }

    match base.join(src) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}

/// Returns the file name an image is stored under
///
/// The segment is percent-decoded, so non-ASCII names survive as written.
/// Query strings and fragments are ignored. Empty, `.` and `..` segments
/// fall back to [`FALLBACK_IMAGE_NAME`] so the result is always a single,
/// safe path component.
pub fn image_basename(image_url: &str) -> String {
    let encoded = match Url::parse(image_url) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        Err(_) => image_url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_string),
    };
    let segment = encoded.map(|name| percent_decode_str(&name).decode_utf8_lossy().into_owned());

    match segment {
        Some(name) if is_safe_component(&name) => name,
        _ => FALLBACK_IMAGE_NAME.to_string(),
    }
}

fn is_safe_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://2cent.ru").unwrap()
    }

    #[test]
    fn test_resolve_origin_relative() {
        assert_eq!(
            resolve_image_url(&base(), "/upload/iblock/a.jpg"),
            Some("https://2cent.ru/upload/iblock/a.jpg".to_string())
        );
    }

    #[test]
    fn test_resolve_keeps_absolute() {
        assert_eq!(
            resolve_image_url(&base(), "https://cdn.example.com/b.png"),
            Some("https://cdn.example.com/b.png".to_string())
        );
    }

    #[test]
    fn test_resolve_skips_empty_and_data() {
        assert_eq!(resolve_image_url(&base(), "   "), None);
        assert_eq!(resolve_image_url(&base(), "data:image/png;base64,AAAA"), None);
    }

    #[test]
    fn test_resolve_skips_non_http() {
        assert_eq!(resolve_image_url(&base(), "ftp://example.com/a.jpg"), None);
    }

    #[test]
    fn test_basename_simple() {
        assert_eq!(image_basename("https://2cent.ru/upload/a.jpg"), "a.jpg");
    }

    #[test]
    fn test_basename_ignores_query_and_fragment() {
        assert_eq!(
            image_basename("https://2cent.ru/upload/a.jpg?v=3#top"),
            "a.jpg"
        );
    }

    #[test]
    fn test_basename_fallback() {
        assert_eq!(image_basename("https://2cent.ru/"), FALLBACK_IMAGE_NAME);
        assert_eq!(image_basename("https://2cent.ru"), FALLBACK_IMAGE_NAME);
        assert_eq!(image_basename(""), FALLBACK_IMAGE_NAME);
    }

    #[test]
    fn test_basename_unparseable_url() {
        assert_eq!(image_basename("upload/b.png?x=1"), "b.png");
    }

    #[test]
    fn test_basename_is_percent_decoded() {
        let url = resolve_image_url(&base(), "/upload/фото товара.jpg").unwrap();
        assert!(url.contains("%D1%84"));
        assert_eq!(image_basename(&url), "фото товара.jpg");
    }

    #[test]
    fn test_basename_decoded_separator_falls_back() {
        assert_eq!(
            image_basename("https://2cent.ru/upload/a%2F..%2Fb.jpg"),
            FALLBACK_IMAGE_NAME
        );
        assert_eq!(image_basename("https://2cent.ru/upload/%2E%2E"), FALLBACK_IMAGE_NAME);
    }
}
