//! Product image resolution.
//!
//! The commerce API has no fixed image schema: depending on the endpoint
//! (and its age) a product carries its picture under `imageUrl`,
//! `image_url`, `thumbnail`, an `images` array of strings or objects, a
//! nested `image: { url }` object, or somewhere deeper still. The resolver
//! looks in a fixed priority order and turns whatever it finds into an
//! absolute URL.
//!
//! Priority (earlier always wins):
//!
//! 1. direct string fields on the product, in [`DIRECT_FIELDS`] order
//! 2. the first element of the first usable array in [`ARRAY_FIELDS`]
//! 3. a URL-like field inside the objects named in [`NESTED_FIELDS`]
//! 4. direct string fields on the outer envelope, when the product was
//!    wrapped (`{ product: {...}, imageUrl: ... }`)
//! 5. a bounded depth-first search for anything that looks like an image

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Direct scalar fields, in priority order.
pub const DIRECT_FIELDS: &[&str] = &[
    "imageUrl",
    "image_url",
    "imageURL",
    "ImageUrl",
    "thumbnail",
    "thumb",
    "image",
    "img",
    "imagePath",
    "image_path",
    "imagepath",
    "imageurl",
    "image_uri",
    "imageHref",
    "photo",
    "picture",
];

/// Array-valued fields, in priority order.
pub const ARRAY_FIELDS: &[&str] = &["images", "media", "photos", "gallery", "pictures", "assets"];

/// Singular object fields that may wrap a URL.
pub const NESTED_FIELDS: &[&str] = &["image", "thumbnail", "picture"];

/// URL-like keys inside an image object, in priority order.
pub const URL_KEYS: &[&str] = &["url", "src", "path", "href"];

/// Deepest level the fallback search descends to (the product itself is 0).
pub const MAX_SEARCH_DEPTH: usize = 3;

static IMAGE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(png|jpe?g|webp|gif|svg)(\?.*)?$").expect("Invalid regex")
});

static DATA_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^data:image/").expect("Invalid regex"));

static ABSOLUTE_HTTP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("Invalid regex"));

/// Resolves product images against a static file origin.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    static_base: String,
    placeholder: String,
}

impl ImageResolver {
    /// `static_base` is the origin relative image paths are served from
    /// (usually the API base without `/api`); `placeholder` is used when a
    /// product has no image at all.
    #[must_use]
    pub fn new(static_base: &str, placeholder: &str) -> Self {
        Self {
            static_base: static_base.trim_end_matches('/').to_string(),
            placeholder: placeholder.to_string(),
        }
    }

    /// Absolute image URL for `candidate`, or an empty string.
    #[must_use]
    pub fn resolve(&self, candidate: &Value) -> String {
        find_image(candidate).map_or_else(String::new, |raw| self.build_image_url(raw))
    }

    /// Absolute image URL for `candidate`, falling back to the placeholder.
    /// Never empty.
    #[must_use]
    pub fn resolve_or_placeholder(&self, candidate: &Value) -> String {
        let resolved = self.resolve(candidate);
        if resolved.is_empty() {
            self.placeholder_url()
        } else {
            resolved
        }
    }

    /// The placeholder as an absolute URL.
    #[must_use]
    pub fn placeholder_url(&self) -> String {
        let url = self.build_image_url(&self.placeholder);
        if url.is_empty() {
            format!("{}/", self.static_base)
        } else {
            url
        }
    }

    /// Make a raw image reference absolute.
    #[must_use]
    pub fn build_image_url(&self, raw: &str) -> String {
        build_image_url(raw, &self.static_base)
    }
}

/// Resolve `candidate` to an absolute image URL against `static_base`.
///
/// Returns an empty string when nothing image-like is found.
#[must_use]
pub fn resolve_image(candidate: &Value, static_base: &str) -> String {
    find_image(candidate).map_or_else(String::new, |raw| build_image_url(raw, static_base))
}

/// Make a raw image reference absolute.
///
/// `http(s)://` URLs and `data:` URIs pass through; anything else is joined
/// to `static_base` with exactly one `/`.
#[must_use]
pub fn build_image_url(raw: &str, static_base: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    if ABSOLUTE_HTTP.is_match(raw) || DATA_IMAGE.is_match(raw) {
        return raw.to_string();
    }
    format!(
        "{}/{}",
        static_base.trim_end_matches('/'),
        raw.trim_start_matches('/')
    )
}

/// Locate the raw image reference in `candidate` without normalising it.
#[must_use]
pub fn find_image(candidate: &Value) -> Option<&str> {
    let outer = candidate.as_object();
    let wrapped = outer.and_then(|o| {
        ["product", "Product"]
            .iter()
            .find_map(|key| o.get(*key).filter(|v| v.is_object()))
    });
    let product = wrapped.unwrap_or(candidate);

    if let Some(fields) = product.as_object() {
        if let Some(found) = direct_field(fields) {
            return Some(found);
        }
        if let Some(found) = array_field(fields) {
            return Some(found);
        }
        if let Some(found) = nested_field(fields) {
            return Some(found);
        }
    }

    if wrapped.is_some()
        && let Some(found) = outer.and_then(direct_field)
    {
        return Some(found);
    }

    let mut visited = HashSet::new();
    search_deep(product, &mut visited, 0).or_else(|| {
        wrapped
            .is_some()
            .then(|| search_deep(candidate, &mut visited, 0))
            .flatten()
    })
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

fn direct_field(fields: &Map<String, Value>) -> Option<&str> {
    DIRECT_FIELDS
        .iter()
        .find_map(|key| fields.get(*key).and_then(non_empty_str))
}

fn url_like(fields: &Map<String, Value>) -> Option<&str> {
    URL_KEYS
        .iter()
        .find_map(|key| fields.get(*key).and_then(non_empty_str))
}

fn array_field(fields: &Map<String, Value>) -> Option<&str> {
    ARRAY_FIELDS.iter().find_map(|key| {
        let first = fields.get(*key)?.as_array()?.first()?;
        match first {
            Value::String(_) => non_empty_str(first),
            Value::Object(inner) => url_like(inner),
            _ => None,
        }
    })
}

fn nested_field(fields: &Map<String, Value>) -> Option<&str> {
    NESTED_FIELDS
        .iter()
        .find_map(|key| fields.get(*key)?.as_object().and_then(url_like))
}

fn looks_like_image(s: &str) -> bool {
    IMAGE_FILE.is_match(s) || DATA_IMAGE.is_match(s)
}

/// Depth-first search for the first image-looking string, visiting each
/// node at most once.
fn search_deep<'a>(
    value: &'a Value,
    visited: &mut HashSet<*const Value>,
    depth: usize,
) -> Option<&'a str> {
    if depth > MAX_SEARCH_DEPTH || !visited.insert(std::ptr::from_ref(value)) {
        return None;
    }

    let children: Box<dyn Iterator<Item = &'a Value>> = match value {
        Value::Object(fields) => Box::new(fields.values()),
        Value::Array(items) => Box::new(items.iter()),
        _ => return None,
    };

    for child in children {
        match child {
            Value::String(s) if looks_like_image(s) => return Some(s.as_str()),
            Value::Object(_) | Value::Array(_) => {
                if let Some(found) = search_deep(child, visited, depth + 1) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "http://localhost:4000";

    fn resolve(value: &Value) -> String {
        resolve_image(value, BASE)
    }

    #[test]
    fn test_image_url_made_absolute() {
        assert_eq!(
            resolve(&json!({"imageUrl": "/uploads/a.png"})),
            "http://localhost:4000/uploads/a.png"
        );
    }

    #[test]
    fn test_snake_case_field() {
        assert_eq!(
            resolve(&json!({"image_url": "uploads/b.jpg"})),
            "http://localhost:4000/uploads/b.jpg"
        );
    }

    #[test]
    fn test_nested_images_array_object() {
        assert_eq!(
            resolve(&json!({"images": [{"url": "c.webp"}, {"url": "d.webp"}]})),
            "http://localhost:4000/c.webp"
        );
    }

    #[test]
    fn test_direct_field_beats_array() {
        assert_eq!(
            resolve(&json!({"images": ["b.png"], "thumbnail": "a.png"})),
            "http://localhost:4000/a.png"
        );
    }

    #[test]
    fn test_direct_field_order() {
        let product = json!({"photo": "late.png", "image_url": "early.png"});
        assert_eq!(resolve(&product), "http://localhost:4000/early.png");
    }

    #[test]
    fn test_array_field_order_and_empty_arrays_skipped() {
        let product = json!({
            "media": ["media.png"],
            "images": [],
            "gallery": ["gallery.png"]
        });
        assert_eq!(resolve(&product), "http://localhost:4000/media.png");
    }

    #[test]
    fn test_array_object_src_key() {
        let product = json!({"photos": [{"src": "/p/1.gif"}]});
        assert_eq!(resolve(&product), "http://localhost:4000/p/1.gif");
    }

    #[test]
    fn test_nested_image_object() {
        let product = json!({"image": {"path": "/img/x.png"}});
        assert_eq!(resolve(&product), "http://localhost:4000/img/x.png");
    }

    #[test]
    fn test_unwraps_product_field() {
        let item = json!({"id": 9, "product": {"imageUrl": "inner.png"}, "imageUrl": "outer.png"});
        assert_eq!(resolve(&item), "http://localhost:4000/inner.png");
    }

    #[test]
    fn test_outer_envelope_direct_field_fallback() {
        let item = json!({"product": {"name": "Tent"}, "thumbnail": "outer.png"});
        assert_eq!(resolve(&item), "http://localhost:4000/outer.png");
    }

    #[test]
    fn test_nested_product_wins_over_outer_even_via_array() {
        let item = json!({"product": {"images": ["inner.png"]}, "imageUrl": "outer.png"});
        assert_eq!(resolve(&item), "http://localhost:4000/inner.png");
    }

    #[test]
    fn test_deep_search_finds_extension() {
        let product = json!({
            "name": "Stove",
            "meta": {"variants": [{"hero": "/deep/stove.JPEG?v=2"}]}
        });
        assert_eq!(resolve(&product), "http://localhost:4000/deep/stove.JPEG?v=2");
    }

    #[test]
    fn test_deep_search_respects_depth_limit() {
        let product = json!({"a": {"b": {"c": {"d": {"e": "too-deep.png"}}}}});
        assert_eq!(resolve(&product), "");
    }

    #[test]
    fn test_deep_search_finds_data_uri() {
        let product = json!({"extra": {"blob": "data:image/png;base64,AAAA"}});
        assert_eq!(resolve(&product), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_deep_search_ignores_non_image_strings() {
        let product = json!({"name": "Knife", "docs": {"manual": "/files/manual.pdf"}});
        assert_eq!(resolve(&product), "");
    }

    #[test]
    fn test_absolute_urls_pass_through() {
        assert_eq!(
            resolve(&json!({"imageUrl": "HTTPS://cdn.example.dk/a.png"})),
            "HTTPS://cdn.example.dk/a.png"
        );
    }

    #[test]
    fn test_empty_strings_are_skipped() {
        let product = json!({"imageUrl": "", "image_url": "  ", "thumb": "t.png"});
        assert_eq!(resolve(&product), "http://localhost:4000/t.png");
    }

    #[test]
    fn test_non_object_input() {
        assert_eq!(resolve(&json!(null)), "");
        assert_eq!(resolve(&json!("a.png")), "");
        assert_eq!(resolve(&json!(["a.png"])), "http://localhost:4000/a.png");
    }

    #[test]
    fn test_build_image_url_single_separator() {
        assert_eq!(
            build_image_url("//uploads/a.png", "http://h/"),
            "http://h/uploads/a.png"
        );
        assert_eq!(build_image_url("", "http://h"), "");
    }

    #[test]
    fn test_resolver_placeholder() {
        let resolver = ImageResolver::new("http://localhost:4000/", "/images/placeholder.png");
        assert_eq!(
            resolver.resolve_or_placeholder(&json!({"name": "no image"})),
            "http://localhost:4000/images/placeholder.png"
        );
        assert_eq!(
            resolver.resolve_or_placeholder(&json!({"img": "x.png"})),
            "http://localhost:4000/x.png"
        );
    }
}
