// Link extraction - wiki-link and blob-ref tokens in bodies and field values

use regex::Regex;
use serde_yaml::Value;
use std::sync::OnceLock;

pub const BLOB_PREFIX: &str = "gdblob:";
const BLOB_SHA256_PREFIX: &str = "gdblob:sha256-";
const SHA256_HEX_LEN: usize = 64;

fn wiki_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\[\]]*?)\]\]").expect("wiki-link pattern is valid"))
}

/// One `[[target]]` or `[[target|alias]]` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WikiLink<'a> {
    pub target: &'a str,
    pub alias: Option<&'a str>,
}

/// Iterate over the wiki-link tokens of `text` in order. Tokens with a blank
/// target are skipped.
pub fn wiki_links(text: &str) -> impl Iterator<Item = WikiLink<'_>> {
    wiki_link_regex().captures_iter(text).filter_map(|caps| {
        let inner = caps.get(1)?.as_str();
        let (target, alias) = match inner.split_once('|') {
            Some((target, alias)) => (target.trim(), Some(alias)),
            None => (inner.trim(), None),
        };
        (!target.is_empty()).then_some(WikiLink { target, alias })
    })
}

/// All wiki-link targets in order, aliases dropped, duplicates kept.
pub fn extract_wiki_links(text: &str) -> Vec<String> {
    wiki_links(text).map(|link| link.target.to_string()).collect()
}

/// Wiki-link targets that are well-formed record references.
///
/// Aliased tokens, blob tokens, and targets with more than one `:` are not
/// record references.
pub fn extract_record_refs(text: &str) -> Vec<String> {
    wiki_links(text)
        .filter(|link| link.alias.is_none())
        .map(|link| link.target)
        .filter(|target| is_record_ref(target))
        .map(str::to_string)
        .collect()
}

fn is_record_ref(target: &str) -> bool {
    if target.starts_with(BLOB_PREFIX) {
        return false;
    }
    match target.split_once(':') {
        None => true,
        Some((namespace, local)) => {
            !namespace.is_empty() && !local.is_empty() && !local.contains(':')
        }
    }
}

/// SHA-256 digests of `[[gdblob:sha256-<64 lowercase hex>]]` tokens, in order.
pub fn extract_blob_refs(text: &str) -> Vec<String> {
    wiki_links(text)
        .filter(|link| link.alias.is_none())
        .filter_map(|link| blob_digest(link.target))
        .map(str::to_string)
        .collect()
}

fn blob_digest(target: &str) -> Option<&str> {
    let hex = target.strip_prefix(BLOB_SHA256_PREFIX)?;
    let valid = hex.len() == SHA256_HEX_LEN
        && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    valid.then_some(hex)
}

/// Repository path of a content-addressed blob.
pub fn blob_path(digest: &str) -> String {
    let shard = digest.get(..2).unwrap_or(digest);
    format!("blobs/sha256/{shard}/{digest}")
}

/// Trim an id, unwrapping a surrounding `[[...]]`. Blank and non-string
/// values yield `None`.
pub fn clean_id(value: &Value) -> Option<String> {
    clean_id_str(value.as_str()?)
}

pub fn clean_id_str(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unwrapped = trimmed
        .strip_prefix("[[")
        .and_then(|s| s.strip_suffix("]]"))
        .map(str::trim)
        .unwrap_or(trimmed);
    (!unwrapped.is_empty()).then(|| unwrapped.to_string())
}

/// Normalize a string or list of strings into clean ids, preserving order
/// and duplicates.
pub fn normalize_refs(value: &Value) -> Vec<String> {
    match value {
        Value::String(_) => clean_id(value).into_iter().collect(),
        Value::Sequence(items) => items.iter().filter_map(clean_id).collect(),
        _ => Vec::new(),
    }
}

/// Push every string nested anywhere inside `value` onto `out`.
/// Mapping keys are not content and are skipped.
pub fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Sequence(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        Value::Mapping(map) => {
            for item in map.values() {
                collect_strings(item, out);
            }
        }
        Value::Tagged(tagged) => collect_strings(&tagged.value, out),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
