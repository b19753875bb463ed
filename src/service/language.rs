//! Language tags and the file extensions they cover.

use std::path::Path;

/// Language tag to recognized extensions. The first extension is the one
/// used when materializing inline code.
const LANGUAGE_EXTENSIONS: &[(&str, &[&str])] = &[
    ("go", &["go"]),
    ("python", &["py"]),
    ("javascript", &["js"]),
    ("typescript", &["ts"]),
    ("rust", &["rs"]),
    ("java", &["java"]),
    ("cpp", &["cpp", "cc", "cxx"]),
    ("c", &["c", "h"]),
];

fn canonical(language: &str) -> String {
    match language.trim().to_lowercase().as_str() {
        "c++" => "cpp".to_string(),
        other => other.to_string(),
    }
}

fn extensions_for(language: &str) -> Option<&'static [&'static str]> {
    let language = canonical(language);
    LANGUAGE_EXTENSIONS
        .iter()
        .find(|(tag, _)| *tag == language)
        .map(|(_, exts)| *exts)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Check whether a file belongs to `language` by extension.
///
/// Unknown language tags match nothing.
pub fn matches_language(path: &Path, language: &str) -> bool {
    match (extensions_for(language), extension_of(path)) {
        (Some(exts), Some(ext)) => exts.contains(&ext.as_str()),
        _ => false,
    }
}

/// Infer the language tag of a file from its extension.
pub fn language_for_path(path: &Path) -> Option<&'static str> {
    let ext = extension_of(path)?;
    LANGUAGE_EXTENSIONS
        .iter()
        .find(|(_, exts)| exts.contains(&ext.as_str()))
        .map(|(tag, _)| *tag)
}

/// Extension for a temporary file holding `language` source.
///
/// Unrecognized tags keep only `[a-z0-9_+-]` so the engine can still try
/// them. Returns `None` when nothing usable is left.
pub fn primary_extension(language: &str) -> Option<String> {
    if let Some(exts) = extensions_for(language) {
        return Some(exts[0].to_string());
    }
    let ext: String = language
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-'))
        .collect();
    (!ext.is_empty()).then_some(ext)
}

/// All supported language tags.
pub fn supported_languages() -> Vec<&'static str> {
    LANGUAGE_EXTENSIONS.iter().map(|(tag, _)| *tag).collect()
}
