//! Per-extension switches for routing a file type through the partitioner.
//!
//! A toggle is an environment variable named `ENABLED_<EXT>`, e.g.
//! `ENABLED_PDF=false`. Unset means enabled.

/// Prefix of the per-extension environment variables.
pub const TOGGLE_PREFIX: &str = "ENABLED_";

const ENABLED_VALUES: [&str; 3] = ["true", "1", "yes"];

/// Name of the environment variable controlling `extension`.
///
/// A leading dot is ignored and the extension is uppercased, so `.pdf`,
/// `pdf` and `PDF` all map to `ENABLED_PDF`.
pub fn toggle_var_name(extension: &str) -> String {
    format!(
        "{}{}",
        TOGGLE_PREFIX,
        extension.trim_start_matches('.').to_uppercase()
    )
}

/// Whether partitioning is enabled for `extension`, read from the process
/// environment.
pub fn is_enabled(extension: &str) -> bool {
    is_enabled_with(extension, |name| std::env::var(name).ok())
}

/// Same as [`is_enabled`] with an injected variable lookup.
pub fn is_enabled_with<F>(extension: &str, lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(&toggle_var_name(extension)) {
        Some(value) => ENABLED_VALUES.contains(&value.trim().to_lowercase().as_str()),
        None => true,
    }
}
