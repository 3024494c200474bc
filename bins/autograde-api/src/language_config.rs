// Supported-language table as served by GET /languages

use autograde_common::types::Language;
use autograde_engine::backend::local::LOCAL_LANGUAGE;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageInfo {
    pub name: &'static str,
    /// Runtime version requested from the remote API
    pub version: &'static str,
    /// Runnable on the local fallback when the remote API is unreachable
    pub local: bool,
}

pub fn supported_languages() -> Vec<LanguageInfo> {
    Language::ALL
        .iter()
        .map(|language| LanguageInfo {
            name: language.as_str(),
            version: language.remote_runtime().version,
            local: *language == LOCAL_LANGUAGE,
        })
        .collect()
}
