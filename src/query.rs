//! Viewer query strings: `?url=<media>&stereo=<mode>`.

use reqwest::Url;

use crate::media::StereoMode;

const PARSE_BASE: &str = "http://viewer.local/";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewerParams {
    /// Media address from `url`, or `src` when `url` is absent.
    pub media: Option<String>,
    pub stereo: StereoMode,
}

/// Parses a query string, with or without its leading `?`.
pub fn parse_query(query: &str) -> ViewerParams {
    let pairs = query_pairs(query.trim_start_matches('?'));
    let lookup = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    };
    ViewerParams {
        media: lookup("url").or_else(|| lookup("src")),
        stereo: lookup("stereo")
            .map(|raw| StereoMode::from_query_value(&raw))
            .unwrap_or_default(),
    }
}

/// Accepts whatever a user may paste: a bare query string, a full viewer link,
/// a media address carrying only a `stereo` hint, or a plain media address.
pub fn parse_viewer_input(raw: &str) -> ViewerParams {
    let raw = raw.trim();
    if raw.starts_with('?') {
        return parse_query(raw);
    }
    let Some((address, query)) = raw.split_once('?') else {
        return ViewerParams {
            media: (!raw.is_empty()).then(|| raw.to_string()),
            stereo: StereoMode::None,
        };
    };

    let params = parse_query(query);
    if params.media.is_some() {
        return params;
    }
    let only_stereo = query_pairs(query).iter().all(|(k, _)| k == "stereo");
    if only_stereo {
        ViewerParams {
            media: Some(address.to_string()),
            stereo: params.stereo,
        }
    } else {
        ViewerParams {
            media: Some(raw.to_string()),
            stereo: StereoMode::None,
        }
    }
}

fn query_pairs(query: &str) -> Vec<(String, String)> {
    match Url::parse(&format!("{PARSE_BASE}?{query}")) {
        Ok(url) => url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        Err(_) => Vec::new(),
    }
}
