//! Web assets compiled into the binary

/// The dashboard page
pub const INDEX_HTML: &str = include_str!("../templates/index.html");

/// Files served under `/static/`, keyed by their path below it
const STATIC_FILES: &[(&str, &[u8])] = &[
    ("utils/main.js", include_bytes!("../static/utils/main.js")),
    ("css/app.css", include_bytes!("../static/css/app.css")),
];

/// An embedded static file with its content type
#[derive(Debug, Clone, Copy)]
pub struct Asset {
    pub content_type: &'static str,
    pub bytes: &'static [u8],
}

/// Look up `path` (relative to `/static/`)
pub fn static_asset(path: &str) -> Option<Asset> {
    let path = path.trim_start_matches('/');

    STATIC_FILES
        .iter()
        .find(|(name, _)| *name == path)
        .map(|(name, bytes)| Asset {
            content_type: mime_guess::from_path(name)
                .first_raw()
                .unwrap_or("application/octet-stream"),
            bytes,
        })
}
