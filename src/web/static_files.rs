use std::path::{Path, PathBuf};

use mime_guess::mime;
use percent_encoding::percent_decode_str;

const COLLECTOR_PREFIX: &str = "/collector";

/// The two directories the asset server exposes.
#[derive(Debug, Clone)]
pub struct AssetRoots {
    dashboard: PathBuf,
    collector: PathBuf,
}

impl AssetRoots {
    pub fn new(dashboard: impl Into<PathBuf>, collector: impl Into<PathBuf>) -> Self {
        Self {
            dashboard: dashboard.into(),
            collector: collector.into(),
        }
    }

    pub fn dashboard(&self) -> &Path {
        &self.dashboard
    }

    pub fn collector(&self) -> &Path {
        &self.collector
    }

    /// Map a request URL to an existing file under one of the roots.
    ///
    /// `/collector` and everything below it map into the collector root;
    /// every other path maps into the dashboard root. Directories resolve
    /// to their `index.html`. Returns `None` for missing files and for any
    /// path that tries to leave its root.
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        let path = url.split(['?', '#']).next().unwrap_or(url);

        let (root, rest) = match path.strip_prefix(COLLECTOR_PREFIX) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => (&self.collector, rest),
            _ => (&self.dashboard, path),
        };

        let mut resolved = root.clone();
        for raw in rest.split('/') {
            let segment = decode_segment(raw)?;
            match segment.as_str() {
                "" | "." => continue,
                ".." => return None,
                s if s.contains(['/', '\\', '\0']) => return None,
                s => resolved.push(s),
            }
        }

        if resolved.is_dir() {
            resolved.push("index.html");
        }

        resolved.is_file().then_some(resolved)
    }
}

/// Decode `%XX` escapes. `None` when the result is not UTF-8.
fn decode_segment(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// Content-Type for a file, by extension. Text types are served as UTF-8.
pub fn content_type_for(path: &Path) -> String {
    let guess = mime_guess::from_path(path).first_or_octet_stream();
    if guess.type_() == mime::TEXT && guess.get_param(mime::CHARSET).is_none() {
        format!("{guess}; charset=utf-8")
    } else {
        guess.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn layout() -> (tempfile::TempDir, AssetRoots) {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dir.path().join("dashboard");
        let collector = dir.path().join("collector");
        fs::create_dir_all(dashboard.join("css")).unwrap();
        fs::create_dir_all(&collector).unwrap();
        fs::write(dashboard.join("index.html"), "").unwrap();
        fs::write(dashboard.join("css").join("main.css"), "").unwrap();
        fs::write(dashboard.join("risk report.txt"), "").unwrap();
        fs::write(collector.join("collector.js"), "").unwrap();
        fs::write(collector.join("index.html"), "").unwrap();
        fs::write(dir.path().join("secret.txt"), "").unwrap();
        (dir, AssetRoots::new(dashboard, collector))
    }

    #[test]
    fn resolves_files_under_dashboard_root() {
        let (_dir, roots) = layout();
        let css = roots.resolve("/css/main.css").unwrap();
        assert!(css.ends_with("dashboard/css/main.css"));
        assert!(roots.resolve("/").unwrap().ends_with("dashboard/index.html"));
    }

    #[test]
    fn resolves_collector_prefix() {
        let (_dir, roots) = layout();
        assert!(
            roots
                .resolve("/collector/collector.js")
                .unwrap()
                .ends_with("collector/collector.js")
        );
        assert!(
            roots
                .resolve("/collector")
                .unwrap()
                .ends_with("collector/index.html")
        );
    }

    #[test]
    fn collector_prefix_requires_segment_boundary() {
        let (_dir, roots) = layout();
        assert!(roots.resolve("/collectorjs").is_none());
    }

    #[test]
    fn decodes_percent_escapes() {
        let (_dir, roots) = layout();
        assert!(roots.resolve("/risk%20report.txt").is_some());
        assert!(roots.resolve("/bad%zz").is_none());
    }

    #[test]
    fn escapes_need_two_hex_digits() {
        assert_eq!(decode_segment("%+1").as_deref(), Some("%+1"));
        assert_eq!(decode_segment("%-f").as_deref(), Some("%-f"));
        assert_eq!(decode_segment("a%20b").as_deref(), Some("a b"));
        assert_eq!(decode_segment("%ff"), None);
    }

    #[test]
    fn rejects_paths_outside_roots() {
        let (_dir, roots) = layout();
        assert!(roots.resolve("/../secret.txt").is_none());
        assert!(roots.resolve("/collector/../../secret.txt").is_none());
        assert!(roots.resolve("/%2e%2e/secret.txt").is_none());
        assert!(roots.resolve("/css%2f..%2f..%2fsecret.txt").is_none());
    }

    #[test]
    fn missing_files_resolve_to_none() {
        let (_dir, roots) = layout();
        assert!(roots.resolve("/missing.js").is_none());
        assert!(roots.resolve("/css/").is_none());
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(
            content_type_for(Path::new("a/index.HTML")),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            content_type_for(Path::new("css/main.css")),
            "text/css; charset=utf-8"
        );
        assert_eq!(content_type_for(Path::new("logo.png")), "image/png");
        assert_eq!(
            content_type_for(Path::new("blob")),
            "application/octet-stream"
        );
    }
}
