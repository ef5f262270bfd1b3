//! Deterministic per-intent parameter extraction.
//!
//! Regex patterns, path detection, quoted strings, and directory keyword
//! resolution. No model involvement: even advisor-recommended intents get
//! their parameters from here.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Bare filenames with a known extension, or quoted names.
static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)"([^"]+)"|'([^']+)'|\b([\w\-]+\.(?:txt|py|md|json|yaml|yml|csv|log|html|css|js|ts|xml|ini|cfg|pdf|docx?|xlsx?|pptx?|jpg|png|gif|svg|sh|bat|rb|java|c|cpp|h|rs|go))\b"#,
    )
    .expect("valid regex")
});

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(https?://[^\s,;"'>]+)"#).expect("valid regex"));

static BARE_HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b((?:www\.)?[a-z0-9\-]+\.(?:com|org|net|io|dev))\b").expect("valid regex"));

static QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)"|'([^']+)'"#).expect("valid regex"));

static NAMED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bnamed\s+(\S+)").expect("valid regex"));

static CONTENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bcontent\s+["']([^"']+)["']"#).expect("valid regex")
});

static APP_AFTER_VERB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:launch|start|open|boot)\s+(\w+)").expect("valid regex"));

static PACKAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\binstall\s+(\S+)").expect("valid regex"));

static SETTING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:setting|config)\s+(\S+)\s+to\s+(\S+)").expect("valid regex")
});

static SEARCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:search(?:\s+the\s+web)?(?:\s+for)?|look\s+up)\s+(.+)$").expect("valid regex")
});

/// Directory keywords resolved to home-relative paths.
const DIR_KEYWORDS: &[(&str, &str)] = &[
    ("desktop", "~/Desktop"),
    ("downloads", "~/Downloads"),
    ("documents", "~/Documents"),
    ("home", "~"),
];

/// Known application names accepted without clarification.
pub(crate) const KNOWN_APPS: &[&str] = &[
    "notepad", "calculator", "calc", "chrome", "firefox", "edge", "spotify", "vscode", "code",
    "terminal", "cmd", "powershell", "explorer", "vlc", "teams", "slack", "discord", "obs",
    "gimp", "paint", "word", "excel", "outlook",
];

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).and_then(|caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().to_string())
    })
}

fn find_filename(text: &str) -> Option<String> {
    first_capture(&FILENAME_RE, text)
}

fn find_directory(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    DIR_KEYWORDS
        .iter()
        .find(|(kw, _)| lower.contains(kw))
        .map(|(_, path)| (*path).to_string())
}

/// Extract parameters for `intent` from `text`.
#[must_use]
pub fn extract_parameters(intent: &str, text: &str) -> Map<String, Value> {
    let mut params = Map::new();
    match intent {
        "create_file" | "write_file" => {
            let name = first_capture(&NAMED_RE, text).or_else(|| find_filename(text));
            if let Some(name) = name {
                params.insert("path".into(), name.into());
            }
            if let Some(content) = first_capture(&CONTENT_RE, text) {
                params.insert("content".into(), content.into());
            }
            if let Some(dir) = find_directory(text) {
                params.insert("directory".into(), dir.into());
            }
        }
        "read_file" | "delete_file" => {
            if let Some(name) = find_filename(text) {
                params.insert("path".into(), name.into());
            }
        }
        "open_url" => {
            let url = first_capture(&URL_RE, text).or_else(|| {
                first_capture(&BARE_HOST_RE, text).map(|host| format!("https://{host}"))
            });
            if let Some(url) = url {
                params.insert("url".into(), url.into());
            }
        }
        "launch_app" => {
            let lower = text.to_lowercase();
            let known = KNOWN_APPS
                .iter()
                .find(|app| {
                    lower
                        .split(|c: char| !c.is_alphanumeric())
                        .any(|token| token == **app)
                })
                .map(|app| (*app).to_string());
            let app = known.or_else(|| {
                first_capture(&APP_AFTER_VERB_RE, text)
                    .filter(|a| !matches!(a.as_str(), "file" | "the" | "it" | "url" | "website"))
            });
            if let Some(app) = app {
                params.insert("app_name".into(), app.into());
            }
        }
        "install_software" => {
            if let Some(package) = first_capture(&PACKAGE_RE, text) {
                params.insert("package".into(), package.into());
            }
        }
        "change_config" => {
            if let Some(caps) = SETTING_RE.captures(text) {
                params.insert("setting".into(), caps[1].to_string().into());
                params.insert("value".into(), caps[2].to_string().into());
            }
        }
        "search_web" => {
            let query = first_capture(&SEARCH_RE, text)
                .or_else(|| first_capture(&QUOTED_RE, text));
            if let Some(query) = query {
                params.insert("query".into(), query.into());
            }
        }
        _ => {}
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_filename_by_extension() {
        let params = extract_parameters("delete_file", "delete notes.txt");
        assert_eq!(params["path"], "notes.txt");
    }

    #[test]
    fn extracts_quoted_filename() {
        let params = extract_parameters("create_file", "create file 'shopping list.txt'");
        assert_eq!(params["path"], "shopping list.txt");
    }

    #[test]
    fn named_keyword_beats_extension_scan() {
        let params = extract_parameters("create_file", "create a file named journal.md");
        assert_eq!(params["path"], "journal.md");
    }

    #[test]
    fn extracts_url_with_protocol() {
        let params = extract_parameters("open_url", "open https://google.com please");
        assert_eq!(params["url"], "https://google.com");
    }

    #[test]
    fn bare_hosts_get_https() {
        let params = extract_parameters("open_url", "open google.com");
        assert_eq!(params["url"], "https://google.com");
    }

    #[test]
    fn known_app_is_recognized() {
        let params = extract_parameters("launch_app", "launch spotify for me");
        assert_eq!(params["app_name"], "spotify");
    }

    #[test]
    fn unknown_word_after_verb_is_taken_as_app() {
        let params = extract_parameters("launch_app", "launch zenplayer");
        assert_eq!(params["app_name"], "zenplayer");
    }

    #[test]
    fn stopwords_are_not_apps() {
        let params = extract_parameters("launch_app", "launch the");
        assert!(params.get("app_name").is_none());
    }

    #[test]
    fn directory_keywords_resolve() {
        let params = extract_parameters("create_file", "create notes.txt in downloads");
        assert_eq!(params["directory"], "~/Downloads");
    }

    #[test]
    fn content_extraction_from_quotes() {
        let params =
            extract_parameters("write_file", r#"write file a.txt with content "hello there""#);
        assert_eq!(params["path"], "a.txt");
        assert_eq!(params["content"], "hello there");
    }

    #[test]
    fn config_setting_and_value() {
        let params = extract_parameters("change_config", "change setting volume to 50");
        assert_eq!(params["setting"], "volume");
        assert_eq!(params["value"], "50");
    }

    #[test]
    fn missing_parameters_yield_empty_map() {
        let params = extract_parameters("delete_file", "delete it");
        assert!(params.is_empty());
    }
}
