use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static HEAD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<head(.*)</head>").unwrap());
static BODY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<body(.*)</body>").unwrap());
static ROOT_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)<html.+class="([^"]*)">"#).unwrap());
static BODY_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)<body.+class="([^"]*)">"#).unwrap());
static META_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<meta[^>]+>").unwrap());
static STYLESHEET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)<link.+rel="stylesheet".*>"#).unwrap());
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)href="([^"]+)""#).unwrap());
static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<style[^>]*?>(?s:.)*?</style>").unwrap());
static STYLE_INNER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>(.*)</style>").unwrap());
static SCRIPT_SRC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)<script.+src=".*>"#).unwrap());
static SRC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)src="([^"]+)""#).unwrap());
static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<script(?:.+type="[^"]+")?>(?s:.)*?</script>"#).unwrap());
static SCRIPT_INNER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>(.*)</script>").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classnames {
    pub root: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    pub files: Vec<String>,
    pub inline: Vec<String>,
}

/// Page-level resources of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub classnames: Classnames,
    pub meta: Vec<String>,
    pub scripts_foot: Assets,
    pub scripts_head: Assets,
    pub styles_head: Assets,
}

/// Collect scripts, styles, meta tags and classnames.
///
/// `<head>` yields stylesheets, inline styles, scripts and meta tags; `<body>`
/// only yields scripts. A missing section leaves its fields empty.
pub fn extract(src: &str) -> Resources {
    let head = section(&HEAD_RE, src);
    let body = section(&BODY_RE, src);

    let mut data = Resources {
        classnames: Classnames {
            root: first_capture(&ROOT_CLASS_RE, src),
            body: first_capture(&BODY_CLASS_RE, src),
        },
        ..Default::default()
    };

    if !head.is_empty() {
        data.styles_head.files = stylesheets(head);
        data.styles_head.inline = inline_styles(head);
        data.scripts_head.files = script_files(head);
        data.scripts_head.inline = inline_scripts(head);
        data.meta = META_RE.find_iter(head).map(|m| m.as_str().to_string()).collect();
    }

    if !body.is_empty() {
        data.scripts_foot.files = script_files(body);
        data.scripts_foot.inline = inline_scripts(body);
    }

    data
}

fn section<'a>(re: &Regex, src: &'a str) -> &'a str {
    re.captures(src)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("")
}

fn first_capture(re: &Regex, src: &str) -> String {
    re.captures(src).map(|c| c[1].to_string()).unwrap_or_default()
}

fn stylesheets(src: &str) -> Vec<String> {
    STYLESHEET_RE
        .find_iter(src)
        .filter_map(|m| HREF_RE.captures(m.as_str()).map(|c| c[1].to_string()))
        .collect()
}

fn script_files(src: &str) -> Vec<String> {
    SCRIPT_SRC_RE
        .find_iter(src)
        .filter_map(|m| SRC_RE.captures(m.as_str()).map(|c| c[1].to_string()))
        .collect()
}

// Tags are found lazily, then the body is re-read greedily from each match.
fn inline_styles(src: &str) -> Vec<String> {
    STYLE_RE
        .find_iter(src)
        .filter_map(|m| STYLE_INNER_RE.captures(m.as_str()).map(|c| c[1].to_string()))
        .collect()
}

// Only `<script>` and `<script ... type="...">` qualify as inline.
fn inline_scripts(src: &str) -> Vec<String> {
    SCRIPT_RE
        .find_iter(src)
        .filter_map(|m| SCRIPT_INNER_RE.captures(m.as_str()).map(|c| c[1].to_string()))
        .collect()
}
