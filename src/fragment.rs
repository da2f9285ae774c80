use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::config::{Options, Wrap};
use crate::parser::blocks::{is_marker_line, split_lines};
use crate::parser::directive::Directive;

/// One extracted partial, ready to be stored or listed in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub id: String,
    pub filename: String,
    #[serde(serialize_with = "as_map")]
    pub properties: Vec<(String, String)>,
    pub template: String,
    pub view: String,
    pub origin: String,
}

impl Fragment {
    /// Build a fragment from a block's raw text. Same text and options give the same fragment.
    pub fn parse(block: &str, options: &Options) -> Fragment {
        let lines: Vec<&str> = split_lines(block).collect();
        let directive = lines.first().map(|l| Directive::parse(l)).unwrap_or_default();

        let id = directive.id().unwrap_or_else(|| content_id(block));
        let body = body_of(&lines);

        let view_wrap = match &directive.wrap {
            Some((before, after)) => Wrap::new(before.as_str(), after.as_str()),
            None => options.view_wrap.clone(),
        };

        Fragment {
            template: render_template(&body, &directive.properties, options),
            view: wrap_lines(&view_wrap, &body),
            id,
            filename: directive.path,
            properties: directive.properties,
            origin: String::new(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

fn as_map<S: Serializer>(pairs: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(pairs.iter().map(|(k, v)| (k, v)))
}

fn content_id(block: &str) -> String {
    let digest = Sha256::digest(block.as_bytes());
    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("partial-{}", hex)
}

/// Lines between the outer markers, nested markers removed, dedented.
fn body_of(lines: &[&str]) -> Vec<String> {
    let inner: Vec<&str> = match lines.len() {
        0 | 1 => Vec::new(),
        n => lines[1..n - 1].iter().copied().filter(|l| !is_marker_line(l)).collect(),
    };

    let margin = inner
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut body: Vec<String> = inner
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                l.get(margin..).unwrap_or(l.trim_start()).trim_end().to_string()
            }
        })
        .collect();

    while body.last().is_some_and(|l| l.is_empty()) {
        body.pop();
    }
    while body.first().is_some_and(|l| l.is_empty()) {
        body.remove(0);
    }
    body
}

fn render_template(body: &[String], properties: &[(String, String)], options: &Options) -> String {
    let wrap = &options.template_wrap;
    if wrap.is_empty() {
        return body.join("\n");
    }

    let data = properties
        .iter()
        .map(|(k, v)| format!("data-{}=\"{}\"", k, v.replace('"', "&quot;")))
        .collect::<Vec<_>>()
        .join(" ");
    let before = if data.is_empty() {
        wrap.before.replace(" {{wrapData}}", "").replace("{{wrapData}}", "")
    } else {
        wrap.before.replace("{{wrapData}}", &data)
    };

    let indented: Vec<String> = body
        .iter()
        .map(|l| if l.is_empty() { String::new() } else { format!("{}{}", options.indent, l) })
        .collect();

    wrap_lines(&Wrap::new(before, wrap.after.as_str()), &indented)
}

fn wrap_lines(wrap: &Wrap, body: &[String]) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(body.len() + 2);
    if !wrap.before.is_empty() {
        out.push(&wrap.before);
    }
    out.extend(body.iter().map(String::as_str));
    if !wrap.after.is_empty() {
        out.push(&wrap.after);
    }
    out.join("\n")
}
