use std::sync::LazyLock;

use regex::Regex;

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)extract:(.*)$").unwrap());

/// The options carried by an opening marker line,
/// e.g. `<!-- extract:components/button.html category:Forms wrap:<div>:</div> -->`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directive {
    pub path: String,
    pub wrap: Option<(String, String)>,
    pub properties: Vec<(String, String)>,
}

impl Directive {
    pub fn parse(line: &str) -> Directive {
        let Some(caps) = DIRECTIVE_RE.captures(line) else {
            return Directive::default();
        };
        let rest = caps[1].trim();
        let rest = rest.strip_suffix("-->").unwrap_or(rest).trim_end();

        let mut tokens = tokenize(rest).into_iter();
        let mut directive = Directive {
            path: tokens.next().unwrap_or_default().to_string(),
            ..Default::default()
        };

        for token in tokens {
            let Some((key, value)) = token.split_once(':') else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            if key.eq_ignore_ascii_case("wrap") {
                let (before, after) = split_wrap(value);
                directive.wrap = Some((before.to_string(), after.to_string()));
                continue;
            }
            match directive.properties.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = value.to_string(),
                None => directive.properties.push((key.to_string(), value.to_string())),
            }
        }

        directive
    }

    /// Path with separators normalised, leading `/` and `./` and the extension dropped.
    pub fn id(&self) -> Option<String> {
        let path = self.path.replace('\\', "/");
        let path = path.trim_start_matches('/').trim_start_matches("./");
        if path.is_empty() {
            return None;
        }
        let stem = match path.rfind('.') {
            Some(dot) if dot > path.rfind('/').map_or(0, |s| s + 1) => &path[..dot],
            _ => path,
        };
        Some(stem.to_string())
    }
}

/// Whitespace-separated tokens; whitespace inside `<...>` does not split.
fn tokenize(rest: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in rest.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    tokens.push(&rest[s..i]);
                }
                continue;
            }
            _ => {}
        }
        start.get_or_insert(i);
    }
    if let Some(s) = start {
        tokens.push(&rest[s..]);
    }
    tokens
}

/// `<div class="a:b">:</div>` splits at the first `:` after the first `>`.
fn split_wrap(value: &str) -> (&str, &str) {
    let from = value.find('>').map_or(0, |gt| gt + 1);
    match value[from..].find(':') {
        Some(colon) => (&value[..from + colon], &value[from + colon + 1..]),
        None => (value, ""),
    }
}
