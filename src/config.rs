use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::Result;

pub const DEFAULT_CONFIG_FILE: &str = "partialx";
pub const ENV_PREFIX: &str = "PARTIALX";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wrap {
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
}

impl Wrap {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Wrap {
            before: before.into(),
            after: after.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

/// Run configuration, threaded by reference through every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all(serialize = "camelCase"))]
pub struct Options {
    /// Directory for individual partial files.
    pub partials: PathBuf,
    pub ext: String,
    /// JSON report path; `None` skips writing it.
    #[serde(deserialize_with = "storage_setting")]
    pub storage: Option<PathBuf>,
    #[serde(alias = "storePartials")]
    pub store_partials: bool,
    pub indent: String,
    #[serde(alias = "templateWrap")]
    pub template_wrap: Wrap,
    #[serde(alias = "viewWrap")]
    pub view_wrap: Wrap,
    /// Caller overrides; take precedence over extracted page resources.
    pub resources: Map<String, Value>,
    /// Reject documents with unbalanced markers instead of keeping partial blocks.
    pub strict: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            partials: PathBuf::from("./dist/partials/"),
            ext: ".html".to_string(),
            storage: Some(PathBuf::from("./dist/partial-extract.json")),
            store_partials: false,
            indent: "  ".to_string(),
            template_wrap: Wrap::new(r#"<template id="partial" {{wrapData}}>"#, "</template>"),
            view_wrap: Wrap::new("", ""),
            resources: Map::new(),
            strict: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StorageSetting {
    Toggle(bool),
    Path(String),
}

// `false` and "" both disable the report; `true` keeps the default path.
fn storage_setting<'de, D>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let setting = Option::<StorageSetting>::deserialize(deserializer)?;
    Ok(match setting {
        None | Some(StorageSetting::Toggle(false)) => None,
        Some(StorageSetting::Toggle(true)) => Options::default().storage,
        Some(StorageSetting::Path(p)) if p.trim().is_empty() || p == "false" => None,
        Some(StorageSetting::Path(p)) => Some(PathBuf::from(p)),
    })
}

/// Layer defaults, an optional config file and `PARTIALX_*` environment variables.
///
/// Without an explicit `file`, `partialx.{toml,json,yaml,...}` in the working
/// directory is used when present. Nested keys are separated by `__` in the
/// environment, e.g. `PARTIALX_TEMPLATE_WRAP__BEFORE`.
pub fn load(file: Option<&Path>) -> Result<Options> {
    load_with(file, environment())
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn load_with(file: Option<&Path>, env: config::Environment) -> Result<Options> {
    let mut builder = config::Config::builder();

    builder = match file {
        Some(path) => builder.add_source(config::File::from(path).required(true)),
        None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
    };

    let settings = builder.add_source(env).build()?;

    Ok(settings.try_deserialize::<Options>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let o = Options::default();
        assert_eq!(o.ext, ".html");
        assert_eq!(o.indent, "  ");
        assert!(!o.store_partials);
        assert!(!o.strict);
        assert_eq!(o.storage.as_deref(), Some(Path::new("./dist/partial-extract.json")));
        assert!(o.template_wrap.before.contains("{{wrapData}}"));
        assert!(o.view_wrap.is_empty());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
partials = "out/partials"
store_partials = true
storage = false
indent = "    "

[view_wrap]
before = "<div class=\"ctx\">"
after = "</div>"

[resources]
meta = []
"#
        )
        .unwrap();

        let o = load(Some(file.path())).unwrap();
        assert_eq!(o.partials, PathBuf::from("out/partials"));
        assert!(o.store_partials);
        assert!(o.storage.is_none());
        assert_eq!(o.indent, "    ");
        assert_eq!(o.view_wrap, Wrap::new("<div class=\"ctx\">", "</div>"));
        assert!(o.resources.contains_key("meta"));
        // untouched keys keep their defaults
        assert_eq!(o.ext, ".html");
        assert_eq!(o.template_wrap, Options::default().template_wrap);
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "ext = \".tpl\"\nindent = \"\\t\"").unwrap();

        let mut vars = config::Map::new();
        vars.insert("PARTIALX_STORE_PARTIALS".to_string(), "true".to_string());
        vars.insert("PARTIALX_EXT".to_string(), ".njk".to_string());
        vars.insert("PARTIALX_TEMPLATE_WRAP__BEFORE".to_string(), "<x-partial>".to_string());
        vars.insert("UNRELATED_EXT".to_string(), ".txt".to_string());

        let o = load_with(Some(file.path()), environment().source(Some(vars))).unwrap();
        assert!(o.store_partials);
        assert_eq!(o.ext, ".njk");
        assert_eq!(o.indent, "\t");
        assert_eq!(o.template_wrap.before, "<x-partial>");
        // a wrap given only in part is taken as a whole
        assert_eq!(o.template_wrap.after, "");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(load(Some(Path::new("does/not/exist.toml"))).is_err());
    }

    #[test]
    fn empty_storage_disables_report() {
        let o: Options = serde_json::from_str(r#"{"storage": ""}"#).unwrap();
        assert!(o.storage.is_none());
        let o: Options = serde_json::from_str(r#"{"storage": "a/b.json"}"#).unwrap();
        assert_eq!(o.storage, Some(PathBuf::from("a/b.json")));
    }

    #[test]
    fn serializes_camel_case() {
        let v = serde_json::to_value(Options::default()).unwrap();
        assert!(v.get("storePartials").is_some());
        assert!(v.get("templateWrap").is_some());
        assert!(v.get("viewWrap").is_some());
    }
}
