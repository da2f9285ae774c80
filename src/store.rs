use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::extract::Inventory;

/// What [`persist`] wrote.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Persisted {
    pub partials: usize,
    pub report: Option<PathBuf>,
}

/// Write partial files and the JSON report as `options` asks.
///
/// The inventory itself is never modified, so a failure here leaves the
/// extraction result intact for the caller.
pub fn persist(inventory: &Inventory, options: &Options) -> Result<Persisted> {
    let mut done = Persisted::default();

    if options.store_partials {
        done.partials = write_partials(inventory, &options.partials, &options.ext)?;
    }

    if let Some(path) = &options.storage {
        write_report(inventory, path)?;
        done.report = Some(path.clone());
    }

    Ok(done)
}

/// One `<dir>/<id><ext>` file per unique fragment, holding its template.
///
/// Ids that would resolve outside `dir` are skipped.
pub fn write_partials(inventory: &Inventory, dir: &Path, ext: &str) -> Result<usize> {
    let mut count = 0;
    for fragment in inventory.unique() {
        let Some(relative) = contained(&format!("{}{}", fragment.id, ext)) else {
            warn!("Skipping partial {} from {}: path leaves {}", fragment.id, fragment.origin, dir.display());
            continue;
        };
        let path = dir.join(relative);
        ensure_parent(&path)?;
        fs::write(&path, &fragment.template).map_err(|source| Error::Persist {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote {}", path.display());
        count += 1;
    }
    info!("Stored {} partials in {}", count, dir.display());
    Ok(count)
}

pub fn write_report(inventory: &Inventory, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(inventory)?;
    fs::write(path, json).map_err(|source| Error::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote inventory to {}", path.display());
    Ok(())
}

/// `name` as a path below its base: root dropped, `..` and drive prefixes refused.
fn contained(name: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| Error::Persist {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract;
    use tempfile::TempDir;

    fn inventory(dir: &TempDir) -> Inventory {
        let doc = dir.path().join("page.html");
        fs::write(
            &doc,
            "<!-- extract:card.html -->\n<div>card</div>\n<!-- endextract -->\n<!-- extract:ui/badge.html -->\n<b>1</b>\n<!-- endextract -->\n<!-- extract:card.html -->\n<div>other</div>\n<!-- endextract -->",
        )
        .unwrap();
        extract::run(&[doc], &Options::default()).unwrap()
    }

    #[test]
    fn writes_unique_partials_with_subdirectories() {
        let dir = TempDir::new().unwrap();
        let inv = inventory(&dir);
        assert_eq!(inv.length_total, 3);

        let out = dir.path().join("partials");
        let n = write_partials(&inv, &out, ".html").unwrap();
        assert_eq!(n, 2);
        // first occurrence wins
        let card = fs::read_to_string(out.join("card.html")).unwrap();
        assert!(card.contains("<div>card</div>"));
        assert!(out.join("ui/badge.html").exists());
    }

    #[test]
    fn partials_stay_inside_their_directory() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("page.html");
        fs::write(
            &doc,
            "<!-- extract:/abs/evil.html -->\n<i>a</i>\n<!-- endextract -->\n<!-- extract:../escape.html -->\n<i>b</i>\n<!-- endextract -->\n<!-- extract:ok/../../up.html -->\n<i>c</i>\n<!-- endextract -->",
        )
        .unwrap();
        let inv = extract::run(&[doc], &Options::default()).unwrap();
        assert_eq!(inv.length_unique, 3);

        let out = dir.path().join("out/partials");
        let n = write_partials(&inv, &out, ".html").unwrap();
        assert_eq!(n, 1);
        assert!(out.join("abs/evil.html").exists());
        assert!(!dir.path().join("out/escape.html").exists());
        assert!(!dir.path().join("out/up.html").exists());
    }

    #[test]
    fn contained_paths() {
        assert_eq!(contained("a/b.html"), Some(PathBuf::from("a/b.html")));
        assert_eq!(contained("/a/./b.html"), Some(PathBuf::from("a/b.html")));
        assert_eq!(contained("../b.html"), None);
        assert_eq!(contained("a/../../b.html"), None);
        assert_eq!(contained("/"), None);
    }

    #[test]
    fn report_is_pretty_json() {
        let dir = TempDir::new().unwrap();
        let inv = inventory(&dir);
        let path = dir.path().join("dist/report.json");
        write_report(&inv, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"options\""));
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["lengthTotal"], 3);
        assert_eq!(v["lengthUnique"], 2);
    }

    #[test]
    fn persist_follows_options() {
        let dir = TempDir::new().unwrap();
        let inv = inventory(&dir);

        let options = Options {
            storage: None,
            ..Default::default()
        };
        assert_eq!(persist(&inv, &options).unwrap(), Persisted::default());

        let report = dir.path().join("out/inv.json");
        let options = Options {
            storage: Some(report.clone()),
            store_partials: true,
            partials: dir.path().join("out/partials"),
            ..Default::default()
        };
        let done = persist(&inv, &options).unwrap();
        assert_eq!(done.partials, 2);
        assert_eq!(done.report.as_deref(), Some(report.as_path()));
        assert!(report.exists());
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let inv = inventory(&dir);
        // a file where the parent directory should be
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let err = write_report(&inv, &blocker.join("report.json")).unwrap_err();
        assert!(matches!(err, Error::Persist { .. }));
        assert_eq!(inv.length_total, 3);
    }
}
