//! Vault validation: scan, parse, check frontmatter against the active
//! template, classify issues.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;

use hivemind_io::{scan_vault, ScanOptions};
use hivemind_parse::parse_file;
use hivemind_template::{FolderMapper, MapConfidence, TemplateRegistry, Violation};

/// Issue classes, matching the validation surface of the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingFrontmatter,
    MissingField,
    InvalidEnum,
    InvalidType,
    FolderMismatch,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::MissingFrontmatter => "missing_frontmatter",
            IssueKind::MissingField => "missing_field",
            IssueKind::InvalidEnum => "invalid_enum",
            IssueKind::InvalidType => "invalid_type",
            IssueKind::FolderMismatch => "folder_mismatch",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub path: PathBuf,
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

/// Everything one validation run produced.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub files_scanned: usize,
    pub issues: Vec<Issue>,
    /// Files skipped with a parse diagnostic (unreadable, bad YAML).
    pub skipped: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Do not report files that lack frontmatter entirely.
    pub skip_missing: bool,
    /// Extra exclusion globs.
    pub ignore: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Exit code contract: 0 clean, 1 with validation errors.
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_clean())
    }

    /// Console rendering: issues grouped by kind, then by file. Empty on
    /// success (silent).
    pub fn render_console(&self) -> String {
        if self.is_clean() {
            return String::new();
        }
        let mut by_kind: BTreeMap<IssueKind, Vec<&Issue>> = BTreeMap::new();
        for issue in &self.issues {
            by_kind.entry(issue.kind).or_default().push(issue);
        }
        let mut out = String::new();
        for (kind, issues) in by_kind {
            out.push_str(&format!("{} ({}):\n", kind.as_str(), issues.len()));
            for issue in issues {
                out.push_str(&format!(
                    "  {}: {}\n",
                    issue.path.display(),
                    issue.message
                ));
            }
        }
        out.push_str(&format!(
            "\n{} issue(s) across {} file(s)\n",
            self.issues.len(),
            self.files_scanned
        ));
        out
    }

    /// JSON rendering: issues grouped by file plus an aggregated
    /// summary.
    pub fn to_json(&self) -> serde_json::Value {
        let mut by_file: BTreeMap<String, Vec<&Issue>> = BTreeMap::new();
        for issue in &self.issues {
            by_file
                .entry(issue.path.display().to_string())
                .or_default()
                .push(issue);
        }
        let files: serde_json::Map<String, serde_json::Value> = by_file
            .into_iter()
            .map(|(path, issues)| {
                let rendered: Vec<serde_json::Value> = issues
                    .iter()
                    .map(|i| {
                        json!({
                            "kind": i.kind.as_str(),
                            "field": i.field,
                            "message": i.message,
                        })
                    })
                    .collect();
                (path, serde_json::Value::Array(rendered))
            })
            .collect();

        let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
        for issue in &self.issues {
            *by_kind.entry(issue.kind.as_str()).or_default() += 1;
        }

        json!({
            "summary": {
                "filesScanned": self.files_scanned,
                "totalIssues": self.issues.len(),
                "byKind": by_kind,
            },
            "files": files,
            "skipped": self.skipped.iter()
                .map(|(p, e)| json!({ "path": p.display().to_string(), "error": e }))
                .collect::<Vec<_>>(),
        })
    }
}

/// Scan and validate every Markdown file under `root`.
pub fn validate_vault(
    root: &Path,
    registry: &TemplateRegistry,
    mapper: Option<&FolderMapper>,
    options: &ValidateOptions,
) -> Result<ValidationReport, hivemind_error::Error> {
    let scan_options = ScanOptions {
        excludes: options.ignore.clone(),
    };
    let files = scan_vault(root, &scan_options)?;

    let mut report = ValidationReport {
        files_scanned: files.len(),
        ..Default::default()
    };

    for path in &files {
        let note = match parse_file(path) {
            Ok(note) => note,
            Err(e) => {
                report.skipped.push((path.clone(), e.to_string()));
                continue;
            }
        };

        if note.missing_frontmatter {
            if !options.skip_missing {
                report.issues.push(Issue {
                    path: path.clone(),
                    kind: IssueKind::MissingFrontmatter,
                    field: None,
                    message: "file has no frontmatter block".to_string(),
                });
            }
            continue;
        }

        let declared_type = note.entity_type().map(str::to_string);
        let Some(declared_type) = declared_type else {
            report.issues.push(Issue {
                path: path.clone(),
                kind: IssueKind::InvalidType,
                field: Some("type".to_string()),
                message: "frontmatter declares no type".to_string(),
            });
            continue;
        };

        match registry.schema_for(&declared_type) {
            Err(_) => {
                report.issues.push(Issue {
                    path: path.clone(),
                    kind: IssueKind::InvalidType,
                    field: Some("type".to_string()),
                    message: format!("unknown entity type '{declared_type}'"),
                });
            }
            Ok(schema) => {
                if let Err(violations) = schema.validate(&note.frontmatter) {
                    for violation in violations {
                        report.issues.push(issue_from_violation(path, violation));
                    }
                }
            }
        }

        if let Some(mapper) = mapper {
            let resolved = mapper.resolve(&path.display().to_string());
            let constrained = matches!(
                resolved.confidence,
                MapConfidence::Exact | MapConfidence::Ambiguous
            );
            if constrained && !resolved.types.iter().any(|t| *t == declared_type) {
                report.issues.push(Issue {
                    path: path.clone(),
                    kind: IssueKind::FolderMismatch,
                    field: Some("type".to_string()),
                    message: format!(
                        "type '{declared_type}' does not match folder expectation {:?}",
                        resolved.types
                    ),
                });
            }
        }
    }

    Ok(report)
}

fn issue_from_violation(path: &Path, violation: Violation) -> Issue {
    match violation {
        Violation::MissingField { field } => Issue {
            path: path.to_path_buf(),
            kind: IssueKind::MissingField,
            message: format!("missing required field '{field}'"),
            field: Some(field),
        },
        Violation::InvalidEnum {
            field,
            value,
            allowed,
        } => Issue {
            path: path.to_path_buf(),
            kind: IssueKind::InvalidEnum,
            message: format!("'{value}' is not one of {allowed:?}"),
            field: Some(field),
        },
        Violation::InvalidType {
            field,
            expected,
            actual,
        } => Issue {
            path: path.to_path_buf(),
            kind: IssueKind::InvalidType,
            message: format!("expected {expected}, found {actual}"),
            field: Some(field),
        },
        Violation::WrongEntityType { expected, actual } => Issue {
            path: path.to_path_buf(),
            kind: IssueKind::InvalidType,
            field: Some("type".to_string()),
            message: format!("expected type '{expected}', found {actual:?}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivemind_template::{worldbuilding_template, TemplateSource};

    fn registry() -> TemplateRegistry {
        let mut reg = TemplateRegistry::new();
        reg.register(worldbuilding_template(), TemplateSource::Builtin)
            .unwrap();
        reg.activate("worldbuilding").unwrap();
        reg
    }

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn classifies_the_three_canonical_issues() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "bare.md", "no frontmatter here\n");
        write(root, "nameless.md", "---\nid: nameless\ntype: character\n---\n");
        write(
            root,
            "mythical.md",
            "---\nid: mythical\ntype: unicorn\nname: Uni\n---\n",
        );

        let reg = registry();
        let report =
            validate_vault(root, &reg, None, &ValidateOptions::default()).unwrap();
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.issues.len(), 3);

        let kind_for = |name: &str| {
            report
                .issues
                .iter()
                .find(|i| i.path.file_name().unwrap().to_str() == Some(name))
                .map(|i| (i.kind, i.field.clone()))
                .unwrap()
        };
        assert_eq!(kind_for("bare.md"), (IssueKind::MissingFrontmatter, None));
        assert_eq!(
            kind_for("nameless.md"),
            (IssueKind::MissingField, Some("name".to_string()))
        );
        assert_eq!(
            kind_for("mythical.md"),
            (IssueKind::InvalidType, Some("type".to_string()))
        );

        let json = report.to_json();
        assert_eq!(json["summary"]["totalIssues"], 3);
        assert_eq!(json["summary"]["byKind"]["missing_frontmatter"], 1);
        assert_eq!(
            json["files"][root.join("nameless.md").display().to_string()][0]["kind"],
            "missing_field"
        );
    }

    #[test]
    fn clean_vault_is_silent_and_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "alice.md",
            "---\nid: alice\ntype: character\nname: Alice\n---\n",
        );
        let reg = registry();
        let report =
            validate_vault(dir.path(), &reg, None, &ValidateOptions::default()).unwrap();
        assert_eq!(report.exit_code(), 0);
        assert!(report.render_console().is_empty());
    }

    #[test]
    fn skip_missing_suppresses_missing_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bare.md", "plain text\n");
        let reg = registry();
        let options = ValidateOptions {
            skip_missing: true,
            ..Default::default()
        };
        let report = validate_vault(dir.path(), &reg, None, &options).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn folder_mismatch_uses_the_mapper() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "Locations/alice.md",
            "---\nid: alice\ntype: character\nname: Alice\n---\n",
        );
        let reg = registry();
        let mapper = FolderMapper::new(reg.folder_mappings().unwrap(), None).unwrap();
        let report = validate_vault(
            root,
            &reg,
            Some(&mapper),
            &ValidateOptions::default(),
        )
        .unwrap();
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::FolderMismatch);
    }

    #[test]
    fn invalid_enum_is_its_own_kind() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "alice.md",
            "---\nid: alice\ntype: character\nname: Alice\nstatus: legendary\n---\n",
        );
        let reg = registry();
        let report =
            validate_vault(dir.path(), &reg, None, &ValidateOptions::default()).unwrap();
        assert_eq!(report.issues[0].kind, IssueKind::InvalidEnum);
        assert!(report.render_console().contains("invalid_enum"));
    }
}
