//! The fix workflow: folder-mapper-driven type suggestions, dry-run by
//! default, atomic writes on apply.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use hivemind_core::FmValue;
use hivemind_io::{scan_vault, write_atomic, ScanOptions};
use hivemind_parse::{parse_file, update_frontmatter_text};
use hivemind_template::{FolderMapper, MapConfidence};

/// One proposed change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixChange {
    pub path: PathBuf,
    pub current_type: Option<String>,
    pub suggested_type: String,
    /// `exact` suggestions are safe to apply; `ambiguous` ones list the
    /// first candidate and need a human.
    pub confidence: MapConfidence,
    pub candidates: Vec<String>,
}

/// The dry-run output.
#[derive(Debug, Default, Serialize)]
pub struct FixPlan {
    pub changes: Vec<FixChange>,
    pub files_scanned: usize,
}

/// Propose a `type` for every file whose frontmatter lacks one (or
/// disagrees with its folder), based on the mapper's candidates.
pub fn plan_fixes(
    root: &Path,
    mapper: &FolderMapper,
    ignore: &[String],
) -> Result<FixPlan, hivemind_error::Error> {
    let files = scan_vault(
        root,
        &ScanOptions {
            excludes: ignore.to_vec(),
        },
    )?;
    let mut plan = FixPlan {
        files_scanned: files.len(),
        ..Default::default()
    };

    for path in &files {
        let Ok(note) = parse_file(path) else {
            continue;
        };
        let resolved = mapper.resolve(&path.display().to_string());
        let constrained = matches!(
            resolved.confidence,
            MapConfidence::Exact | MapConfidence::Ambiguous | MapConfidence::Fallback
        );
        if !constrained {
            continue;
        }
        let current = note.entity_type().map(str::to_string);
        let already_fine = current
            .as_deref()
            .is_some_and(|t| resolved.types.iter().any(|c| c == t));
        if already_fine {
            continue;
        }
        let Some(suggested) = resolved.types.first().cloned() else {
            continue;
        };
        plan.changes.push(FixChange {
            path: path.clone(),
            current_type: current,
            suggested_type: suggested,
            confidence: resolved.confidence,
            candidates: resolved.types,
        });
    }
    Ok(plan)
}

/// Apply a plan: rewrite each file's frontmatter `type` through a temp
/// file + rename. Only `exact` and `fallback` suggestions are applied;
/// ambiguous ones are left for the user. Returns the number of files
/// rewritten.
pub fn apply_fixes(plan: &FixPlan) -> Result<usize, hivemind_error::Error> {
    let mut applied = 0usize;
    for change in &plan.changes {
        if change.confidence == MapConfidence::Ambiguous {
            continue;
        }
        let note = parse_file(&change.path).map_err(|e| e.into_domain(&change.path))?;
        let mut frontmatter = note.frontmatter.clone();
        frontmatter.insert(
            "type".to_string(),
            FmValue::String(change.suggested_type.clone()),
        );
        let original = std::fs::read_to_string(&change.path).map_err(|e| {
            hivemind_io::IoError::Io {
                path: change.path.clone(),
                message: e.to_string(),
            }
        })?;
        let updated = update_frontmatter_text(&original, &frontmatter)
            .map_err(|e| e.into_domain(&change.path))?;
        write_atomic(&change.path, updated.as_bytes())?;
        applied += 1;
        info!(path = %change.path.display(), ty = %change.suggested_type, "fixed type");
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivemind_template::FolderMappingRule;

    fn mapper() -> FolderMapper {
        FolderMapper::new(
            &[
                FolderMappingRule {
                    pattern: "**/Characters/**".into(),
                    types: vec!["character".into()],
                },
                FolderMappingRule {
                    pattern: "**/Mixed/**".into(),
                    types: vec!["character".into(), "location".into()],
                },
            ],
            None,
        )
        .unwrap()
    }

    fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn plans_only_for_missing_or_mismatched_types() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "Characters/alice.md", "---\nid: alice\n---\nBody.\n");
        write(
            root,
            "Characters/bob.md",
            "---\nid: bob\ntype: character\n---\n",
        );
        write(root, "Elsewhere/misc.md", "---\nid: misc\n---\n");

        let plan = plan_fixes(root, &mapper(), &[]).unwrap();
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].suggested_type, "character");
        assert_eq!(plan.changes[0].confidence, MapConfidence::Exact);
    }

    #[test]
    fn apply_rewrites_atomically_and_preserves_body() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let path = write(
            root,
            "Characters/alice.md",
            "---\nid: alice\n---\n# Alice\n\nBody stays.\n",
        );

        let plan = plan_fixes(root, &mapper(), &[]).unwrap();
        let applied = apply_fixes(&plan).unwrap();
        assert_eq!(applied, 1);

        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("type: character"));
        assert!(rewritten.ends_with("# Alice\n\nBody stays.\n"));

        // Idempotent: a second plan finds nothing to do.
        let plan = plan_fixes(root, &mapper(), &[]).unwrap();
        assert!(plan.changes.is_empty());
    }

    #[test]
    fn ambiguous_suggestions_are_planned_but_not_applied() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "Mixed/thing.md", "---\nid: thing\n---\n");

        let plan = plan_fixes(root, &mapper(), &[]).unwrap();
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].confidence, MapConfidence::Ambiguous);
        assert_eq!(plan.changes[0].candidates.len(), 2);

        let applied = apply_fixes(&plan).unwrap();
        assert_eq!(applied, 0);
    }
}
