//! hivemind-parse — turn a Markdown file into a structured [`Note`].
//!
//! Parsing is deliberately shallow: the frontmatter block is full YAML,
//! but the body is only scanned for wikilinks and ATX headings. Parse
//! failures are per-file diagnostics; the ingestion pipeline skips the
//! file and keeps going.

pub mod extract;
pub mod frontmatter;

pub use extract::{extract_headings, extract_wikilinks};
pub use frontmatter::{split_frontmatter, to_yaml, update_frontmatter_text};

use std::path::Path;

use chrono::{DateTime, Utc};
use hivemind_core::{FileStats, FmValue, Note, NoteId};
use hivemind_error::DomainError;

/// Errors raised while parsing a single file. Never fatal to a build.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("unterminated frontmatter block")]
    UnterminatedFrontmatter,

    #[error("invalid frontmatter YAML: {0}")]
    Yaml(String),

    #[error("frontmatter is not a key-value map")]
    NotAMap,

    #[error("frontmatter key is not a string")]
    NonStringKey,

    #[error("file is not valid UTF-8")]
    NotUtf8,

    #[error("io error: {0}")]
    Io(String),
}

impl ParseError {
    pub fn into_domain(self, path: &Path) -> hivemind_error::Error {
        DomainError::Parse {
            path: path.display().to_string(),
            message: self.to_string(),
        }
        .into()
    }
}

/// Parse in-memory file bytes into a [`Note`].
///
/// `stats` is whatever filesystem metadata the caller has; pass
/// `FileStats::default()` in tests.
pub fn parse_bytes(path: &Path, bytes: &[u8], stats: FileStats) -> Result<Note, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::NotUtf8)?;
    parse_source(path, text, stats)
}

/// Parse file text into a [`Note`].
pub fn parse_source(path: &Path, text: &str, stats: FileStats) -> Result<Note, ParseError> {
    let split = split_frontmatter(text)?;
    let frontmatter = match &split.block {
        Some(block) => frontmatter::parse_block(block)?,
        None => Default::default(),
    };

    let id = note_id(&frontmatter);
    let links = extract_wikilinks(&split.body);
    let headings = extract_headings(&split.body);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Note {
        id,
        path: path.to_path_buf(),
        file_name,
        missing_frontmatter: split.block.is_none(),
        frontmatter,
        body: split.body,
        links,
        headings,
        stats,
    })
}

/// Read and parse a file from disk, capturing size and timestamps.
pub fn parse_file(path: &Path) -> Result<Note, ParseError> {
    let bytes = std::fs::read(path).map_err(|e| ParseError::Io(e.to_string()))?;
    let stats = read_stats(path, bytes.len() as u64);
    parse_bytes(path, &bytes, stats)
}

fn read_stats(path: &Path, size: u64) -> FileStats {
    let meta = std::fs::metadata(path).ok();
    let to_utc = |t: std::io::Result<std::time::SystemTime>| -> Option<DateTime<Utc>> {
        t.ok().map(DateTime::<Utc>::from)
    };
    FileStats {
        size,
        created: meta.as_ref().and_then(|m| to_utc(m.created())),
        modified: meta.as_ref().and_then(|m| to_utc(m.modified())),
    }
}

/// Id derivation: `frontmatter.id` when present and non-empty; numbers
/// are accepted and stringified. Anything else leaves the note
/// unadmitted.
fn note_id(frontmatter: &hivemind_core::FmMap) -> Option<NoteId> {
    match frontmatter.get("id") {
        Some(FmValue::String(s)) if !s.trim().is_empty() => Some(NoteId::new(s.clone())),
        Some(FmValue::Number(n)) => Some(NoteId::new(n.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivemind_core::Wikilink;
    use std::path::PathBuf;

    const ALICE: &str = "---\nid: alice\ntype: character\nname: Alice\n---\n# Alice\n\nShe knows [[bob]] and lives in [[The Castle|home]].\n";

    fn parse(text: &str) -> Note {
        parse_source(
            &PathBuf::from("/vault/alice.md"),
            text,
            FileStats::default(),
        )
        .unwrap()
    }

    #[test]
    fn parses_frontmatter_body_links_and_headings() {
        let note = parse(ALICE);
        assert_eq!(note.id, Some(NoteId::from("alice")));
        assert_eq!(note.entity_type(), Some("character"));
        assert!(!note.missing_frontmatter);
        assert!(note.body.starts_with("# Alice"));
        assert_eq!(
            note.links,
            vec![
                Wikilink::new("bob"),
                Wikilink::aliased("The Castle", "home")
            ]
        );
        assert_eq!(note.headings.len(), 1);
        assert_eq!(note.headings[0].level, 1);
        assert_eq!(note.headings[0].text, "Alice");
    }

    #[test]
    fn file_without_frontmatter_is_flagged() {
        let note = parse("Just some text with [[a link]].\n");
        assert!(note.missing_frontmatter);
        assert!(note.frontmatter.is_empty());
        assert_eq!(note.id, None);
        assert_eq!(note.body, "Just some text with [[a link]].\n");
    }

    #[test]
    fn empty_id_is_not_admitted() {
        let note = parse("---\nid: \"\"\ntype: character\n---\nbody\n");
        assert_eq!(note.id, None);
    }

    #[test]
    fn numeric_id_is_stringified() {
        let note = parse("---\nid: 42\n---\nbody\n");
        assert_eq!(note.id, Some(NoteId::from("42")));
    }

    #[test]
    fn unterminated_frontmatter_is_an_error() {
        let err = parse_source(
            &PathBuf::from("/vault/broken.md"),
            "---\nid: broken\nno closing fence\n",
            FileStats::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedFrontmatter));
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let err = parse_bytes(
            &PathBuf::from("/vault/bin.md"),
            &[0xff, 0xfe, 0x00],
            FileStats::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::NotUtf8));
    }

    #[test]
    fn parse_file_captures_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.md");
        std::fs::write(&path, ALICE).unwrap();
        let note = parse_file(&path).unwrap();
        assert_eq!(note.id, Some(NoteId::from("alice")));
        assert_eq!(note.stats.size, ALICE.len() as u64);
        assert!(note.stats.modified.is_some());
    }

    #[test]
    fn round_trip_preserves_the_value_map() {
        let text = "---\nid: alice\ntype: character\nname: Alice\nborn: 1990-04-01\ntags:\n  - hero\n  - royal\nstrength: 17\nalive: true\n---\nBody text.\n";
        let note = parse(text);
        let rewritten = format!("{}Body text.\n", to_yaml(&note.frontmatter));
        let reparsed = parse(&rewritten);
        assert_eq!(note.frontmatter, reparsed.frontmatter);
        assert!(matches!(
            note.frontmatter.get("born"),
            Some(FmValue::Date(_))
        ));
    }
}
