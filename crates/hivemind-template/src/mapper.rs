//! Folder mapper: resolve a vault path to entity-type candidates.
//!
//! Rules are compiled once at construction and ordered by a specificity
//! score, so resolution is a single pass over pre-sorted matchers and
//! can never fail at runtime.

use globset::{GlobBuilder, GlobMatcher};

use crate::types::FolderMappingRule;
use crate::TemplateError;

/// How confident the mapper is in its candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MapConfidence {
    /// One candidate type from the winning rule.
    Exact,
    /// Two or more candidate types from the winning rule.
    Ambiguous,
    /// No rule matched but a fallback type was configured.
    Fallback,
    /// No rule matched and no fallback.
    None,
}

/// The mapper's answer for one path.
#[derive(Debug, Clone, PartialEq)]
pub struct MapResult {
    pub types: Vec<String>,
    pub matched_pattern: Option<String>,
    pub confidence: MapConfidence,
}

#[derive(Debug)]
struct CompiledRule {
    pattern: String,
    matcher: GlobMatcher,
    types: Vec<String>,
    score: i64,
}

/// Ordered glob rules plus an optional fallback type.
#[derive(Debug)]
pub struct FolderMapper {
    rules: Vec<CompiledRule>,
    fallback: Option<String>,
}

impl FolderMapper {
    /// Compile the rules; an unparseable glob fails here, never during
    /// resolution. Matching is case-sensitive and `*` does not cross
    /// path separators (only `**` does).
    pub fn new(
        rules: &[FolderMappingRule],
        fallback: Option<String>,
    ) -> Result<Self, TemplateError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let glob = GlobBuilder::new(&rule.pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| TemplateError::InvalidPattern {
                    pattern: rule.pattern.clone(),
                    message: e.to_string(),
                })?;
            compiled.push(CompiledRule {
                pattern: rule.pattern.clone(),
                matcher: glob.compile_matcher(),
                types: rule.types.clone(),
                score: specificity(&rule.pattern),
            });
        }
        // Highest specificity first; the stable sort keeps insertion
        // order among ties.
        compiled.sort_by_key(|r| std::cmp::Reverse(r.score));
        Ok(Self {
            rules: compiled,
            fallback,
        })
    }

    /// Resolve a path against the sorted rules; first match wins.
    pub fn resolve(&self, path: &str) -> MapResult {
        let normalized = path.replace('\\', "/");
        for rule in &self.rules {
            if rule.matcher.is_match(&normalized) {
                let confidence = if rule.types.len() == 1 {
                    MapConfidence::Exact
                } else {
                    MapConfidence::Ambiguous
                };
                return MapResult {
                    types: rule.types.clone(),
                    matched_pattern: Some(rule.pattern.clone()),
                    confidence,
                };
            }
        }
        match &self.fallback {
            Some(fallback) => MapResult {
                types: vec![fallback.clone()],
                matched_pattern: None,
                confidence: MapConfidence::Fallback,
            },
            None => MapResult {
                types: vec![],
                matched_pattern: None,
                confidence: MapConfidence::None,
            },
        }
    }
}

/// Specificity score for rule ordering: longer, more literal patterns
/// beat wildcard-heavy ones.
fn specificity(pattern: &str) -> i64 {
    let len = pattern.len() as i64;
    let segments: Vec<&str> = pattern.split('/').collect();
    let segment_count = segments.len() as i64;
    let literal_segments = segments
        .iter()
        .filter(|s| !s.contains(['*', '?', '[']))
        .count() as i64;
    let doublestar = pattern.matches("**").count() as i64;
    let single_star = pattern.matches('*').count() as i64 - 2 * doublestar;

    len + 8 * segment_count + 12 * literal_segments - 10 * doublestar - 5 * single_star
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, types: &[&str]) -> FolderMappingRule {
        FolderMappingRule {
            pattern: pattern.to_string(),
            types: types.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn more_specific_pattern_wins_regardless_of_order() {
        let mapper = FolderMapper::new(
            &[
                rule("**/People/**", &["character"]),
                rule("**/People/Heroes/**", &["character", "protagonist"]),
            ],
            None,
        )
        .unwrap();

        let result = mapper.resolve("vault/People/Heroes/arthur.md");
        assert_eq!(result.confidence, MapConfidence::Ambiguous);
        assert_eq!(result.types, vec!["character", "protagonist"]);
        assert_eq!(
            result.matched_pattern.as_deref(),
            Some("**/People/Heroes/**")
        );
    }

    #[test]
    fn single_candidate_is_exact() {
        let mapper = FolderMapper::new(&[rule("**/Places/**", &["location"])], None).unwrap();
        let result = mapper.resolve("vault/Places/castle.md");
        assert_eq!(result.confidence, MapConfidence::Exact);
        assert_eq!(result.types, vec!["location"]);
    }

    #[test]
    fn unmatched_path_uses_fallback_when_configured() {
        let mapper = FolderMapper::new(
            &[rule("**/Places/**", &["location"])],
            Some("note".to_string()),
        )
        .unwrap();
        let result = mapper.resolve("vault/Misc/scratch.md");
        assert_eq!(result.confidence, MapConfidence::Fallback);
        assert_eq!(result.types, vec!["note"]);
        assert!(result.matched_pattern.is_none());

        let mapper = FolderMapper::new(&[rule("**/Places/**", &["location"])], None).unwrap();
        let result = mapper.resolve("vault/Misc/scratch.md");
        assert_eq!(result.confidence, MapConfidence::None);
        assert!(result.types.is_empty());
    }

    #[test]
    fn backslashes_are_normalized() {
        let mapper = FolderMapper::new(&[rule("**/People/**", &["character"])], None).unwrap();
        let result = mapper.resolve(r"vault\People\alice.md");
        assert_eq!(result.confidence, MapConfidence::Exact);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let mapper = FolderMapper::new(&[rule("**/People/**", &["character"])], None).unwrap();
        let result = mapper.resolve("vault/people/alice.md");
        assert_eq!(result.confidence, MapConfidence::None);
    }

    #[test]
    fn invalid_glob_fails_at_construction() {
        let err = FolderMapper::new(&[rule("**/People/[bad", &["character"])], None).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidPattern { .. }));
    }

    #[test]
    fn ties_keep_insertion_order() {
        // Identical patterns score identically; the first-declared wins.
        let mapper = FolderMapper::new(
            &[
                rule("**/Same/**", &["character"]),
                rule("**/Same/**", &["location"]),
            ],
            None,
        )
        .unwrap();
        assert_eq!(
            mapper.resolve("x/Same/y.md").types,
            vec!["character".to_string()]
        );
    }

    #[test]
    fn specificity_formula_matches_contract() {
        // "**/People/**": len 12, 3 segments, 1 literal, 2 double stars
        assert_eq!(specificity("**/People/**"), 12 + 24 + 12 - 20);
        // Literal pattern dominates.
        assert!(specificity("vault/People/alice.md") > specificity("**/People/*"));
    }
}
