//! Body scanning: wikilinks and ATX headings.

use hivemind_core::{Heading, Wikilink};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // [[target]] or [[target|alias]]; target captured verbatim.
    static ref WIKILINK_RE: Regex =
        Regex::new(r"\[\[([^\[\]|]+)(?:\|([^\[\]]+))?\]\]").expect("static regex");
    static ref HEADING_RE: Regex =
        Regex::new(r"(?m)^(#{1,6})[ \t]+(.+?)[ \t]*\r?$").expect("static regex");
}

/// All wikilinks in the body, in order of appearance. Targets are not
/// trimmed, lowercased, or resolved; that happens at graph build.
pub fn extract_wikilinks(body: &str) -> Vec<Wikilink> {
    WIKILINK_RE
        .captures_iter(body)
        .map(|caps| Wikilink {
            target: caps[1].to_string(),
            alias: caps.get(2).map(|m| m.as_str().to_string()),
        })
        .collect()
}

/// All ATX headings with their level and text.
pub fn extract_headings(body: &str) -> Vec<Heading> {
    HEADING_RE
        .captures_iter(body)
        .map(|caps| Heading {
            level: caps[1].len() as u8,
            text: caps[2].to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wikilinks_with_and_without_alias() {
        let links = extract_wikilinks("See [[bob]] and [[The Castle|home]] and [[bob]] again.");
        assert_eq!(links.len(), 3);
        assert_eq!(links[0], Wikilink::new("bob"));
        assert_eq!(links[1], Wikilink::aliased("The Castle", "home"));
    }

    #[test]
    fn targets_are_verbatim() {
        let links = extract_wikilinks("[[ Spaced Target ]]");
        assert_eq!(links[0].target, " Spaced Target ");
    }

    #[test]
    fn malformed_brackets_are_ignored() {
        assert!(extract_wikilinks("[single] [[unclosed [[]]").is_empty());
        assert!(extract_wikilinks("no links here").is_empty());
    }

    #[test]
    fn headings_capture_level_and_text() {
        let headings = extract_headings("# Title\n\ntext\n\n## Sub  Heading   \n###### Deep\n");
        assert_eq!(headings.len(), 3);
        assert_eq!(headings[0].level, 1);
        assert_eq!(headings[0].text, "Title");
        assert_eq!(headings[1].level, 2);
        assert_eq!(headings[1].text, "Sub  Heading");
        assert_eq!(headings[2].level, 6);
    }

    #[test]
    fn hash_without_space_is_not_a_heading() {
        assert!(extract_headings("#hashtag\n").is_empty());
    }
}
