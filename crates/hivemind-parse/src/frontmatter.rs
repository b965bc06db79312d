//! Frontmatter block handling: split, parse, and write back.

use hivemind_core::{FmMap, FmValue};

use crate::ParseError;

/// The two halves of a Markdown file.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitDocument {
    /// Raw YAML between the fences, `None` when the file has no block.
    pub block: Option<String>,
    /// Everything after the closing fence (or the whole file).
    pub body: String,
}

/// Split a document on `---` fences at the very top.
///
/// A file whose first line is not a fence has no frontmatter; a file
/// that opens a fence and never closes it is malformed.
pub fn split_frontmatter(text: &str) -> Result<SplitDocument, ParseError> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next().unwrap_or("");
    if first.trim_end_matches(['\r', '\n']) != "---" {
        return Ok(SplitDocument {
            block: None,
            body: text.to_string(),
        });
    }

    let mut block = String::new();
    let mut consumed = first.len();
    for line in lines {
        consumed += line.len();
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Ok(SplitDocument {
                block: Some(block),
                body: text[consumed..].to_string(),
            });
        }
        block.push_str(line);
    }
    Err(ParseError::UnterminatedFrontmatter)
}

/// Parse the YAML block into the shared value model.
pub fn parse_block(block: &str) -> Result<FmMap, ParseError> {
    if block.trim().is_empty() {
        return Ok(FmMap::new());
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(block).map_err(|e| ParseError::Yaml(e.to_string()))?;
    match value {
        serde_yaml::Value::Mapping(mapping) => mapping_to_fm(mapping),
        serde_yaml::Value::Null => Ok(FmMap::new()),
        _ => Err(ParseError::NotAMap),
    }
}

fn mapping_to_fm(mapping: serde_yaml::Mapping) -> Result<FmMap, ParseError> {
    let mut out = FmMap::new();
    for (key, value) in mapping {
        let key = key
            .as_str()
            .map(str::to_string)
            .ok_or(ParseError::NonStringKey)?;
        out.insert(key, yaml_to_fm(value)?);
    }
    Ok(out)
}

fn yaml_to_fm(value: serde_yaml::Value) -> Result<FmValue, ParseError> {
    Ok(match value {
        serde_yaml::Value::Null => FmValue::Null,
        serde_yaml::Value::Bool(b) => FmValue::Bool(b),
        serde_yaml::Value::Number(n) => FmValue::Number(yaml_number(n)?),
        // Scalars of temporal shape are promoted to typed dates here so
        // they survive a write-back unquoted.
        serde_yaml::Value::String(s) => FmValue::from_scalar_str(&s),
        serde_yaml::Value::Sequence(items) => FmValue::Array(
            items
                .into_iter()
                .map(yaml_to_fm)
                .collect::<Result<_, _>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => FmValue::Map(mapping_to_fm(mapping)?),
        serde_yaml::Value::Tagged(tagged) => yaml_to_fm(tagged.value)?,
    })
}

fn yaml_number(n: serde_yaml::Number) -> Result<serde_json::Number, ParseError> {
    if let Some(i) = n.as_i64() {
        Ok(serde_json::Number::from(i))
    } else if let Some(u) = n.as_u64() {
        Ok(serde_json::Number::from(u))
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .ok_or_else(|| ParseError::Yaml(format!("unrepresentable number: {n}")))
    }
}

/// Render a frontmatter map back to a fenced YAML block, dates in their
/// original shapes.
pub fn to_yaml(frontmatter: &FmMap) -> String {
    let mapping = fm_map_to_yaml(frontmatter);
    let rendered = serde_yaml::to_string(&serde_yaml::Value::Mapping(mapping))
        .unwrap_or_else(|_| String::from("{}\n"));
    format!("---\n{rendered}---\n")
}

fn fm_map_to_yaml(map: &FmMap) -> serde_yaml::Mapping {
    map.iter()
        .map(|(k, v)| (serde_yaml::Value::String(k.clone()), fm_to_yaml(v)))
        .collect()
}

fn fm_to_yaml(value: &FmValue) -> serde_yaml::Value {
    match value {
        FmValue::Null => serde_yaml::Value::Null,
        FmValue::Bool(b) => serde_yaml::Value::Bool(*b),
        FmValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_yaml::Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                serde_yaml::Value::Number(u.into())
            } else {
                serde_yaml::Value::Number(n.as_f64().unwrap_or(0.0).into())
            }
        }
        // Plain scalars: YAML leaves these unquoted, so they re-parse as
        // dates.
        FmValue::Date(d) => serde_yaml::Value::String(d.format("%Y-%m-%d").to_string()),
        FmValue::DateTime(dt) => serde_yaml::Value::String(dt.to_rfc3339()),
        FmValue::String(s) => serde_yaml::Value::String(s.clone()),
        FmValue::Array(items) => {
            serde_yaml::Value::Sequence(items.iter().map(fm_to_yaml).collect())
        }
        FmValue::Map(map) => serde_yaml::Value::Mapping(fm_map_to_yaml(map)),
    }
}

/// Replace the frontmatter block inside a document, leaving the body
/// byte-for-byte untouched. Used by the fix workflow.
pub fn update_frontmatter_text(text: &str, frontmatter: &FmMap) -> Result<String, ParseError> {
    let split = split_frontmatter(text)?;
    Ok(format!("{}{}", to_yaml(frontmatter), split.body))
}
