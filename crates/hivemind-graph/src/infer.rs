//! Relationship inference: which edge type joins two entity types.

use hivemind_template::{fallback_inference, TemplateError, TemplateRegistry};

/// The outcome of inference: the forward type and, for bidirectional
/// types, the reverse to emit alongside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredEdge {
    pub type_id: String,
    pub reverse_id: Option<String>,
}

/// Built-in last resort when nothing narrower applies.
pub const GENERIC_RELATED: &str = "related";

/// Pick the relationship type for a resolved link.
///
/// With an active template, the candidates are the types whose
/// allow-sets admit the pair; the most specific wins (explicit lists on
/// both sides beat a wildcard on either), first-declared breaking ties.
/// Wildcard/wildcard types like the generic `related` therefore only
/// win when nothing narrower matched. Without an active template the
/// built-in fallback table decides.
pub fn infer_relationship_type(
    registry: &TemplateRegistry,
    source_type: &str,
    target_type: &str,
) -> InferredEdge {
    match registry.valid_relationships(source_type, target_type) {
        Ok(candidates) => {
            // First-declared wins among equal specificity, so only a
            // strictly narrower candidate displaces the current best.
            let mut best: Option<&hivemind_template::RelationshipTypeDef> = None;
            for rt in candidates {
                if best.map_or(true, |b| rt.specificity() > b.specificity()) {
                    best = Some(rt);
                }
            }
            match best {
                Some(rt) => InferredEdge {
                    type_id: rt.id.clone(),
                    reverse_id: if rt.bidirectional {
                        rt.reverse_id.clone()
                    } else {
                        None
                    },
                },
                None => InferredEdge {
                    type_id: GENERIC_RELATED.to_string(),
                    reverse_id: None,
                },
            }
        }
        Err(TemplateError::NoActiveTemplate) => {
            let fallback = fallback_inference(source_type, target_type);
            InferredEdge {
                type_id: fallback.type_id.to_string(),
                reverse_id: fallback.reverse_id.map(str::to_string),
            }
        }
        Err(_) => InferredEdge {
            type_id: GENERIC_RELATED.to_string(),
            reverse_id: None,
        },
    }
}
