//! `{{name}}` variable substitution (§4.8.3).

use std::collections::{HashMap, HashSet};

use beads_core::issue::Issue;

use crate::error::{MolError, Result};
use crate::subgraph::Subgraph;

/// Replaces every `{{name}}` occurrence in `text` using `vars`. Unknown
/// placeholders are left untouched -- extraction (below) is what catches
/// missing required variables, not substitution itself.
pub fn substitute(text: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = text[i + 2..].find("}}") {
                let name = text[i + 2..i + 2 + end].trim();
                if let Some(value) = vars.get(name) {
                    out.push_str(value);
                    i += 2 + end + 2;
                    continue;
                }
            }
        }
        out.push(text[i..].chars().next().unwrap());
        i += text[i..].chars().next().unwrap().len_utf8();
    }
    out
}

/// Extracts every distinct `{{name}}` placeholder appearing in any
/// free-form field of any issue in the subgraph.
pub fn extract_all_variables(subgraph: &Subgraph) -> HashSet<String> {
    let mut names = HashSet::new();
    for issue in subgraph.issues.values() {
        for field in free_form_fields(issue) {
            extract_from_text(field, &mut names);
        }
    }
    names
}

fn free_form_fields(issue: &Issue) -> [&str; 5] {
    [
        issue.title.as_str(),
        issue.description.as_str(),
        issue.design.as_str(),
        issue.acceptance_criteria.as_str(),
        issue.notes.as_str(),
    ]
}

fn extract_from_text(text: &str, names: &mut HashSet<String>) {
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        if let Some(end) = after.find("}}") {
            names.insert(after[..end].trim().to_string());
            rest = &after[end + 2..];
        } else {
            break;
        }
    }
}

/// Definition of one template variable: an optional default and whether
/// it's required when no default is present.
#[derive(Debug, Clone)]
pub struct VarSpec {
    pub required: bool,
    pub default: Option<String>,
}

/// Resolves the final variable map from the set of names found in the
/// template, declared specs (defaults/required), and caller-supplied
/// values. A name with no spec is treated as optional with no default --
/// if the caller didn't supply it, it's simply left unsubstituted.
pub fn resolve_variables(
    names: &HashSet<String>,
    specs: &HashMap<String, VarSpec>,
    supplied: &HashMap<String, String>,
) -> Result<HashMap<String, String>> {
    let mut resolved = HashMap::new();
    for name in names {
        if let Some(value) = supplied.get(name) {
            resolved.insert(name.clone(), value.clone());
            continue;
        }
        if let Some(spec) = specs.get(name) {
            if let Some(default) = &spec.default {
                resolved.insert(name.clone(), default.clone());
                continue;
            }
            if spec.required {
                return Err(MolError::MissingVariable(name.clone()));
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "ace".to_string());
        assert_eq!(substitute("hello {{name}}!", &vars), "hello ace!");
    }

    #[test]
    fn leaves_unknown_placeholders() {
        let vars = HashMap::new();
        assert_eq!(substitute("hello {{name}}!", &vars), "hello {{name}}!");
    }

    #[test]
    fn extracts_multiple_distinct_names() {
        let mut names = HashSet::new();
        extract_from_text("{{a}} and {{b}} and {{a}} again", &mut names);
        assert_eq!(names.len(), 2);
        assert!(names.contains("a"));
        assert!(names.contains("b"));
    }

    #[test]
    fn missing_required_variable_errors() {
        let mut names = HashSet::new();
        names.insert("name".to_string());
        let mut specs = HashMap::new();
        specs.insert(
            "name".to_string(),
            VarSpec {
                required: true,
                default: None,
            },
        );
        let err = resolve_variables(&names, &specs, &HashMap::new()).unwrap_err();
        assert!(matches!(err, MolError::MissingVariable(_)));
    }

    #[test]
    fn default_used_when_not_supplied() {
        let mut names = HashSet::new();
        names.insert("name".to_string());
        let mut specs = HashMap::new();
        specs.insert(
            "name".to_string(),
            VarSpec {
                required: false,
                default: Some("ace".to_string()),
            },
        );
        let resolved = resolve_variables(&names, &specs, &HashMap::new()).unwrap();
        assert_eq!(resolved.get("name"), Some(&"ace".to_string()));
    }
}
