//! Error types for scene construction and hierarchy resolution

use thiserror::Error;

/// Errors raised by the scene model and its placement API
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    /// Reference to an entity name that is not in the scene
    #[error("unknown entity '{name}'{}", format_suggestions(suggestions))]
    UnknownEntity {
        name: String,
        suggestions: Vec<String>,
    },

    /// An entity with this name already exists
    #[error("entity '{name}' already exists")]
    DuplicateEntity { name: String },

    /// An entity's placement anchor no longer resolves
    #[error("entity '{entity}' is placed relative to '{parent}', which is not in the scene")]
    DanglingParent { entity: String, parent: String },

    /// Placement anchors form a loop
    #[error("placement hierarchy cycle: {}", cycle.join(" -> "))]
    HierarchyCycle { cycle: Vec<String> },

    /// Out-of-range argument such as a wall or a mesh face index
    #[error("invalid argument '{argument}': {reason}")]
    InvalidArgument { argument: String, reason: String },

    /// The entity has no placement yet, so it has no position
    #[error("entity '{name}' has not been placed")]
    NotPlaced { name: String },
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", suggestions.join(", "))
    }
}

impl SceneError {
    /// Unknown entity error with "did you mean" candidates drawn from `known`
    pub fn unknown<'a>(name: impl Into<String>, known: impl IntoIterator<Item = &'a str>) -> Self {
        let name = name.into();
        let suggestions = find_similar(known, &name, 2);
        Self::UnknownEntity { name, suggestions }
    }

    pub fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    pub fn dangling(entity: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::DanglingParent {
            entity: entity.into(),
            parent: parent.into(),
        }
    }

    pub fn cycle(cycle: Vec<String>) -> Self {
        Self::HierarchyCycle { cycle }
    }

    /// Get suggestions if available
    pub fn suggestions(&self) -> Option<&[String]> {
        match self {
            Self::UnknownEntity { suggestions, .. } => Some(suggestions),
            _ => None,
        }
    }
}

/// Calculate Levenshtein distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Names within `max_distance` edits of `target`, closest first, at most three
fn find_similar<'a>(
    known: impl IntoIterator<Item = &'a str>,
    target: &str,
    max_distance: usize,
) -> Vec<String> {
    let mut candidates: Vec<(&str, usize)> = known
        .into_iter()
        .filter_map(|name| {
            let dist = levenshtein_distance(name, target);
            (dist > 0 && dist <= max_distance).then_some((name, dist))
        })
        .collect();

    candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    candidates
        .into_iter()
        .map(|(name, _)| name.to_string())
        .take(3)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("sofa", "sofa"), 0);
        assert_eq!(levenshtein_distance("table", "tabel"), 2);
        assert_eq!(levenshtein_distance("lamp", "lamps"), 1);
        assert_eq!(levenshtein_distance("", "bed"), 3);
    }

    #[test]
    fn test_unknown_entity_suggests_close_names() {
        let err = SceneError::unknown("tabel", ["table", "chair", "bed"]);
        assert_eq!(err.suggestions(), Some(&["table".to_string()][..]));
        assert_eq!(
            err.to_string(),
            "unknown entity 'tabel' (did you mean table?)"
        );
    }

    #[test]
    fn test_unknown_entity_without_suggestions() {
        let err = SceneError::unknown("wardrobe", ["table"]);
        assert_eq!(err.to_string(), "unknown entity 'wardrobe'");
    }

    #[test]
    fn test_cycle_message() {
        let err = SceneError::cycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "placement hierarchy cycle: a -> b -> a");
    }
}
