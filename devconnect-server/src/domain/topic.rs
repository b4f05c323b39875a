use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Topic {
    pub(crate) id: &'static str,
    pub(crate) name: &'static str,
}

pub(crate) const AVAILABLE_TOPICS: &[Topic] = &[
    Topic { id: "javascript", name: "JavaScript" },
    Topic { id: "typescript", name: "TypeScript" },
    Topic { id: "react", name: "React" },
    Topic { id: "vue", name: "Vue.js" },
    Topic { id: "angular", name: "Angular" },
    Topic { id: "nodejs", name: "Node.js" },
    Topic { id: "python", name: "Python" },
    Topic { id: "java", name: "Java" },
    Topic { id: "csharp", name: "C#" },
    Topic { id: "php", name: "PHP" },
    Topic { id: "css", name: "CSS" },
    Topic { id: "html", name: "HTML" },
    Topic { id: "database", name: "Database" },
    Topic { id: "devops", name: "DevOps" },
    Topic { id: "mobile", name: "Mobile Dev" },
    Topic { id: "ai", name: "AI/ML" },
    Topic { id: "career", name: "Career" },
    Topic { id: "tutorial", name: "Tutorial" },
    Topic { id: "question", name: "Question" },
    Topic { id: "discussion", name: "Discussion" },
];

pub(crate) fn find_topic(id: &str) -> Option<&'static Topic> {
    AVAILABLE_TOPICS.iter().find(|topic| topic.id == id)
}

/// Lowercases, deduplicates (first occurrence wins) and checks every id against the catalog.
pub(crate) fn normalize_topics(topics: &[String]) -> Result<Vec<String>, DomainError> {
    let mut normalized: Vec<String> = Vec::with_capacity(topics.len());
    for raw in topics {
        let id = raw.trim().to_ascii_lowercase();
        if find_topic(&id).is_none() {
            return Err(DomainError::Validation {
                field: "topics",
                message: "contains an unknown topic",
            });
        }
        if !normalized.contains(&id) {
            normalized.push(id);
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::{AVAILABLE_TOPICS, find_topic, normalize_topics};

    #[test]
    fn catalog_has_unique_ids() {
        let mut ids: Vec<_> = AVAILABLE_TOPICS.iter().map(|topic| topic.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), AVAILABLE_TOPICS.len());
        assert_eq!(AVAILABLE_TOPICS.len(), 20);
    }

    #[test]
    fn find_topic_returns_display_name() {
        assert_eq!(find_topic("csharp").map(|topic| topic.name), Some("C#"));
        assert!(find_topic("cobol").is_none());
    }

    #[test]
    fn normalize_topics_dedups_and_lowercases() {
        let topics = vec![
            " TypeScript ".to_string(),
            "tutorial".to_string(),
            "typescript".to_string(),
        ];
        let normalized = normalize_topics(&topics).expect("topics are valid");
        assert_eq!(normalized, vec!["typescript", "tutorial"]);
    }

    #[test]
    fn normalize_topics_rejects_unknown() {
        let topics = vec!["rust-but-not-listed".to_string()];
        assert!(normalize_topics(&topics).is_err());
    }
}
