use crate::constants::NAME_PLACEHOLDER;

/// Expands the query templates for one name, keeping template order and
/// dropping duplicates and blanks.
pub fn build_queries(name: &str, templates: &[String]) -> Vec<String> {
    let name = name.trim();
    let mut queries: Vec<String> = Vec::with_capacity(templates.len());

    for template in templates {
        let query = template.replace(NAME_PLACEHOLDER, name).trim().to_string();
        if !query.is_empty() && !queries.contains(&query) {
            queries.push(query);
        }
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_QUERY_TEMPLATES;

    fn defaults() -> Vec<String> {
        DEFAULT_QUERY_TEMPLATES.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn default_templates_in_order() {
        let queries = build_queries("Jim Gaffigan", &defaults());
        assert_eq!(
            queries,
            vec![
                "Jim Gaffigan comedian instagram",
                "Jim Gaffigan stand up comedy instagram",
                "Jim Gaffigan instagram profile",
                "\"Jim Gaffigan\" instagram comedian",
            ]
        );
    }

    #[test]
    fn duplicates_and_blank_templates_are_dropped() {
        let templates = vec![
            "{name} instagram".to_string(),
            "   ".to_string(),
            "{name} instagram".to_string(),
            "{name}".to_string(),
        ];
        assert_eq!(
            build_queries("Sam Morril", &templates),
            vec!["Sam Morril instagram", "Sam Morril"]
        );
    }
}
