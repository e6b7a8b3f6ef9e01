//! Search query construction.

use crate::models::Hospital;

/// Builder for search queries with quoted phrases and site: operators.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    site: Option<String>,
    terms: Vec<String>,
    phrases: Vec<String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the search to a specific domain.
    pub fn site(mut self, domain: &str) -> Self {
        self.site = Some(domain.to_string());
        self
    }

    /// Add a bare search term.
    pub fn term(mut self, term: &str) -> Self {
        if !term.is_empty() {
            self.terms.push(term.to_string());
        }
        self
    }

    /// Add an exact phrase match.
    pub fn phrase(mut self, phrase: &str) -> Self {
        if !phrase.is_empty() {
            self.phrases.push(phrase.to_string());
        }
        self
    }

    pub fn build(&self) -> String {
        let mut parts = Vec::new();

        if let Some(ref site) = self.site {
            parts.push(format!("site:{site}"));
        }
        for term in &self.terms {
            parts.push(term.clone());
        }
        for phrase in &self.phrases {
            parts.push(format!("\"{phrase}\""));
        }

        parts.join(" ")
    }
}

/// Queries for one hospital, in the order they should be tried.
///
/// The first queries combine identity with disclosure vocabulary; when
/// the hospital's website is known a site-restricted query goes last so
/// the open-web queries keep priority.
pub fn hospital_queries(hospital: &Hospital) -> Vec<String> {
    let base = hospital.search_query_base();

    let mut queries = vec![
        QueryBuilder::new()
            .term(&base)
            .phrase("price transparency")
            .build(),
        QueryBuilder::new()
            .term(&base)
            .phrase("standard charges")
            .build(),
        QueryBuilder::new().term(&base).term("chargemaster").build(),
        QueryBuilder::new()
            .term(&base)
            .phrase("machine readable")
            .term("prices")
            .build(),
    ];

    if let Some(domain) = hospital.website.as_deref().and_then(domain_of) {
        queries.push(
            QueryBuilder::new()
                .site(&domain)
                .phrase("standard charges")
                .build(),
        );
    }

    queries
}

fn domain_of(website: &str) -> Option<String> {
    let with_scheme = if website.contains("://") {
        website.to_string()
    } else {
        format!("https://{website}")
    };
    url::Url::parse(&with_scheme)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_with_phrase() {
        let query = QueryBuilder::new()
            .site("example.org")
            .phrase("standard charges")
            .build();
        assert_eq!(query, "site:example.org \"standard charges\"");
    }

    #[test]
    fn terms_and_phrases_ordered() {
        let query = QueryBuilder::new()
            .term("Mercy Hospital Springfield")
            .phrase("price transparency")
            .build();
        assert_eq!(query, "Mercy Hospital Springfield \"price transparency\"");
    }

    #[test]
    fn hospital_queries_include_site_restriction() {
        let hospital = Hospital::new("h1", "Mercy Hospital", "MO")
            .with_city("Springfield")
            .with_website("https://www.mercy.net/");

        let queries = hospital_queries(&hospital);
        assert!(queries.len() >= 5);
        assert!(queries[0].contains("Mercy Hospital"));
        assert!(queries[0].contains("price transparency"));
        assert!(queries.last().unwrap().contains("site:mercy.net"));
    }

    #[test]
    fn hospital_queries_without_website() {
        let hospital = Hospital::new("h2", "General Hospital", "TX");
        let queries = hospital_queries(&hospital);
        assert!(queries.iter().all(|q| !q.contains("site:")));
    }
}
