use regex::RegexBuilder;
use uuid::Uuid;

use crate::domain::error::DomainError;

/// Upper bound on the compiled size of a caller-supplied pattern.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Typed list parameters, already coerced at the REST boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub include_deleted: bool,
    pub age_in: Option<Vec<i32>>,
    pub age_nin: Option<Vec<i32>>,
    pub name_regex: Option<String>,
    pub has_phone: Option<bool>,
}

/// A validated, case-insensitive name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern(String);

impl NamePattern {
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        RegexBuilder::new(raw)
            .case_insensitive(true)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|e| DomainError::invalid_pattern(e.to_string()))?;
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Pattern handed to the store's REGEXP function.
    pub fn case_insensitive(&self) -> String {
        format!("(?i){}", self.0)
    }
}

/// One independent predicate; a filter is the conjunction of its clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterClause {
    NotDeleted,
    AgeIn(Vec<i32>),
    AgeNotIn(Vec<i32>),
    NameMatches(NamePattern),
    HasPhone(bool),
    IdAfter(Uuid),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    clauses: Vec<FilterClause>,
}

impl UserFilter {
    /// Matches every record, deleted or not.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn active_only() -> Self {
        Self {
            clauses: vec![FilterClause::NotDeleted],
        }
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn and(mut self, clause: FilterClause) -> Self {
        self.clauses.push(clause);
        self
    }
}

/// Accumulates optional clauses; absent inputs add nothing.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    clauses: Vec<FilterClause>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        if !include {
            self.clauses.push(FilterClause::NotDeleted);
        }
        self
    }

    pub fn age_in(mut self, ages: Option<Vec<i32>>) -> Self {
        if let Some(ages) = ages {
            self.clauses.push(FilterClause::AgeIn(ages));
        }
        self
    }

    pub fn age_not_in(mut self, ages: Option<Vec<i32>>) -> Self {
        if let Some(ages) = ages {
            self.clauses.push(FilterClause::AgeNotIn(ages));
        }
        self
    }

    pub fn name_matches(mut self, pattern: Option<&str>) -> Result<Self, DomainError> {
        if let Some(raw) = pattern {
            self.clauses
                .push(FilterClause::NameMatches(NamePattern::new(raw)?));
        }
        Ok(self)
    }

    pub fn has_phone(mut self, has: Option<bool>) -> Self {
        if let Some(has) = has {
            self.clauses.push(FilterClause::HasPhone(has));
        }
        self
    }

    pub fn id_after(mut self, after: Option<Uuid>) -> Self {
        if let Some(id) = after {
            self.clauses.push(FilterClause::IdAfter(id));
        }
        self
    }

    pub fn build(self) -> UserFilter {
        UserFilter {
            clauses: self.clauses,
        }
    }

    pub fn from_params(params: &ListParams) -> Result<UserFilter, DomainError> {
        Ok(Self::new()
            .include_deleted(params.include_deleted)
            .age_in(params.age_in.clone())
            .age_not_in(params.age_nin.clone())
            .name_matches(params.name_regex.as_deref())?
            .has_phone(params.has_phone)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_params_means_active_only() {
        let f = FilterBuilder::from_params(&ListParams::default()).unwrap();
        assert_eq!(f, UserFilter::active_only());
    }

    #[test]
    fn include_deleted_drops_the_state_clause() {
        let f = FilterBuilder::from_params(&ListParams {
            include_deleted: true,
            ..Default::default()
        })
        .unwrap();
        assert!(f.clauses().is_empty());
    }

    #[test]
    fn age_sets_combine() {
        let f = FilterBuilder::from_params(&ListParams {
            age_in: Some(vec![20, 30, 40]),
            age_nin: Some(vec![30]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            f.clauses(),
            &[
                FilterClause::NotDeleted,
                FilterClause::AgeIn(vec![20, 30, 40]),
                FilterClause::AgeNotIn(vec![30]),
            ]
        );
    }

    #[test]
    fn invalid_pattern_is_a_client_error() {
        let err = FilterBuilder::new().name_matches(Some("(unclosed")).unwrap_err();
        assert!(matches!(err, DomainError::InvalidPattern { .. }));
    }

    #[test]
    fn pattern_is_sent_case_insensitive() {
        let p = NamePattern::new("^jo").unwrap();
        assert_eq!(p.as_str(), "^jo");
        assert_eq!(p.case_insensitive(), "(?i)^jo");
    }

    #[test]
    fn phone_and_cursor_clauses() {
        let id = Uuid::now_v7();
        let f = FilterBuilder::new()
            .has_phone(Some(false))
            .id_after(Some(id))
            .build();
        assert_eq!(
            f.clauses(),
            &[FilterClause::HasPhone(false), FilterClause::IdAfter(id)]
        );
        assert_eq!(
            UserFilter::all().and(FilterClause::NotDeleted),
            UserFilter::active_only()
        );
    }
}
