use crate::domain::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Email,
    Age,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw {
            "name" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            "age" => Ok(Self::Age),
            "createdAt" => Ok(Self::CreatedAt),
            "updatedAt" => Ok(Self::UpdatedAt),
            other => Err(DomainError::validation(
                "sortBy",
                format!("unsupported sort field '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" | "1" => Ok(Self::Asc),
            "desc" | "-1" => Ok(Self::Desc),
            other => Err(DomainError::validation(
                "sortOrder",
                format!("expected asc or desc, got '{other}'"),
            )),
        }
    }
}

/// Sort for offset pagination. Newest-created-first unless overridden;
/// the repository appends `id` in the same direction as a tiebreaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl SortSpec {
    /// A field without an order sorts ascending; an order alone applies to `createdAt`.
    pub fn parse(sort_by: Option<&str>, sort_order: Option<&str>) -> Result<Self, DomainError> {
        match (sort_by, sort_order) {
            (None, None) => Ok(Self::default()),
            (Some(by), order) => Ok(Self {
                field: SortField::parse(by)?,
                order: order.map(SortOrder::parse).transpose()?.unwrap_or(SortOrder::Asc),
            }),
            (None, Some(order)) => Ok(Self {
                field: SortField::CreatedAt,
                order: SortOrder::parse(order)?,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_newest_first() {
        assert_eq!(SortSpec::parse(None, None).unwrap(), SortSpec::default());
        assert_eq!(SortSpec::default().order, SortOrder::Desc);
    }

    #[test]
    fn numeric_orders_are_accepted() {
        let s = SortSpec::parse(Some("age"), Some("-1")).unwrap();
        assert_eq!(s.field, SortField::Age);
        assert_eq!(s.order, SortOrder::Desc);
        assert_eq!(SortOrder::parse("ASC").unwrap(), SortOrder::Asc);
    }

    #[test]
    fn field_without_order_is_ascending() {
        let s = SortSpec::parse(Some("name"), None).unwrap();
        assert_eq!(s.order, SortOrder::Asc);
    }

    #[test]
    fn unknown_field_or_order_is_rejected() {
        assert!(SortSpec::parse(Some("password"), None).is_err());
        assert!(SortSpec::parse(Some("name"), Some("sideways")).is_err());
    }
}
