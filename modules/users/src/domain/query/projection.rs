use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::contract::model::User;
use crate::domain::error::DomainError;

/// A projected user as returned over the wire.
pub type Document = Map<String, Value>;

/// Fields a caller may ask for. The internal `version` counter has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    Id,
    Name,
    Email,
    EmailLower,
    Age,
    Phone,
    IsDeleted,
    DeletedAt,
    DeletedBy,
    DeleteReason,
    CreatedAt,
    UpdatedAt,
}

impl UserField {
    pub const ALL: [UserField; 12] = [
        UserField::Id,
        UserField::Name,
        UserField::Email,
        UserField::EmailLower,
        UserField::Age,
        UserField::Phone,
        UserField::IsDeleted,
        UserField::DeletedAt,
        UserField::DeletedBy,
        UserField::DeleteReason,
        UserField::CreatedAt,
        UserField::UpdatedAt,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::Name => "name",
            UserField::Email => "email",
            UserField::EmailLower => "emailLower",
            UserField::Age => "age",
            UserField::Phone => "phone",
            UserField::IsDeleted => "isDeleted",
            UserField::DeletedAt => "deletedAt",
            UserField::DeletedBy => "deletedBy",
            UserField::DeleteReason => "deleteReason",
            UserField::CreatedAt => "createdAt",
            UserField::UpdatedAt => "updatedAt",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.wire_name() == name)
    }

    /// `None` means the field is absent on this record and is left out.
    fn value_of(self, user: &User) -> Option<Value> {
        match self {
            UserField::Id => Some(Value::String(user.id.to_string())),
            UserField::Name => Some(Value::String(user.name.clone())),
            UserField::Email => Some(Value::String(user.email.clone())),
            UserField::EmailLower => Some(Value::String(user.email_lower.clone())),
            UserField::Age => user.age.map(Value::from),
            UserField::Phone => user.phone.clone().map(Value::String),
            UserField::IsDeleted => Some(Value::Bool(user.is_deleted)),
            UserField::DeletedAt => user.deleted_at.map(timestamp),
            UserField::DeletedBy => user.deleted_by.clone().map(Value::String),
            UserField::DeleteReason => user.delete_reason.clone().map(Value::String),
            UserField::CreatedAt => Some(timestamp(user.created_at)),
            UserField::UpdatedAt => Some(timestamp(user.updated_at)),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Excluded from the default projection unless asked for explicitly.
const HIDDEN_BY_DEFAULT: [UserField; 2] = [UserField::IsDeleted, UserField::DeletedAt];

const BASIC: [UserField; 5] = [
    UserField::Id,
    UserField::Name,
    UserField::Email,
    UserField::Age,
    UserField::CreatedAt,
];

const ADMIN: [UserField; 12] = [
    UserField::Id,
    UserField::Name,
    UserField::Email,
    UserField::Age,
    UserField::CreatedAt,
    UserField::Phone,
    UserField::EmailLower,
    UserField::IsDeleted,
    UserField::DeletedAt,
    UserField::DeletedBy,
    UserField::DeleteReason,
    UserField::UpdatedAt,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Basic,
    Admin,
}

/// The `fields` request parameter, classified once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldSelection {
    #[default]
    Default,
    Preset(Preset),
    Explicit(Vec<String>),
}

impl FieldSelection {
    /// `None` or blank → `Default`; `basic`/`admin` → preset; otherwise a
    /// comma-separated list of names (blank entries dropped).
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::Default;
        };
        match raw {
            "basic" => Self::Preset(Preset::Basic),
            "admin" => Self::Preset(Preset::Admin),
            list => Self::Explicit(
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect(),
            ),
        }
    }
}

/// Concrete, ordered set of fields to render. Always contains `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<UserField>,
}

impl Projection {
    pub fn resolve(selection: &FieldSelection) -> Result<Self, DomainError> {
        match selection {
            FieldSelection::Default => Ok(Self::default_view()),
            FieldSelection::Preset(Preset::Basic) => Ok(Self::basic()),
            FieldSelection::Preset(Preset::Admin) => Ok(Self::admin()),
            FieldSelection::Explicit(names) => Self::explicit(names),
        }
    }

    pub fn default_view() -> Self {
        Self {
            fields: UserField::ALL
                .into_iter()
                .filter(|f| !HIDDEN_BY_DEFAULT.contains(f))
                .collect(),
        }
    }

    pub fn basic() -> Self {
        Self {
            fields: BASIC.to_vec(),
        }
    }

    pub fn admin() -> Self {
        Self {
            fields: ADMIN.to_vec(),
        }
    }

    fn explicit(names: &[String]) -> Result<Self, DomainError> {
        if names.is_empty() {
            return Err(DomainError::validation("fields", "at least one field is required"));
        }

        let mut invalid: Vec<String> = Vec::new();
        let mut fields = vec![UserField::Id];
        for name in names {
            match UserField::from_wire(name) {
                Some(f) if !fields.contains(&f) => fields.push(f),
                Some(_) => {}
                None if !invalid.contains(name) => invalid.push(name.clone()),
                None => {}
            }
        }

        if !invalid.is_empty() {
            return Err(DomainError::invalid_fields(invalid));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[UserField] {
        &self.fields
    }

    pub fn includes(&self, field: UserField) -> bool {
        self.fields.contains(&field)
    }

    pub fn project(&self, user: &User) -> Document {
        let mut doc = Document::new();
        for field in &self.fields {
            if let Some(v) = field.value_of(user) {
                doc.insert(field.wire_name().to_owned(), v);
            }
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn user() -> User {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        User {
            id: Uuid::now_v7(),
            name: "Ann".into(),
            email: "Ann@Example.com".into(),
            email_lower: "ann@example.com".into(),
            age: Some(30),
            phone: None,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            delete_reason: None,
            version: 3,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn parse_classifies_the_three_shapes() {
        assert_eq!(FieldSelection::parse(None), FieldSelection::Default);
        assert_eq!(FieldSelection::parse(Some("  ")), FieldSelection::Default);
        assert_eq!(
            FieldSelection::parse(Some("basic")),
            FieldSelection::Preset(Preset::Basic)
        );
        assert_eq!(
            FieldSelection::parse(Some("admin")),
            FieldSelection::Preset(Preset::Admin)
        );
        assert_eq!(
            FieldSelection::parse(Some("name, email,")),
            FieldSelection::Explicit(vec!["name".into(), "email".into()])
        );
    }

    #[test]
    fn default_view_hides_deletion_state_and_version() {
        let doc = Projection::default_view().project(&user());
        assert!(doc.contains_key("name"));
        assert!(doc.contains_key("emailLower"));
        assert!(doc.contains_key("updatedAt"));
        assert!(!doc.contains_key("isDeleted"));
        assert!(!doc.contains_key("deletedAt"));
        assert!(!doc.contains_key("version"));
    }

    #[test]
    fn admin_is_a_superset_of_basic() {
        let basic = Projection::basic();
        let admin = Projection::admin();
        assert!(basic.fields().iter().all(|f| admin.includes(*f)));
        assert!(admin.includes(UserField::EmailLower));
        assert!(admin.includes(UserField::DeleteReason));
        assert!(!basic.includes(UserField::Phone));
    }

    #[test]
    fn explicit_list_always_carries_id() {
        let p = Projection::resolve(&FieldSelection::parse(Some("name,isDeleted,name"))).unwrap();
        assert_eq!(
            p.fields(),
            &[UserField::Id, UserField::Name, UserField::IsDeleted]
        );
        let doc = p.project(&user());
        assert_eq!(doc["isDeleted"], Value::Bool(false));
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn unknown_names_are_all_reported() {
        let err = Projection::resolve(&FieldSelection::parse(Some("name,password,version,password")))
            .unwrap_err();
        match err {
            DomainError::InvalidFields { fields } => {
                assert_eq!(fields, vec!["password".to_string(), "version".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_explicit_list_is_rejected() {
        let err = Projection::resolve(&FieldSelection::parse(Some(","))).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn absent_optionals_are_left_out() {
        let doc = Projection::admin().project(&user());
        assert!(!doc.contains_key("phone"));
        assert!(!doc.contains_key("deletedBy"));
        assert_eq!(doc["age"], Value::from(30));
        assert_eq!(doc["createdAt"], "2024-03-01T12:00:00.000Z");
    }
}
