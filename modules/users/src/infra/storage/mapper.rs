use chrono::{DateTime, Utc};
use sea_orm::Set;
use uuid::Uuid;

use crate::contract::model::{NewUser, User};
use crate::infra::storage::entity::{ActiveModel, Model};

impl From<Model> for User {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            email_lower: m.email_lower,
            age: m.age,
            phone: m.phone,
            is_deleted: m.is_deleted,
            deleted_at: m.deleted_at,
            deleted_by: m.deleted_by,
            delete_reason: m.delete_reason,
            version: m.version,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Fresh active row for an insert: new id, `emailLower` derived from `email`.
pub fn new_active_model(u: NewUser, id: Uuid, now: DateTime<Utc>) -> ActiveModel {
    ActiveModel {
        id: Set(id),
        email_lower: Set(u.email.to_lowercase()),
        name: Set(u.name),
        email: Set(u.email),
        age: Set(u.age),
        phone: Set(u.phone),
        is_deleted: Set(false),
        deleted_at: Set(None),
        deleted_by: Set(None),
        delete_reason: Set(None),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ActiveValue;

    #[test]
    fn insert_model_normalizes_email() {
        let now = Utc::now();
        let id = Uuid::now_v7();
        let am = new_active_model(
            NewUser {
                name: "Ann".into(),
                email: "Ann@Example.COM".into(),
                ..Default::default()
            },
            id,
            now,
        );
        assert_eq!(am.email_lower, ActiveValue::Set("ann@example.com".to_string()));
        assert_eq!(am.email, ActiveValue::Set("Ann@Example.COM".to_string()));
        assert_eq!(am.is_deleted, ActiveValue::Set(false));
    }
}
