use diesel::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::identities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Identity {
    pub id: i32,
    pub traits: JsonValue,
}

impl Identity {
    pub fn get_traits(&self) -> Traits {
        Traits::from(self.traits.clone())
    }
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Traits {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl From<JsonValue> for Traits {
    fn from(value: JsonValue) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Identity traits have an unexpected shape");
            Traits::default()
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_traits_from_json() {
        let traits = Traits::from(serde_json::json!({
            "email": "reader@example.com",
            "name": "Reader",
        }));
        assert_eq!(traits.name.as_deref(), Some("Reader"));

        let partial = Traits::from(serde_json::json!({ "name": "Only name" }));
        assert_eq!(partial.email, None);

        let broken = Traits::from(serde_json::json!([1, 2, 3]));
        assert_eq!(broken, Traits::default());
    }

    #[test]
    fn test_identity_reads_traits() {
        let identity = Identity {
            id: 7,
            traits: serde_json::json!({ "name": "Reader" }),
        };
        assert_eq!(identity.get_traits().name.as_deref(), Some("Reader"));
        assert_eq!(identity.get_traits().email, None);
    }
}
