use serde::{Deserialize, Serialize};

/// Role of a member. The backing table stores the lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Admin,
    #[default]
    User,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Admin => write!(f, "admin"),
            Permission::User => write!(f, "user"),
        }
    }
}

impl Permission {
    pub fn is_admin(&self) -> bool {
        matches!(self, Permission::Admin)
    }
}

/// A registered participant, created by the signup collaborator.
/// Read-only from the client's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub permission: Permission,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_member_row() {
        let json = r#"{"id": 3, "name": "Achieng Odhiambo", "email": "achieng@example.com", "permission": "admin", "created_at": "2025-01-12T08:00:00+00:00"}"#;
        let member: Member = serde_json::from_str(json).expect("member row should parse");
        assert_eq!(member.id, 3);
        assert_eq!(member.name, "Achieng Odhiambo");
        assert_eq!(member.permission, Permission::Admin);
    }

    #[test]
    fn test_permission_defaults_to_user() {
        let json = r#"{"id": 4, "name": "Baraka Njoroge", "email": "baraka@example.com"}"#;
        let member: Member = serde_json::from_str(json).expect("member row should parse");
        assert_eq!(member.permission, Permission::User);
        assert!(!member.permission.is_admin());
    }

    #[test]
    fn test_permission_display() {
        assert_eq!(Permission::Admin.to_string(), "admin");
        assert_eq!(Permission::User.to_string(), "user");
    }
}
