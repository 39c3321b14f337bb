//! Storage row types.

use uuid::Uuid;

/// An identity principal.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: Option<String>,
    pub credential_hash: Option<String>,
    pub display_name: Option<String>,
    pub wrapped_key: Option<Vec<u8>>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Long-lived refresh credential handle. Only the fingerprint of the raw
/// token is stored.
#[derive(Debug, Clone)]
pub struct RefreshRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token_fingerprint: String,
    pub revoked: bool,
    pub expires_at: i64,
    pub created_at: i64,
}

/// An encrypted credential record.
#[derive(Debug, Clone)]
pub struct EntryRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub title: String,
    pub username: String,
    pub site: Option<String>,
    pub notes: Option<String>,
    pub secret_ciphertext: Vec<u8>,
    pub secret_nonce: Vec<u8>,
    pub secret_auth_tag: Vec<u8>,
    pub collection_id: Option<Uuid>,
    pub is_favorite: bool,
    pub is_pinned: bool,
    pub strength: u8,
    pub last_used_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct Collection {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct Tag {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub created_at: i64,
}

/// A bounded-use read grant on one entry.
#[derive(Debug, Clone)]
pub struct ShareRecord {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub account_id: Uuid,
    pub token_fingerprint: String,
    pub max_views: u32,
    pub view_count: u32,
    pub expires_at: i64,
    pub accessed_at: Option<i64>,
    pub accessor_address: Option<String>,
    pub include_secret: bool,
    pub include_notes: bool,
    pub created_at: i64,
}

/// Security-relevant action recorded in the append-only audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    Logout,
    Reveal,
    Copy,
    Create,
    Update,
    Delete,
    Export,
    Import,
    Share,
    ShareAccess,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Reveal => "reveal",
            Self::Copy => "copy",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Export => "export",
            Self::Import => "import",
            Self::Share => "share",
            Self::ShareAccess => "share_access",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            "reveal" => Some(Self::Reveal),
            "copy" => Some(Self::Copy),
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "export" => Some(Self::Export),
            "import" => Some(Self::Import),
            "share" => Some(Self::Share),
            "share_access" => Some(Self::ShareAccess),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditRow {
    pub id: i64,
    pub account_id: Uuid,
    pub action: AuditAction,
    pub entry_id: Option<Uuid>,
    pub entry_title: Option<String>,
    pub network_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_action_roundtrip() {
        for action in [
            AuditAction::Login,
            AuditAction::Logout,
            AuditAction::Reveal,
            AuditAction::Copy,
            AuditAction::Create,
            AuditAction::Update,
            AuditAction::Delete,
            AuditAction::Export,
            AuditAction::Import,
            AuditAction::Share,
            AuditAction::ShareAccess,
        ] {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn test_audit_action_rejects_unknown() {
        assert_eq!(AuditAction::parse("drop_table"), None);
    }
}
