use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a member inside their company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Ceo,
    Admin,
    Hr,
    Manager,
    Staff,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Ceo => "ceo",
            UserRole::Admin => "admin",
            UserRole::Hr => "hr",
            UserRole::Manager => "manager",
            UserRole::Staff => "staff",
        }
    }

    /// Roles allowed to manage company-wide settings and message the whole company.
    pub fn is_company_admin(&self) -> bool {
        matches!(self, UserRole::Ceo | UserRole::Admin | UserRole::Hr)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ceo" => Ok(UserRole::Ceo),
            "admin" => Ok(UserRole::Admin),
            "hr" => Ok(UserRole::Hr),
            "manager" => Ok(UserRole::Manager),
            "staff" => Ok(UserRole::Staff),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// JWT claims issued by the external authentication service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub company_id: Uuid,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl Claims {
    pub fn new(user_id: Uuid, company_id: Uuid, role: UserRole, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            company_id,
            role,
            iat: now,
            exp: now + duration_secs,
            jti: Uuid::now_v7(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// The acting member, threaded explicitly through every core call.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub company_id: Uuid,
    pub role: UserRole,
    pub token_id: Uuid,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            company_id: claims.company_id,
            role: claims.role,
            token_id: claims.jti,
        }
    }
}
