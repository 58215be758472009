use serde::{Deserialize, Serialize};

pub const ADMIN_ROLE: &str = "admin";

/// JWT payload issued to members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberClaims {
    /// Member id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// JWT payload issued to the administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminClaims {
    #[serde(default)]
    pub username: String,
    /// Member tokens carry no role.
    #[serde(default)]
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl AdminClaims {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}
