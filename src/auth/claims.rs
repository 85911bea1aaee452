use serde::{Deserialize, Serialize};

/// JWT payload. Nothing beyond the subject and the validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub user_id: i64, // 0 when absent; never a real id
    pub iat: i64,     // issued at (unix timestamp)
    pub exp: i64,     // expires at (unix timestamp)
}
