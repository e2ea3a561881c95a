use serde::{Deserialize, Serialize};

/// The session user as reported by the auth endpoints.
///
/// The client never inspects credentials beyond passing them to the auth
/// collaborator; the session itself travels as a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

/// Credentials for `login` and `register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}
