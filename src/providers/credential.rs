use base64::Engine;
use std::fmt;

/// Credential handed to a tracker client at construction time.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// OAuth access token, sent as `Bearer <token>`.
    Bearer(String),
    /// Site API token, sent as HTTP basic auth.
    Basic { email: String, api_token: String },
    /// Token sent verbatim in the `Authorization` header (monday.com).
    Raw(String),
}

impl Credential {
    pub fn header_value(&self) -> String {
        match self {
            Credential::Bearer(token) => format!("Bearer {token}"),
            Credential::Basic { email, api_token } => {
                let encoded =
                    base64::engine::general_purpose::STANDARD.encode(format!("{email}:{api_token}"));
                format!("Basic {encoded}")
            }
            Credential::Raw(token) => token.clone(),
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Credential::Bearer(_) => "Bearer",
            Credential::Basic { .. } => "Basic",
            Credential::Raw(_) => "Raw",
        }
    }
}

// Never print secrets.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({}, <redacted>)", self.scheme())
    }
}
