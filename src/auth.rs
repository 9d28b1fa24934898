use std::fmt;

use actix_web::http::header::WWW_AUTHENTICATE;
use actix_web::HttpResponse;
use actix_web_httpauth::extractors::basic::BasicAuth;

const REALM_CHALLENGE: &str = "Basic realm=\"participants\"";

/// Trust boundary in front of the full participant dump and invited signups.
#[derive(Clone)]
pub struct AdminAuth {
    credentials: Option<(String, String)>,
    bypass: bool,
}

impl fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminAuth")
            .field("user", &self.credentials.as_ref().map(|(user, _)| user))
            .field("bypass", &self.bypass)
            .finish()
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl AdminAuth {
    pub fn new(credentials: Option<(String, String)>, bypass: bool) -> Self {
        Self { credentials, bypass }
    }

    /// With no credentials configured nobody gets in, unless bypassed.
    pub fn authorize(&self, user: &str, password: Option<&str>) -> bool {
        if self.bypass {
            return true;
        }
        match &self.credentials {
            Some((expected_user, expected_password)) => {
                let user_ok = constant_time_eq(user, expected_user);
                let password_ok = constant_time_eq(password.unwrap_or(""), expected_password);
                user_ok & password_ok
            }
            None => false,
        }
    }

    /// Whether a request carrying `credentials` comes from a trusted caller.
    pub fn permits(&self, credentials: Option<&BasicAuth>) -> bool {
        match credentials {
            Some(basic) => self.authorize(basic.user_id(), basic.password()),
            None => self.bypass,
        }
    }

    pub fn challenge() -> HttpResponse {
        HttpResponse::Unauthorized()
            .insert_header((WWW_AUTHENTICATE, REALM_CHALLENGE))
            .body("Access denied")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> AdminAuth {
        AdminAuth::new(Some(("board".to_string(), "hunter2".to_string())), false)
    }

    #[test]
    fn test_matching_credentials() {
        assert!(admin().authorize("board", Some("hunter2")));
    }

    #[test]
    fn test_rejects_wrong_or_missing_password() {
        assert!(!admin().authorize("board", Some("hunter3")));
        assert!(!admin().authorize("board", None));
        assert!(!admin().authorize("Board", Some("hunter2")));
    }

    #[test]
    fn test_unconfigured_rejects_everyone() {
        let auth = AdminAuth::new(None, false);
        assert!(!auth.authorize("", Some("")));
    }

    #[test]
    fn test_bypass() {
        assert!(AdminAuth::new(None, true).authorize("anyone", None));
        assert!(AdminAuth::new(None, true).permits(None));
    }

    #[test]
    fn test_anonymous_request_is_not_trusted() {
        assert!(!admin().permits(None));
    }

    #[test]
    fn test_debug_hides_password() {
        assert!(!format!("{:?}", admin()).contains("hunter2"));
    }
}
