use axum::http::{header, HeaderMap, HeaderValue};
use sha2::{Digest, Sha512};
use tower_sessions::cookie::{time::Duration, Cookie, CookieJar, Key, SameSite};
use tower_sessions::session::Id;

/// Name of the session cookie. Kept from the previous deployment so existing
/// clients clear the right cookie on logout.
pub const SESSION_COOKIE_NAME: &str = "connect.sid";

/// Attributes of the session cookie.
#[derive(Clone, Debug)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age: Duration,
}

impl CookieSettings {
    /// `SameSite=Lax`, no `Secure` flag.
    pub fn development() -> Self {
        Self {
            name: SESSION_COOKIE_NAME.to_owned(),
            secure: false,
            same_site: SameSite::Lax,
            max_age: super::SESSION_LIFETIME,
        }
    }

    /// `Secure` with `SameSite=None`, for a frontend served from another site.
    pub fn production() -> Self {
        Self {
            secure: true,
            same_site: SameSite::None,
            ..Self::development()
        }
    }

    pub fn for_environment(production: bool) -> Self {
        if production {
            Self::production()
        } else {
            Self::development()
        }
    }
}

/// Encodes and verifies the signed session cookie.
///
/// The value is the session id plus an HMAC binding it to the server secret,
/// so a tampered id is rejected before any store lookup.
#[derive(Clone)]
pub struct SessionCookies {
    key: Key,
    settings: CookieSettings,
}

impl std::fmt::Debug for SessionCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCookies")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SessionCookies {
    /// Derives the signing key from `secret` of any length.
    pub fn new(secret: &[u8], settings: CookieSettings) -> Self {
        let digest = Sha512::digest(secret);
        Self {
            key: Key::from(digest.as_slice()),
            settings,
        }
    }

    pub fn settings(&self) -> &CookieSettings {
        &self.settings
    }

    /// The session id carried by a correctly signed cookie, if there is one.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<Id> {
        let mut jar = CookieJar::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(value.to_owned()).flatten() {
                jar.add_original(cookie);
            }
        }

        let verified = jar.signed(&self.key).get(&self.settings.name);
        if verified.is_none() && jar.get(&self.settings.name).is_some() {
            tracing::debug!("session cookie failed signature check");
        }
        verified?.value().parse().ok()
    }

    /// `Set-Cookie` value delivering `id` to the client.
    pub fn issue(&self, id: Id) -> Option<HeaderValue> {
        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key)
            .add(self.base(id.to_string()).max_age(self.settings.max_age));
        let cookie = jar.get(&self.settings.name)?;
        HeaderValue::from_str(&cookie.to_string()).ok()
    }

    /// `Set-Cookie` value instructing the client to drop the cookie.
    pub fn clear(&self) -> Option<HeaderValue> {
        let mut cookie = self.base(String::new()).build();
        cookie.make_removal();
        HeaderValue::from_str(&cookie.to_string()).ok()
    }

    fn base(&self, value: String) -> tower_sessions::cookie::CookieBuilder<'static> {
        Cookie::build((self.settings.name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(self.settings.secure)
            .same_site(self.settings.same_site)
    }
}
