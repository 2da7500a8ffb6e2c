//! Query parameter extraction for course links.
//!
//! Course links carry everything the bridge needs in their query string: the
//! course id, the token (or hash URL) and the external identity of the user.

use std::collections::BTreeMap;

use serde::Serialize;
use url::form_urlencoded;

/// Decoded query parameters, keyed by name. Repeated keys keep the last value.
pub type ParamMap = BTreeMap<String, String>;

/// Parameter carrying the local course id.
pub const COURSE_ID: &str = "id";
/// Parameter carrying the token directly.
pub const ECS_HASH: &str = "ecs_hash";
/// Parameter carrying `<base>/sys/auths/<token>`.
pub const ECS_HASH_URL: &str = "ecs_hash_url";
/// Parameter naming the person id type (typed scheme).
pub const ECS_PERSON_ID_TYPE: &str = "ecs_person_id_type";
/// Unique user id.
pub const ECS_UID: &str = "ecs_uid";
/// Legacy hashed unique user id.
pub const ECS_UID_HASH: &str = "ecs_uid_hash";
/// Login name at the source participant.
pub const ECS_LOGIN: &str = "ecs_login";
/// Given name.
pub const ECS_FIRSTNAME: &str = "ecs_firstname";
/// Family name.
pub const ECS_LASTNAME: &str = "ecs_lastname";
/// Email address.
pub const ECS_EMAIL: &str = "ecs_email";
/// Institution name.
pub const ECS_INSTITUTION: &str = "ecs_institution";

/// Parses the query component of `url` into a [`ParamMap`].
///
/// Entries without `=` are dropped. Keys and values are percent-decoded.
/// A URL without query string yields an empty map.
#[must_use]
pub fn extract_params(url: &str) -> ParamMap {
    let mut params = ParamMap::new();
    let Some((_, rest)) = url.split_once('?') else {
        return params;
    };
    let query = rest.split_once('#').map_or(rest, |(query, _)| query);

    for entry in query.split('&') {
        if !entry.contains('=') {
            continue;
        }
        if let Some((key, value)) = form_urlencoded::parse(entry.as_bytes()).next() {
            params.insert(key.into_owned(), value.into_owned());
        }
    }

    params
}

/// The external identity parameters accompanying a course link.
///
/// Known keys are lifted into typed fields; all remaining parameters are kept
/// in [`other`](Self::other) for participant-specific field mappings.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ExternalIdentityParams {
    /// Person id type of the typed scheme, e.g. `ecs_ePPN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_id_type: Option<String>,

    /// Unique user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Legacy hashed unique user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid_hash: Option<String>,

    /// Login name at the source participant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,

    /// Given name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    /// Family name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Institution name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,

    /// Every other parameter, including course and token parameters.
    pub other: ParamMap,
}

impl ExternalIdentityParams {
    /// Splits a [`ParamMap`] into typed fields and the residual map.
    #[must_use]
    pub fn from_params(params: &ParamMap) -> Self {
        let mut other = params.clone();
        let mut take = |key: &str| other.remove(key);

        Self {
            person_id_type: take(ECS_PERSON_ID_TYPE),
            uid: take(ECS_UID),
            uid_hash: take(ECS_UID_HASH),
            login: take(ECS_LOGIN),
            first_name: take(ECS_FIRSTNAME),
            last_name: take(ECS_LASTNAME),
            email: take(ECS_EMAIL),
            institution: take(ECS_INSTITUTION),
            other,
        }
    }

    /// Looks up a parameter by its wire name, typed or residual.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let typed = match name {
            ECS_PERSON_ID_TYPE => &self.person_id_type,
            ECS_UID => &self.uid,
            ECS_UID_HASH => &self.uid_hash,
            ECS_LOGIN => &self.login,
            ECS_FIRSTNAME => &self.first_name,
            ECS_LASTNAME => &self.last_name,
            ECS_EMAIL => &self.email,
            ECS_INSTITUTION => &self.institution,
            _ => return self.other.get(name).map(String::as_str),
        };
        typed.as_deref()
    }

    /// Like [`get`](Self::get), treating empty values as absent.
    #[must_use]
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    /// Returns `true` if the link uses the legacy untyped identity scheme.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.person_id_type.is_none() && self.uid_hash.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_params() {
        let params = extract_params(
            "https://lms.example.edu/course/view.php?id=12&ecs_login=j%C3%B6rg&ecs_firstname=J+D",
        );
        assert_eq!(params.len(), 3);
        assert_eq!(params["id"], "12");
        assert_eq!(params["ecs_login"], "jörg");
        assert_eq!(params["ecs_firstname"], "J D");
    }

    #[test]
    fn test_extract_params_without_query() {
        assert!(extract_params("https://lms.example.edu/course/view.php").is_empty());
        assert!(extract_params("https://lms.example.edu/course/view.php?").is_empty());
    }

    #[test]
    fn test_extract_params_drops_entries_without_equals() {
        let params = extract_params("https://x/?flag&id=3&&=empty");
        assert_eq!(params.get("id").map(String::as_str), Some("3"));
        assert!(!params.contains_key("flag"));
        // An entry with an empty key still has '='.
        assert_eq!(params.get("").map(String::as_str), Some("empty"));
    }

    #[test]
    fn test_extract_params_last_value_wins() {
        let params = extract_params("https://x/?id=1&id=2");
        assert_eq!(params["id"], "2");
    }

    #[test]
    fn test_extract_params_splits_on_first_equals_and_ignores_fragment() {
        let params = extract_params("https://x/?ecs_hash_url=a%3Db=c#section-2");
        assert_eq!(params["ecs_hash_url"], "a=b=c");
    }

    #[test]
    fn test_identity_params_split() {
        let params = extract_params(
            "https://x/?id=5&ecs_person_id_type=ecs_ePPN&ecs_ePPN=jd%40uni.example&ecs_login=jd&ecs_email=jd%40uni.example",
        );
        let identity = ExternalIdentityParams::from_params(&params);

        assert_eq!(identity.person_id_type.as_deref(), Some("ecs_ePPN"));
        assert_eq!(identity.login.as_deref(), Some("jd"));
        assert_eq!(identity.email.as_deref(), Some("jd@uni.example"));
        assert_eq!(identity.other.len(), 2);
        assert_eq!(identity.get("ecs_ePPN"), Some("jd@uni.example"));
        assert_eq!(identity.get("ecs_login"), Some("jd"));
        assert_eq!(identity.get("id"), Some("5"));
        assert!(!identity.is_legacy());
    }

    #[test]
    fn test_identity_params_legacy_and_empty_values() {
        let params = extract_params("https://x/?ecs_uid_hash=abc&ecs_login=");
        let identity = ExternalIdentityParams::from_params(&params);

        assert!(identity.is_legacy());
        assert_eq!(identity.get("ecs_login"), Some(""));
        assert_eq!(identity.get_non_empty("ecs_login"), None);
    }
}
