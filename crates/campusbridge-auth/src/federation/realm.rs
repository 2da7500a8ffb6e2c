//! Realm computation.
//!
//! The issuer of a token stores a realm: a hash over the link it handed to
//! the user. Recomputing it on arrival detects links that were altered
//! between issuance and redemption. Two schemes exist:
//!
//! - **Legacy** (links with `ecs_uid_hash` and no typed person id): hash of
//!   the canonical course URL followed by the legacy identity fields
//! - **Current**: hash of the full destination URL without the token
//!   parameters
//!
//! The result must match what the issuer computed byte for byte, so the
//! algorithm is pluggable through [`RealmAlgorithm`].

use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::link::params::{
    ECS_EMAIL, ECS_FIRSTNAME, ECS_HASH, ECS_HASH_URL, ECS_INSTITUTION, ECS_LASTNAME, ECS_LOGIN,
    ECS_UID_HASH, ExternalIdentityParams,
};

const LEGACY_REALM_FIELDS: [&str; 6] = [
    ECS_LOGIN,
    ECS_FIRSTNAME,
    ECS_LASTNAME,
    ECS_EMAIL,
    ECS_INSTITUTION,
    ECS_UID_HASH,
];

/// Realm scheme used by the issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RealmScheme {
    /// Course URL plus legacy identity fields.
    Legacy,
    /// Full destination URL.
    Current,
}

impl RealmScheme {
    /// Selects the scheme from the parameters the link carries.
    #[must_use]
    pub fn for_params(params: &ExternalIdentityParams) -> Self {
        if params.is_legacy() {
            Self::Legacy
        } else {
            Self::Current
        }
    }
}

/// Everything a realm may be computed over.
#[derive(Debug, Clone, Copy)]
pub struct RealmInput<'a> {
    /// The destination URL as received.
    pub destination_url: &'a str,
    /// The canonical course URL the destination matched.
    pub course_url: &'a str,
    /// The link's identity parameters.
    pub params: &'a ExternalIdentityParams,
}

/// Computes realms the way the issuing side does.
pub trait RealmAlgorithm: Send + Sync {
    /// Computes the realm for `input` under `scheme`.
    fn compute(&self, scheme: RealmScheme, input: &RealmInput<'_>) -> String;
}

/// SHA-1 realm, rendered as lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1Realm;

impl RealmAlgorithm for Sha1Realm {
    fn compute(&self, scheme: RealmScheme, input: &RealmInput<'_>) -> String {
        let mut hasher = Sha1::new();
        match scheme {
            RealmScheme::Legacy => {
                hasher.update(input.course_url.as_bytes());
                for field in LEGACY_REALM_FIELDS {
                    if let Some(value) = input.params.get(field) {
                        hasher.update(value.as_bytes());
                    }
                }
            }
            RealmScheme::Current => {
                hasher.update(strip_token_params(input.destination_url).as_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }
}

/// Removes the `ecs_hash` and `ecs_hash_url` entries from a URL's query.
///
/// The remaining entries keep their original bytes and order. A query left
/// empty is dropped together with its `?`; a fragment is preserved.
#[must_use]
pub fn strip_token_params(url: &str) -> String {
    let Some((base, rest)) = url.split_once('?') else {
        return url.to_string();
    };
    let (query, fragment) = match rest.split_once('#') {
        Some((query, fragment)) => (query, Some(fragment)),
        None => (rest, None),
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|entry| {
            let key = entry.split_once('=').map_or(*entry, |(key, _)| key);
            key != ECS_HASH && key != ECS_HASH_URL
        })
        .collect();

    let mut stripped = base.to_string();
    if !kept.is_empty() {
        stripped.push('?');
        stripped.push_str(&kept.join("&"));
    }
    if let Some(fragment) = fragment {
        stripped.push('#');
        stripped.push_str(fragment);
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::params::extract_params;

    fn sha1_hex(data: &str) -> String {
        hex::encode(Sha1::digest(data.as_bytes()))
    }

    fn params(url: &str) -> ExternalIdentityParams {
        ExternalIdentityParams::from_params(&extract_params(url))
    }

    #[test]
    fn test_scheme_selection() {
        assert_eq!(
            RealmScheme::for_params(&params("https://x/?ecs_uid_hash=h")),
            RealmScheme::Legacy
        );
        assert_eq!(
            RealmScheme::for_params(&params(
                "https://x/?ecs_uid_hash=h&ecs_person_id_type=ecs_uid&ecs_uid=u"
            )),
            RealmScheme::Current
        );
        assert_eq!(
            RealmScheme::for_params(&params("https://x/?ecs_login=jd")),
            RealmScheme::Current
        );
    }

    #[test]
    fn test_strip_token_params() {
        assert_eq!(
            strip_token_params("https://x/c?id=1&ecs_hash=abc&ecs_login=jd"),
            "https://x/c?id=1&ecs_login=jd"
        );
        assert_eq!(
            strip_token_params("https://x/c?ecs_hash_url=u%2Fsys&id=1#frag"),
            "https://x/c?id=1#frag"
        );
        assert_eq!(strip_token_params("https://x/c?ecs_hash=abc"), "https://x/c");
        assert_eq!(strip_token_params("https://x/c"), "https://x/c");
    }

    #[test]
    fn test_current_realm() {
        let url = "https://lms.example.edu/course/view.php?id=4&ecs_login=jd&ecs_hash=tok";
        let p = params(url);
        let input = RealmInput {
            destination_url: url,
            course_url: "https://lms.example.edu/course/view.php?id=4",
            params: &p,
        };

        assert_eq!(
            Sha1Realm.compute(RealmScheme::Current, &input),
            sha1_hex("https://lms.example.edu/course/view.php?id=4&ecs_login=jd")
        );
    }

    #[test]
    fn test_legacy_realm() {
        let url = "https://lms.example.edu/course/view.php?id=4&ecs_login=jd&ecs_lastname=Doe\
                   &ecs_uid_hash=h1&ecs_hash=tok";
        let p = params(url);
        let input = RealmInput {
            destination_url: url,
            course_url: "https://lms.example.edu/course/view.php?id=4",
            params: &p,
        };

        assert_eq!(
            Sha1Realm.compute(RealmScheme::Legacy, &input),
            sha1_hex("https://lms.example.edu/course/view.php?id=4jdDoeh1")
        );
    }

    #[test]
    fn test_realm_detects_tampering() {
        let original = "https://lms.example.edu/course/view.php?id=4&ecs_login=jd&ecs_hash=tok";
        let tampered = "https://lms.example.edu/course/view.php?id=4&ecs_login=admin&ecs_hash=tok";
        let (po, pt) = (params(original), params(tampered));
        let course_url = "https://lms.example.edu/course/view.php?id=4";

        let realm = |url: &str, p: &ExternalIdentityParams| {
            Sha1Realm.compute(
                RealmScheme::Current,
                &RealmInput {
                    destination_url: url,
                    course_url,
                    params: p,
                },
            )
        };
        assert_ne!(realm(original, &po), realm(tampered, &pt));
    }
}
