//! External person identifiers.
//!
//! Partners identify users either with the typed scheme
//! (`ecs_person_id_type` names the parameter holding the id) or, for older
//! integrations, with untyped legacy parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::link::params::{
    ECS_LOGIN, ECS_PERSON_ID_TYPE, ECS_UID, ECS_UID_HASH, ExternalIdentityParams,
};

/// The kind of external person identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PersonIdType {
    /// Opaque unique user id.
    #[serde(rename = "ecs_uid")]
    Uid,
    /// Login name at the source participant.
    #[serde(rename = "ecs_login")]
    Login,
    /// Login combined with a unique id.
    #[serde(rename = "ecs_loginUID")]
    LoginUid,
    /// eduPersonPrincipalName.
    #[serde(rename = "ecs_ePPN")]
    Eppn,
    /// Email address.
    #[serde(rename = "ecs_email")]
    Email,
    /// Personal unique code (e.g. matriculation number).
    #[serde(rename = "ecs_PersonalUniqueCode")]
    PersonalUniqueCode,
    /// Institution-specific personal unique code.
    #[serde(rename = "ecs_CustomPersonalUniqueCode")]
    CustomPersonalUniqueCode,
}

impl PersonIdType {
    /// All supported types.
    pub const ALL: [PersonIdType; 7] = [
        Self::Uid,
        Self::Login,
        Self::LoginUid,
        Self::Eppn,
        Self::Email,
        Self::PersonalUniqueCode,
        Self::CustomPersonalUniqueCode,
    ];

    /// Returns the parameter name carrying an id of this type.
    #[must_use]
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Uid => "ecs_uid",
            Self::Login => "ecs_login",
            Self::LoginUid => "ecs_loginUID",
            Self::Eppn => "ecs_ePPN",
            Self::Email => "ecs_email",
            Self::PersonalUniqueCode => "ecs_PersonalUniqueCode",
            Self::CustomPersonalUniqueCode => "ecs_CustomPersonalUniqueCode",
        }
    }

    /// Returns `true` for types that identify a user on their own.
    ///
    /// Ids of these types are only ever correlated, never matched against
    /// existing local accounts.
    #[must_use]
    pub fn is_inherently_unique(&self) -> bool {
        matches!(self, Self::Uid | Self::Login)
    }
}

impl fmt::Display for PersonIdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

/// Error returned when parsing an unknown person id type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown person id type: {0}")]
pub struct UnknownPersonIdType(pub String);

impl FromStr for PersonIdType {
    type Err = UnknownPersonIdType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_param() == s)
            .ok_or_else(|| UnknownPersonIdType(s.to_string()))
    }
}

/// An external person identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonId {
    /// The identifier type.
    pub kind: PersonIdType,
    /// The identifier value.
    pub value: String,
}

impl PersonId {
    /// Creates a new person id.
    #[must_use]
    pub fn new(kind: PersonIdType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Reasons why no person id could be extracted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IncompleteIdentity {
    /// The typed scheme names a type outside the supported set.
    #[error("Unsupported person id type: {0}")]
    UnsupportedType(String),

    /// The typed scheme names a type but the parameter is missing or empty.
    #[error("Missing value for person id type {0}")]
    MissingValue(PersonIdType),

    /// Neither typed nor legacy identifiers are present.
    #[error("No person identifier present")]
    NoIdentifier,
}

/// Extracts the person id from the link parameters.
///
/// The typed scheme is preferred. Without `ecs_person_id_type` the legacy
/// parameters are consulted in order: `ecs_uid_hash` and `ecs_uid` (both as
/// [`PersonIdType::Uid`]), then `ecs_login`.
///
/// # Errors
///
/// Returns [`IncompleteIdentity`] if no usable identifier is present.
pub fn extract_person_id(params: &ExternalIdentityParams) -> Result<PersonId, IncompleteIdentity> {
    if let Some(raw_type) = params.get(ECS_PERSON_ID_TYPE) {
        let kind: PersonIdType = raw_type
            .parse()
            .map_err(|_| IncompleteIdentity::UnsupportedType(raw_type.to_string()))?;
        let value = params
            .get_non_empty(kind.as_param())
            .ok_or(IncompleteIdentity::MissingValue(kind))?;
        return Ok(PersonId::new(kind, value));
    }

    [
        (ECS_UID_HASH, PersonIdType::Uid),
        (ECS_UID, PersonIdType::Uid),
        (ECS_LOGIN, PersonIdType::Login),
    ]
    .into_iter()
    .find_map(|(param, kind)| params.get_non_empty(param).map(|v| PersonId::new(kind, v)))
    .ok_or(IncompleteIdentity::NoIdentifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::params::extract_params;

    fn identity(query: &str) -> ExternalIdentityParams {
        ExternalIdentityParams::from_params(&extract_params(&format!("https://x/?{query}")))
    }

    #[test]
    fn test_person_id_type_round_trip() {
        for kind in PersonIdType::ALL {
            assert_eq!(kind.as_param().parse::<PersonIdType>().unwrap(), kind);
        }
        assert!("ecs_unknown".parse::<PersonIdType>().is_err());
    }

    #[test]
    fn test_inherently_unique_types() {
        assert!(PersonIdType::Uid.is_inherently_unique());
        assert!(PersonIdType::Login.is_inherently_unique());
        assert!(!PersonIdType::Eppn.is_inherently_unique());
        assert!(!PersonIdType::PersonalUniqueCode.is_inherently_unique());
    }

    #[test]
    fn test_person_id_type_serde_uses_param_names() {
        let json = serde_json::to_value(PersonIdType::Eppn).unwrap();
        assert_eq!(json, "ecs_ePPN");
        let kind: PersonIdType = serde_json::from_value(serde_json::json!("ecs_loginUID")).unwrap();
        assert_eq!(kind, PersonIdType::LoginUid);
    }

    #[test]
    fn test_typed_scheme() {
        let id = extract_person_id(&identity(
            "ecs_person_id_type=ecs_PersonalUniqueCode&ecs_PersonalUniqueCode=12345&ecs_uid=u1",
        ))
        .unwrap();
        assert_eq!(id, PersonId::new(PersonIdType::PersonalUniqueCode, "12345"));
    }

    #[test]
    fn test_typed_scheme_known_field() {
        let id = extract_person_id(&identity("ecs_person_id_type=ecs_login&ecs_login=jdoe")).unwrap();
        assert_eq!(id, PersonId::new(PersonIdType::Login, "jdoe"));
    }

    #[test]
    fn test_typed_scheme_rejects_unknown_type() {
        let err = extract_person_id(&identity("ecs_person_id_type=password&password=x")).unwrap_err();
        assert_eq!(err, IncompleteIdentity::UnsupportedType("password".to_string()));
    }

    #[test]
    fn test_typed_scheme_requires_value() {
        let err = extract_person_id(&identity("ecs_person_id_type=ecs_ePPN&ecs_uid=u1")).unwrap_err();
        assert_eq!(err, IncompleteIdentity::MissingValue(PersonIdType::Eppn));

        let err = extract_person_id(&identity("ecs_person_id_type=ecs_ePPN&ecs_ePPN=")).unwrap_err();
        assert_eq!(err, IncompleteIdentity::MissingValue(PersonIdType::Eppn));
    }

    #[test]
    fn test_legacy_fallback_order() {
        let id = extract_person_id(&identity("ecs_login=jd&ecs_uid=u1&ecs_uid_hash=h1")).unwrap();
        assert_eq!(id, PersonId::new(PersonIdType::Uid, "h1"));

        let id = extract_person_id(&identity("ecs_login=jd&ecs_uid=u1")).unwrap();
        assert_eq!(id, PersonId::new(PersonIdType::Uid, "u1"));

        let id = extract_person_id(&identity("ecs_login=jd")).unwrap();
        assert_eq!(id, PersonId::new(PersonIdType::Login, "jd"));
    }

    #[test]
    fn test_no_identifier() {
        let err = extract_person_id(&identity("ecs_firstname=Jane")).unwrap_err();
        assert_eq!(err, IncompleteIdentity::NoIdentifier);
    }
}
