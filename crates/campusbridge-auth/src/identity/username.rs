//! Username synthesis for new identities.
//!
//! New users get `{org_abbr}_{login}`. When that is taken, a numeric suffix
//! is appended: `UNIA_jd`, `UNIA_jd1`, `UNIA_jd2`, ... Without a login the
//! base is `{org_abbr}_` and numbering starts at one: `UNIA_1`, `UNIA_2`, ...

/// Removes every character outside `[A-Za-z0-9_.@-]`.
#[must_use]
pub fn sanitize_username(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '-'))
        .collect()
}

/// Candidate usernames for an identity, in the order they are tried.
///
/// The iterator is unbounded; callers cap the number of attempts.
#[derive(Debug, Clone)]
pub struct UsernameCandidates {
    base: String,
    bare_pending: bool,
    next_suffix: u64,
}

impl UsernameCandidates {
    /// Builds the candidates for a participant's organisation and an
    /// optional login.
    ///
    /// A login that sanitises to nothing is treated as absent.
    #[must_use]
    pub fn new(org_abbr: &str, login: Option<&str>) -> Self {
        let login = login.map(sanitize_username).filter(|l| !l.is_empty());
        let org = sanitize_username(org_abbr);
        match login {
            Some(login) => Self {
                base: format!("{org}_{login}"),
                bare_pending: true,
                next_suffix: 1,
            },
            None => Self {
                base: format!("{org}_"),
                bare_pending: false,
                next_suffix: 1,
            },
        }
    }

    /// The sanitised base all candidates start with.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }
}

impl Iterator for UsernameCandidates {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bare_pending {
            self.bare_pending = false;
            return Some(self.base.clone());
        }
        let candidate = format!("{}{}", self.base, self.next_suffix);
        self.next_suffix += 1;
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_username() {
        assert_eq!(sanitize_username("UNIA_j.doe@uni-a"), "UNIA_j.doe@uni-a");
        assert_eq!(sanitize_username("UNI A_jöhn doe!"), "UNIA_jhndoe");
        assert_eq!(sanitize_username("../etc"), "..etc");
    }

    #[test]
    fn test_candidates_with_login() {
        let names: Vec<_> = UsernameCandidates::new("UNIA", Some("jdoe")).take(3).collect();
        assert_eq!(names, vec!["UNIA_jdoe", "UNIA_jdoe1", "UNIA_jdoe2"]);
    }

    #[test]
    fn test_candidates_without_login() {
        let names: Vec<_> = UsernameCandidates::new("ORG", None).take(2).collect();
        assert_eq!(names, vec!["ORG_1", "ORG_2"]);

        let unusable: Vec<_> = UsernameCandidates::new("ORG", Some("äöü")).take(1).collect();
        assert_eq!(unusable, vec!["ORG_1"]);
    }

    #[test]
    fn test_candidate_base_is_sanitised() {
        let candidates = UsernameCandidates::new("Uni A", Some("j doe"));
        assert_eq!(candidates.base(), "UniA_jdoe");
    }
}
