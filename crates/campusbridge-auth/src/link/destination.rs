//! Course destination matching.
//!
//! A link is only handled when it targets a course on this site. Two link
//! forms are recognised, both keyed by the `id` parameter:
//!
//! - legacy: `{site}/course/view.php?id={id}`
//! - current: `{site}/local/campusconnect/viewcourse.php?id={id}`
//!
//! Matching is a prefix comparison after [`strip_port`] has been applied to
//! both sides, so reverse proxies may remap ports. Paths, parameter order and
//! URL encoding are not canonicalised.

use serde::Serialize;

use super::params::{COURSE_ID, ParamMap};
use super::url::strip_port;

const LEGACY_COURSE_PATH: &str = "/course/view.php?id=";
const CURRENT_COURSE_PATH: &str = "/local/campusconnect/viewcourse.php?id=";

/// Which course link form matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationForm {
    /// Direct course view URL.
    Legacy,
    /// CampusConnect course link URL.
    Current,
}

/// A destination URL recognised as a local course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseDestination {
    /// The course id taken from the `id` parameter.
    pub course_id: String,

    /// The canonical prefix the URL matched.
    pub course_url: String,

    /// Which form matched.
    pub form: DestinationForm,
}

/// Recognises course destinations on the local site.
#[derive(Debug, Clone)]
pub struct DestinationMatcher {
    site_url: String,
}

impl DestinationMatcher {
    /// Creates a matcher for the given site base URL.
    ///
    /// Trailing slashes are removed from the base URL.
    #[must_use]
    pub fn new(site_url: impl Into<String>) -> Self {
        let mut site_url = site_url.into();
        site_url.truncate(site_url.trim_end_matches('/').len());
        Self { site_url }
    }

    /// Returns the canonical course URL for a link form.
    #[must_use]
    pub fn course_url(&self, form: DestinationForm, course_id: &str) -> String {
        let path = match form {
            DestinationForm::Legacy => LEGACY_COURSE_PATH,
            DestinationForm::Current => CURRENT_COURSE_PATH,
        };
        format!("{}{}{}", self.site_url, path, course_id)
    }

    /// Matches `url` against the course link forms.
    ///
    /// Returns `None` if the `id` parameter is absent or empty, or if the URL
    /// starts with neither canonical prefix once ports are stripped. The
    /// reported `course_url` keeps the configured form.
    #[must_use]
    pub fn match_destination(&self, url: &str, params: &ParamMap) -> Option<CourseDestination> {
        let course_id = params.get(COURSE_ID).filter(|id| !id.is_empty())?;
        let observed = strip_port(url);

        [DestinationForm::Legacy, DestinationForm::Current]
            .into_iter()
            .find_map(|form| {
                let course_url = self.course_url(form, course_id);
                observed.starts_with(&strip_port(&course_url)).then(|| CourseDestination {
                    course_id: course_id.clone(),
                    course_url,
                    form,
                })
            })
    }
}
