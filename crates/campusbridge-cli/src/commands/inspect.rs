use anyhow::Result;
use campusbridge_auth::federation::realm::{
    RealmAlgorithm, RealmInput, RealmScheme, Sha1Realm, strip_token_params,
};
use campusbridge_auth::identity::person::extract_person_id;
use campusbridge_auth::link::{
    DestinationMatcher, ExternalIdentityParams, extract_params, locate_token, strip_port,
};
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::output::{or_dash, print_fields, print_json, print_section, print_table};

/// Offline analysis of a course link. Nothing is sent to an exchange service.
pub fn inspect(config: &AppConfig, url: &str, format: OutputFormat) -> Result<()> {
    let report = analyse(config, url);

    if matches!(format, OutputFormat::Json) {
        return print_json(&report);
    }

    print_section("Parameters");
    let rows = report["parameters"]
        .as_object()
        .map(|params| {
            params
                .iter()
                .map(|(k, v)| [k.clone(), v.as_str().unwrap_or_default().to_string()])
                .collect()
        })
        .unwrap_or_default();
    print_table(["Name", "Value"], rows);

    print_section("Analysis");
    let text = |key: &str| report[key].as_str().map(str::to_string);
    print_fields(vec![
        ("Course", or_dash(text("course_id").as_deref())),
        ("Course URL", or_dash(text("course_url").as_deref())),
        ("Token", or_dash(report["token"]["token"].as_str())),
        ("Issuer", or_dash(report["token"]["issuer_base_url"].as_str())),
        ("Issuer domain", or_dash(text("issuer_domain").as_deref())),
        ("Token error", or_dash(text("token_error").as_deref())),
        ("Person id", or_dash(text("person_id").as_deref())),
        ("Identity error", or_dash(text("identity_error").as_deref())),
        ("Realm scheme", or_dash(text("realm_scheme").as_deref())),
        ("Realm (legacy)", or_dash(report["realms"]["legacy"].as_str())),
        ("Realm (current)", or_dash(report["realms"]["current"].as_str())),
    ]);
    Ok(())
}

fn analyse(config: &AppConfig, url: &str) -> Value {
    let params = extract_params(url);
    let identity = ExternalIdentityParams::from_params(&params);
    let destination = DestinationMatcher::new(&config.site.base_url).match_destination(url, &params);

    let mut report = json!({
        "url": url,
        "parameters": params,
        "stripped_url": strip_token_params(url),
    });

    if let Some(destination) = &destination {
        report["course_id"] = json!(destination.course_id);
        report["course_url"] = json!(destination.course_url);
        report["form"] = json!(destination.form);

        let input = RealmInput {
            destination_url: url,
            course_url: &destination.course_url,
            params: &identity,
        };
        report["realm_scheme"] = json!(RealmScheme::for_params(&identity));
        report["realms"] = json!({
            "legacy": Sha1Realm.compute(RealmScheme::Legacy, &input),
            "current": Sha1Realm.compute(RealmScheme::Current, &input),
        });
    }

    match locate_token(&params) {
        Ok(Some(location)) => {
            if let Some(issuer) = &location.issuer_base_url {
                let issuer = strip_port(issuer);
                let domain = config
                    .domains
                    .iter()
                    .find(|d| strip_port(&d.base_url) == issuer);
                report["issuer_domain"] = json!(domain.map(|d| d.id.clone()));
            }
            report["token"] = json!(location);
        }
        Ok(None) => {}
        Err(e) => report["token_error"] = json!(e.to_string()),
    }

    match extract_person_id(&identity) {
        Ok(person_id) => report["person_id"] = json!(format!("{}={}", person_id.kind, person_id.value)),
        Err(e) => report["identity_error"] = json!(e.to_string()),
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.site.base_url = "https://lms.example.edu".to_string();
        config.domains = vec![campusbridge_auth::TrustDomain::new(
            "ecs1",
            "https://ecs.example.org/ecs",
        )];
        config
    }

    #[test]
    fn test_analyse_course_link() {
        let report = analyse(
            &config(),
            "https://lms.example.edu/course/view.php?id=5&ecs_login=jd\
             &ecs_hash_url=https%3A%2F%2Fecs.example.org%3A8443%2Fecs%2Fsys%2Fauths%2Ftok",
        );

        assert_eq!(report["course_id"], "5");
        assert_eq!(report["form"], "legacy");
        assert_eq!(report["token"]["token"], "tok");
        assert_eq!(report["issuer_domain"], "ecs1");
        assert_eq!(report["person_id"], "ecs_login=jd");
        assert_eq!(report["realm_scheme"], "current");
        assert_eq!(report["realms"]["current"].as_str().unwrap().len(), 40);
    }

    #[test]
    fn test_analyse_foreign_url() {
        let report = analyse(&config(), "https://other.example.edu/?ecs_hash_url=broken");
        assert!(report.get("course_id").is_none());
        assert!(report["token_error"].as_str().unwrap().contains("Malformed"));
        assert!(report.get("identity_error").is_some());
    }
}
