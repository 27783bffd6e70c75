//! Resolution of requested versions and feature names.

use embedmongo_engine::version::production;
use embedmongo_engine::{EngineVersion, Feature, KnownRelease, VersionDescriptor};

use crate::errors::ConfigurationError;
use crate::reporter::OrchestrationReporter;

/// Resolves a free-form version and feature list into an [`EngineVersion`].
///
/// An empty version selects the production release. Unknown versions are
/// attempted verbatim after reporting a warning; unknown features are fatal.
///
/// # Errors
///
/// Returns [`ConfigurationError::UnknownFeature`] for unmatched feature names.
pub fn resolve_version(
    requested: Option<&str>,
    features: &[String],
    reporter: &dyn OrchestrationReporter,
) -> Result<EngineVersion, ConfigurationError> {
    let features = parse_features(features)?;
    let requested = requested.map(str::trim).filter(|raw| !raw.is_empty());
    let descriptor = match requested {
        None if features.is_empty() => VersionDescriptor::Known(production()),
        None => lookup(production().download_path(), reporter),
        Some(raw) => lookup(raw, reporter),
    };
    Ok(EngineVersion::new(descriptor, features))
}

fn lookup(raw: &str, reporter: &dyn OrchestrationReporter) -> VersionDescriptor {
    match KnownRelease::lookup(&canonical_token(raw)) {
        Some(release) => VersionDescriptor::Known(release),
        None => {
            reporter.unknown_version(raw);
            VersionDescriptor::Passthrough(raw.to_owned())
        }
    }
}

/// Canonical token for a version string, such as `V3_0_2` for `3.0.2`.
#[must_use]
pub fn canonical_token(raw: &str) -> String {
    let upper = raw.to_uppercase().replace('.', "_");
    if upper.starts_with('V') {
        upper
    } else {
        format!("V{upper}")
    }
}

fn parse_features(names: &[String]) -> Result<Vec<Feature>, ConfigurationError> {
    names
        .iter()
        .map(|name| {
            name.trim()
                .to_uppercase()
                .parse::<Feature>()
                .map_err(|_| ConfigurationError::UnknownFeature { name: name.clone() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{RecordingReporter, ReportEvent};
    use embedmongo_engine::version::PRODUCTION_TOKEN;
    use rstest::{fixture, rstest};

    #[fixture]
    fn reporter() -> RecordingReporter {
        RecordingReporter::default()
    }

    #[rstest]
    #[case("3.0.2", "V3_0_2")]
    #[case("v2.4.10", "V2_4_10")]
    #[case("V2_6_5", "V2_6_5")]
    fn canonical_tokens(#[case] raw: &str, #[case] token: &str) {
        assert_eq!(canonical_token(raw), token);
    }

    #[rstest]
    fn known_version_resolves_to_token(reporter: RecordingReporter) {
        let version = resolve_version(Some("3.0.2"), &[], &reporter).expect("known version");

        assert_eq!(version.descriptor().token(), Some("V3_0_2"));
        assert!(reporter.events().is_empty());
    }

    #[rstest]
    fn unknown_version_passes_through_with_warning(reporter: RecordingReporter) {
        let version = resolve_version(Some("99.99.99"), &[], &reporter).expect("passthrough");

        assert!(version.descriptor().is_passthrough());
        assert_eq!(version.download_path(), "99.99.99");
        assert_eq!(
            reporter.events(),
            vec![ReportEvent::UnknownVersion("99.99.99".to_owned())]
        );
    }

    #[rstest]
    fn unknown_feature_is_fatal(reporter: RecordingReporter) {
        let error = resolve_version(Some("3.0.2"), &["NOT_A_FEATURE".to_owned()], &reporter)
            .expect_err("unknown feature");

        assert!(matches!(
            error,
            ConfigurationError::UnknownFeature { ref name } if name == "NOT_A_FEATURE"
        ));
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   "))]
    fn empty_version_selects_production(reporter: RecordingReporter, #[case] raw: Option<&str>) {
        let version = resolve_version(raw, &[], &reporter).expect("production");
        assert_eq!(version.descriptor().token(), Some(PRODUCTION_TOKEN));
    }

    #[rstest]
    fn production_with_features_keeps_release_and_features(reporter: RecordingReporter) {
        let version = resolve_version(None, &["text_search".to_owned()], &reporter)
            .expect("production with features");

        assert_eq!(version.descriptor().token(), Some(PRODUCTION_TOKEN));
        assert!(version.enabled(Feature::TextSearch));
        assert!(reporter.events().is_empty());
    }
}
