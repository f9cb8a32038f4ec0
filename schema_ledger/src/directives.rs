//! Per-migration directives
//!
//! Directives arrive as a string map attached to the descriptor, or as
//! `-- @MARV key = value` comment lines inside the script. Both are parsed into
//! [`Directive`] values and folded into a single [`Decision`].

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::migration::MigrationDescriptor;

static EMBEDDED_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*--[ \t]*@MARV[ \t]+([A-Za-z0-9_-]+)[ \t]*=[ \t]*(.*?)[ \t\r]*$")
        .expect("directive pattern")
});

/// A recognized directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Skip(bool),
    Audit(bool),
    Comment(String),
}

impl Directive {
    /// Parse one key/value pair; `None` when the key is not supported
    pub fn parse(key: &str, value: &str) -> Option<Self> {
        match key {
            "skip" => Some(Directive::Skip(value.eq_ignore_ascii_case("true"))),
            "audit" => Some(Directive::Audit(!value.eq_ignore_ascii_case("false"))),
            "comment" => Some(Directive::Comment(value.to_string())),
            _ => None,
        }
    }
}

/// Result of parsing a directive map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDirectives {
    pub directives: Vec<Directive>,
    pub unsupported: Vec<String>,
}

impl ParsedDirectives {
    pub fn skip(&self) -> bool {
        self.directives
            .iter()
            .any(|directive| matches!(directive, Directive::Skip(true)))
    }

    pub fn audit(&self) -> Option<bool> {
        self.directives.iter().find_map(|directive| match directive {
            Directive::Audit(audit) => Some(*audit),
            _ => None,
        })
    }

    pub fn comment(&self) -> Option<&str> {
        self.directives.iter().find_map(|directive| match directive {
            Directive::Comment(comment) => Some(comment.as_str()),
            _ => None,
        })
    }
}

/// Parse a directive map, keeping unsupported keys in their original order
pub fn parse_directives(map: &IndexMap<String, String>) -> ParsedDirectives {
    let mut parsed = ParsedDirectives::default();
    for (key, value) in map {
        match Directive::parse(key, value) {
            Some(directive) => parsed.directives.push(directive),
            None => parsed.unsupported.push(key.clone()),
        }
    }
    parsed
}

/// Extract `-- @MARV key = value` lines from a script. Keys are lower-cased.
pub fn embedded_directives(script: &str) -> IndexMap<String, String> {
    EMBEDDED_DIRECTIVE
        .captures_iter(script)
        .map(|caps| (caps[1].to_lowercase(), caps[2].to_string()))
        .collect()
}

/// What to do with one migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub skip: bool,
    pub auditable: bool,
    pub effective_comment: String,
}

/// Resolves directives into a [`Decision`], warning about anything it ignores
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveProcessor {
    quiet: bool,
}

impl DirectiveProcessor {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Embedded directives overlaid by the descriptor's attached ones
    pub fn effective_directives(migration: &MigrationDescriptor) -> IndexMap<String, String> {
        let mut directives = embedded_directives(&migration.script);
        for (key, value) in &migration.directives {
            directives.insert(key.clone(), value.clone());
        }
        directives
    }

    pub fn resolve(&self, migration: &MigrationDescriptor) -> Decision {
        let parsed = parse_directives(&Self::effective_directives(migration));

        if !parsed.unsupported.is_empty() && !self.quiet {
            warn!(
                migration = migration.level,
                "Ignoring unsupported directives: {}. Try upgrading {}.",
                parsed.unsupported.join(", "),
                env!("CARGO_PKG_NAME")
            );
        }

        let auditable = match (parsed.audit(), migration.audit) {
            (Some(audit), _) => audit,
            (None, Some(audit)) => {
                if !self.quiet {
                    warn!(
                        "The 'audit' option is deprecated. \
                         Please use 'directives.audit' instead."
                    );
                }
                audit
            }
            (None, None) => true,
        };

        Decision {
            skip: parsed.skip(),
            auditable,
            effective_comment: parsed
                .comment()
                .unwrap_or(migration.comment.as_str())
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tracing_test::traced_test;

    fn migration(script: &str) -> MigrationDescriptor {
        MigrationDescriptor::new(
            1,
            "test migration",
            script,
            Utc.with_ymd_and_hms(2016, 12, 1, 15, 14, 13).unwrap(),
            "401f1b790bf394cf6493425c1d7e33b0",
        )
    }

    #[rstest]
    #[case("true", true)]
    #[case("TRUE", true)]
    #[case("True", true)]
    #[case("false", false)]
    #[case("yes", false)]
    #[case("", false)]
    fn skip_matches_true_ignoring_case(#[case] value: &str, #[case] skip: bool) {
        let decision = DirectiveProcessor::new(true)
            .resolve(&migration("SELECT 1").with_directive("skip", value));
        assert_eq!(decision.skip, skip);
    }

    #[rstest]
    #[case("false", false)]
    #[case("FALSE", false)]
    #[case("true", true)]
    #[case("no", true)]
    fn audit_disabled_only_by_false(#[case] value: &str, #[case] auditable: bool) {
        let decision = DirectiveProcessor::new(true)
            .resolve(&migration("SELECT 1").with_directive("audit", value));
        assert_eq!(decision.auditable, auditable);
    }

    #[test]
    fn defaults_without_directives() {
        let decision = DirectiveProcessor::new(false).resolve(&migration("SELECT 1"));
        assert_eq!(
            decision,
            Decision {
                skip: false,
                auditable: true,
                effective_comment: "test migration".to_string(),
            }
        );
    }

    #[test]
    fn deprecated_audit_field_applies_without_directive() {
        let mut m = migration("SELECT 1");
        m.audit = Some(false);
        assert!(!DirectiveProcessor::new(true).resolve(&m).auditable);

        m.audit = Some(true);
        assert!(DirectiveProcessor::new(true).resolve(&m).auditable);
    }

    #[test]
    fn audit_directive_wins_over_deprecated_field() {
        let mut m = migration("SELECT 1").with_directive("audit", "true");
        m.audit = Some(false);
        assert!(DirectiveProcessor::new(true).resolve(&m).auditable);
    }

    #[test]
    fn comment_override() {
        let decision = DirectiveProcessor::new(true)
            .resolve(&migration("SELECT 1").with_directive("comment", "override"));
        assert_eq!(decision.effective_comment, "override");
    }

    #[test]
    fn unsupported_keys_collected_in_order() {
        let mut map = IndexMap::new();
        map.insert("foo".to_string(), "bar".to_string());
        map.insert("skip".to_string(), "true".to_string());
        map.insert("Audit".to_string(), "false".to_string());

        let parsed = parse_directives(&map);
        assert_eq!(parsed.directives, vec![Directive::Skip(true)]);
        assert_eq!(parsed.unsupported, vec!["foo".to_string(), "Audit".to_string()]);
    }

    fn with_unsupported_keys() -> MigrationDescriptor {
        migration("SELECT 1")
            .with_directive("foo", "bar")
            .with_directive("skip", "false")
            .with_directive("Audit", "false")
    }

    #[test]
    #[traced_test]
    fn unsupported_keys_reported_in_a_single_warning() {
        DirectiveProcessor::new(false).resolve(&with_unsupported_keys());

        logs_assert(|lines: &[&str]| {
            let warnings: Vec<&&str> = lines
                .iter()
                .filter(|line| line.contains("WARN") && line.contains("unsupported directives"))
                .collect();
            match warnings.as_slice() {
                [line] if line.contains("Ignoring unsupported directives: foo, Audit.") => Ok(()),
                _ => Err(format!("expected one warning for foo, Audit, got {:?}", warnings)),
            }
        });
    }

    #[test]
    #[traced_test]
    fn quiet_suppresses_unsupported_key_warning() {
        DirectiveProcessor::new(true).resolve(&with_unsupported_keys());
        assert!(!logs_contain("unsupported directives"));
    }

    #[test]
    #[traced_test]
    fn deprecated_audit_field_warns_unless_quiet() {
        let mut m = migration("SELECT 1");
        m.audit = Some(false);

        DirectiveProcessor::new(true).resolve(&m);
        assert!(!logs_contain("'audit' option is deprecated"));

        DirectiveProcessor::new(false).resolve(&m);
        assert!(logs_contain("The 'audit' option is deprecated"));
    }

    #[test]
    #[traced_test]
    fn audit_directive_does_not_trigger_deprecation_warning() {
        let mut m = migration("SELECT 1").with_directive("audit", "false");
        m.audit = Some(true);

        DirectiveProcessor::new(false).resolve(&m);
        assert!(!logs_contain("deprecated"));
    }

    #[test]
    fn embedded_directives_are_lowercased_and_trimmed() {
        let script = "-- @MARV foo = bar\n\n\
                      -- @MARV COMMENT = override\n\n\
                      -- @marv AUDIT   = false  \nSELECT 1";
        let directives = embedded_directives(script);

        let expected: Vec<(String, String)> = vec![
            ("foo".into(), "bar".into()),
            ("comment".into(), "override".into()),
            ("audit".into(), "false".into()),
        ];
        assert_eq!(directives.into_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn embedded_directives_drive_the_decision() {
        let decision = DirectiveProcessor::new(true).resolve(&migration(
            "-- @MARV foo = bar\n-- @MARV SKIP   = true\nINVALID",
        ));
        assert!(decision.skip);
    }

    #[test]
    fn attached_directives_override_embedded() {
        let m = migration("-- @MARV comment = embedded\nSELECT 1")
            .with_directive("comment", "attached");
        assert_eq!(DirectiveProcessor::new(true).resolve(&m).effective_comment, "attached");
    }

    #[test]
    fn plain_sql_comments_are_not_directives() {
        let script = "-- create the foo table\nCREATE TABLE foo (id INTEGER);";
        assert!(embedded_directives(script).is_empty());
    }
}
