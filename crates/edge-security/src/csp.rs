//! Content-Security-Policy assembly.
//!
//! Every policy produced here carries `'self'` and all inline-script hashes
//! collected during the render in its `script-src` directive. The configured
//! policy is never modified; merging happens on a per-request copy.

use std::fmt;

use edge_core::ScriptSrcSet;
use http::header::{HeaderName, CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY_REPORT_ONLY};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Directive that receives inline-script hashes.
pub const SCRIPT_SRC: &str = "script-src";
/// Source keyword for same-origin scripts.
pub const SELF_SOURCE: &str = "'self'";
/// Source keyword added in development for hot reloading.
pub const UNSAFE_EVAL_SOURCE: &str = "'unsafe-eval'";

/// Result type for CSP operations.
pub type CspResult<T> = Result<T, CspError>;

/// CSP configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CspError {
    #[error("invalid directive name: {0:?}")]
    InvalidDirective(String),

    #[error("invalid source {value:?} in directive {directive}")]
    InvalidSource { directive: String, value: String },
}

/// CSP configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CspOptions {
    /// Whether the CSP header is emitted.
    pub enabled: bool,
    /// Send `Content-Security-Policy-Report-Only` instead of enforcing.
    pub report_only: bool,
    /// Extra `script-src` sources. Takes precedence over `policies`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_sources: Option<Vec<String>>,
    /// Full policy, directive name to sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies: Option<CspPolicies>,
}

impl CspOptions {
    /// Enabled CSP with only the base `script-src` directive.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Use report-only mode.
    pub fn report_only(mut self, report_only: bool) -> Self {
        self.report_only = report_only;
        self
    }

    /// Set the `script-src` allow-list.
    pub fn with_allowed_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    /// Set the full policy.
    pub fn with_policies(mut self, policies: CspPolicies) -> Self {
        self.policies = Some(policies);
        self
    }

    /// The header this configuration is sent under.
    pub fn header(&self) -> CspHeader {
        if self.report_only {
            CspHeader::ReportOnly
        } else {
            CspHeader::Enforce
        }
    }

    /// Check directive names and sources.
    pub fn validate(&self) -> CspResult<()> {
        if let Some(sources) = &self.allowed_sources {
            validate_sources(SCRIPT_SRC, sources)?;
        }
        if let Some(policies) = &self.policies {
            policies.validate()?;
        }
        Ok(())
    }
}

/// Which CSP header to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CspHeader {
    /// `Content-Security-Policy`.
    Enforce,
    /// `Content-Security-Policy-Report-Only`.
    ReportOnly,
}

impl CspHeader {
    /// Header name.
    pub fn name(&self) -> HeaderName {
        match self {
            Self::Enforce => CONTENT_SECURITY_POLICY,
            Self::ReportOnly => CONTENT_SECURITY_POLICY_REPORT_ONLY,
        }
    }
}

/// Ordered CSP policy: directives keep their declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CspPolicies {
    directives: Vec<(String, Vec<String>)>,
}

impl CspPolicies {
    /// Create an empty policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directive (builder form).
    pub fn directive<I, S>(mut self, name: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, sources.into_iter().map(Into::into).collect());
        self
    }

    /// Set a directive. An existing directive keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, sources: Vec<String>) {
        let name = name.into();
        match self.directives.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = sources,
            None => self.directives.push((name, sources)),
        }
    }

    /// Sources of a directive.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.directives
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, sources)| sources.as_slice())
    }

    /// Check if a directive is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate directives in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.directives
            .iter()
            .map(|(name, sources)| (name.as_str(), sources.as_slice()))
    }

    /// Number of directives.
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Check directive names and sources.
    pub fn validate(&self) -> CspResult<()> {
        for (name, sources) in &self.directives {
            if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == ';' || c == ',') {
                return Err(CspError::InvalidDirective(name.clone()));
            }
            validate_sources(name, sources)?;
        }
        Ok(())
    }
}

impl fmt::Display for CspPolicies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, sources)) in self.directives.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(name)?;
            for source in sources {
                write!(f, " {}", source)?;
            }
        }
        Ok(())
    }
}

impl Serialize for CspPolicies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.directives.len()))?;
        for (name, sources) in &self.directives {
            map.serialize_entry(name, sources)?;
        }
        map.end()
    }
}

/// A directive value: one source or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum DirectiveSources {
    One(String),
    Many(Vec<String>),
}

impl From<DirectiveSources> for Vec<String> {
    fn from(value: DirectiveSources) -> Self {
        match value {
            DirectiveSources::One(source) => vec![source],
            DirectiveSources::Many(sources) => sources,
        }
    }
}

struct CspPoliciesVisitor;

impl<'de> Visitor<'de> for CspPoliciesVisitor {
    type Value = CspPolicies;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of CSP directive names to sources")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut policies = CspPolicies::new();
        while let Some((name, sources)) = access.next_entry::<String, DirectiveSources>()? {
            policies.insert(name, sources.into());
        }
        Ok(policies)
    }
}

impl<'de> Deserialize<'de> for CspPolicies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CspPoliciesVisitor)
    }
}

fn validate_sources(directive: &str, sources: &[String]) -> CspResult<()> {
    for source in sources {
        if source.is_empty() || source.chars().any(|c| c == ';' || c.is_control()) {
            return Err(CspError::InvalidSource {
                directive: directive.to_string(),
                value: source.clone(),
            });
        }
    }
    Ok(())
}

/// Build the CSP header value for one render.
///
/// Precedence:
/// 1. `allowed_sources` set: `script-src 'self' ['unsafe-eval'] <hashes> <sources>`
/// 2. `policies` set: every directive, with `script-src` merged per [`merge_policies`]
/// 3. otherwise: `script-src 'self' ['unsafe-eval'] <hashes>`
///
/// `'unsafe-eval'` is only added in development and only in branches 1 and 3.
pub fn build_csp(hashes: &ScriptSrcSet, options: &CspOptions, dev: bool) -> String {
    if let Some(allowed) = &options.allowed_sources {
        return base_script_src(hashes, dev, allowed);
    }
    if let Some(policies) = &options.policies {
        return merge_policies(policies, hashes).to_string();
    }
    base_script_src(hashes, dev, &[])
}

/// Merge render hashes into a copy of the configured policy.
///
/// `script-src` becomes the hashes, then `'self'`, then any configured
/// `script-src` sources, each at most once. A policy without `script-src`
/// gets it appended as its last directive.
pub fn merge_policies(policies: &CspPolicies, hashes: &ScriptSrcSet) -> CspPolicies {
    let mut script_src = hashes.clone();
    script_src.insert(SELF_SOURCE);
    if let Some(configured) = policies.get(SCRIPT_SRC) {
        script_src.extend(configured.iter().cloned());
    }

    let mut merged = policies.clone();
    merged.insert(SCRIPT_SRC, script_src.into());
    merged
}

fn base_script_src(hashes: &ScriptSrcSet, dev: bool, extra: &[String]) -> String {
    let mut tokens = vec![SCRIPT_SRC, SELF_SOURCE];
    if dev {
        tokens.push(UNSAFE_EVAL_SOURCE);
    }
    tokens.extend(hashes.iter());
    tokens.extend(extra.iter().map(String::as_str));
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashes(values: &[&str]) -> ScriptSrcSet {
        values.iter().copied().collect()
    }

    fn script_src_tokens(csp: &str) -> Vec<&str> {
        csp.split("; ")
            .find(|d| d.starts_with("script-src"))
            .map(|d| d.split(' ').skip(1).collect())
            .unwrap_or_default()
    }

    // === Base Directive ===

    #[test]
    fn test_base_directive_only_hashes() {
        let csp = build_csp(&hashes(&["sha256-AAA="]), &CspOptions::enabled(), false);
        assert_eq!(csp, "script-src 'self' sha256-AAA=");
    }

    #[test]
    fn test_base_directive_dev_adds_unsafe_eval() {
        let csp = build_csp(&hashes(&["sha256-AAA="]), &CspOptions::enabled(), true);
        assert_eq!(csp, "script-src 'self' 'unsafe-eval' sha256-AAA=");
    }

    #[test]
    fn test_base_directive_without_hashes() {
        let csp = build_csp(&ScriptSrcSet::new(), &CspOptions::enabled(), false);
        assert_eq!(csp, "script-src 'self'");
    }

    // === Allow-list ===

    #[test]
    fn test_allowed_sources_are_appended() {
        let options = CspOptions::enabled().with_allowed_sources(["https://cdn.example", "'unsafe-inline'"]);
        let csp = build_csp(&hashes(&["sha256-AAA="]), &options, false);
        assert_eq!(
            csp,
            "script-src 'self' sha256-AAA= https://cdn.example 'unsafe-inline'"
        );
    }

    #[test]
    fn test_allowed_sources_take_precedence_over_policies() {
        let options = CspOptions::enabled()
            .with_allowed_sources(["https://a.example"])
            .with_policies(CspPolicies::new().directive("default-src", ["'none'"]));
        let csp = build_csp(&hashes(&["h1"]), &options, true);
        assert_eq!(csp, "script-src 'self' 'unsafe-eval' h1 https://a.example");
    }

    #[test]
    fn test_empty_allow_list_still_wins() {
        let options = CspOptions::enabled()
            .with_allowed_sources(Vec::<String>::new())
            .with_policies(CspPolicies::new().directive("default-src", ["'none'"]));
        assert_eq!(build_csp(&hashes(&["h1"]), &options, false), "script-src 'self' h1");
    }

    // === Policy Mapping ===

    #[test]
    fn test_policy_merges_existing_script_src() {
        let policies = CspPolicies::new().directive("script-src", ["https://cdn.example"]);
        let options = CspOptions::enabled().with_policies(policies);
        let csp = build_csp(&hashes(&["sha256-BBB="]), &options, false);

        let tokens = script_src_tokens(&csp);
        for expected in ["'self'", "sha256-BBB=", "https://cdn.example"] {
            assert_eq!(tokens.iter().filter(|t| **t == expected).count(), 1, "{}", expected);
        }
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_policy_without_script_src_appends_it() {
        let policies = CspPolicies::new()
            .directive("default-src", ["'self'"])
            .directive("img-src", ["'self'", "data:"]);
        let options = CspOptions::enabled().with_policies(policies);
        let csp = build_csp(&hashes(&["h1", "h2"]), &options, false);
        assert_eq!(
            csp,
            "default-src 'self'; img-src 'self' data:; script-src h1 h2 'self'"
        );
    }

    #[test]
    fn test_policy_keeps_script_src_position() {
        let policies = CspPolicies::new()
            .directive("script-src", ["'self'", "https://x.example"])
            .directive("object-src", ["'none'"]);
        let options = CspOptions::enabled().with_policies(policies);
        let csp = build_csp(&hashes(&["h1"]), &options, false);
        assert_eq!(csp, "script-src h1 'self' https://x.example; object-src 'none'");
    }

    #[test]
    fn test_policy_branch_ignores_dev() {
        let options = CspOptions::enabled().with_policies(CspPolicies::new());
        assert_eq!(build_csp(&hashes(&["h1"]), &options, true), "script-src h1 'self'");
    }

    #[test]
    fn test_merge_does_not_touch_configuration() {
        let policies = CspPolicies::new().directive("script-src", ["https://cdn.example"]);
        let options = CspOptions::enabled().with_policies(policies.clone());

        build_csp(&hashes(&["first"]), &options, false);
        let second = build_csp(&hashes(&["second"]), &options, false);

        assert_eq!(options.policies.as_ref(), Some(&policies));
        assert!(!second.contains("first"));
    }

    #[test]
    fn test_self_always_present() {
        let set = hashes(&["h"]);
        let variants = [
            CspOptions::enabled(),
            CspOptions::enabled().with_allowed_sources(["https://a"]),
            CspOptions::enabled().with_policies(CspPolicies::new().directive("default-src", ["'none'"])),
        ];
        for options in &variants {
            for dev in [false, true] {
                let csp = build_csp(&set, options, dev);
                let tokens = script_src_tokens(&csp);
                assert!(tokens.contains(&"'self'"), "{}", csp);
                assert!(tokens.contains(&"h"), "{}", csp);
            }
        }
    }

    // === Header ===

    #[test]
    fn test_header_name() {
        assert_eq!(CspOptions::enabled().header().name(), CONTENT_SECURITY_POLICY);
        assert_eq!(
            CspOptions::enabled().report_only(true).header().name().as_str(),
            "content-security-policy-report-only"
        );
    }

    // === Serde & Validation ===

    #[test]
    fn test_policies_deserialize_in_declaration_order() {
        let options: CspOptions = serde_json::from_str(
            r#"{"enabled":true,"policies":{"object-src":["'none'"],"script-src":"https://cdn.example","base-uri":["'self'"]}}"#,
        )
        .unwrap();
        let policies = options.policies.unwrap();
        let names: Vec<&str> = policies.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["object-src", "script-src", "base-uri"]);
        assert_eq!(policies.get("script-src").unwrap(), &["https://cdn.example".to_string()]);
    }

    #[test]
    fn test_policies_serialize_as_map() {
        let policies = CspPolicies::new().directive("default-src", ["'self'"]);
        let json = serde_json::to_string(&policies).unwrap();
        assert_eq!(json, r#"{"default-src":["'self'"]}"#);
    }

    #[test]
    fn test_validate_rejects_bad_directive() {
        let options = CspOptions::enabled().with_policies(CspPolicies::new().directive("script src", ["x"]));
        assert_eq!(
            options.validate(),
            Err(CspError::InvalidDirective("script src".into()))
        );
    }

    #[test]
    fn test_validate_rejects_injected_source() {
        let options = CspOptions::enabled().with_allowed_sources(["https://a; object-src *"]);
        assert!(matches!(options.validate(), Err(CspError::InvalidSource { .. })));
        assert!(CspOptions::enabled()
            .with_allowed_sources(["https://a"])
            .validate()
            .is_ok());
    }
}
