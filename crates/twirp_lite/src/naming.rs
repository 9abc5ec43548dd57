use std::fmt;

use crate::error::NamingError;

/// Path prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "/twirp";

/// How a declared service or method identifier becomes a URL path segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NamingPolicy {
    /// Identifiers are used exactly as declared, underscores included.
    Literal,

    /// Service and method identifiers are re-cased with [`legacy_camel_case`].
    ///
    /// This is what long-lived generated clients emit, so it stays the default.
    #[default]
    LegacyCamelCase,
}

/// Normalize a configured path prefix.
///
/// `""` and `"/"` mean "no prefix". Anything else gains a leading `/` and
/// loses any trailing `/`, so `"twirp/"` becomes `"/twirp"`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

/// Re-case an identifier the way the legacy generator did.
///
/// - a leading `_` becomes `X` and the letter after it is upper-cased
/// - `_` followed by an ASCII lowercase letter is dropped and the letter upper-cased
/// - any other `_` is kept as is
/// - everything else, the first word included, keeps its original case
///
/// Identifiers without underscores come back unchanged. The exact output for
/// odd inputs (leading or doubled underscores, digits) is frozen by the
/// conformance table in the tests below.
pub fn legacy_camel_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let mut chars = ident.chars().peekable();
    let mut upper_next = false;

    if ident.starts_with('_') {
        out.push('X');
        chars.next();
        upper_next = true;
    }

    while let Some(c) = chars.next() {
        if c == '_' && chars.peek().is_some_and(char::is_ascii_lowercase) {
            upper_next = true;
            continue;
        }

        if upper_next {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
        upper_next = false;
    }

    out
}

fn validate(component: &'static str, value: &str) -> Result<(), NamingError> {
    if value.is_empty() {
        return Err(NamingError::InvalidIdentifier {
            component,
            value: value.to_owned(),
            reason: "must not be empty",
        });
    }
    if value.contains('/') {
        return Err(NamingError::InvalidIdentifier {
            component,
            value: value.to_owned(),
            reason: "must not contain '/'",
        });
    }
    Ok(())
}

/// Build `{prefix}/{package}.{service}/{method}` with identifiers kept verbatim.
pub fn literal_path(
    prefix: &str,
    package: &str,
    service: &str,
    method: &str,
) -> Result<String, NamingError> {
    validate("package", package)?;
    validate("service", service)?;
    validate("method", method)?;

    Ok(format!(
        "{}/{package}.{service}/{method}",
        normalize_prefix(prefix)
    ))
}

/// Build the same path as [`literal_path`] after camel-casing the service and
/// method identifiers. The package is never re-cased.
pub fn legacy_camel_path(
    prefix: &str,
    package: &str,
    service: &str,
    method: &str,
) -> Result<String, NamingError> {
    validate("package", package)?;
    validate("service", service)?;
    validate("method", method)?;

    Ok(format!(
        "{}/{package}.{}/{}",
        normalize_prefix(prefix),
        legacy_camel_case(service),
        legacy_camel_case(method)
    ))
}

/// Build a path under the given policy.
pub fn path_for(
    policy: NamingPolicy,
    prefix: &str,
    package: &str,
    service: &str,
    method: &str,
) -> Result<String, NamingError> {
    match policy {
        NamingPolicy::Literal => literal_path(prefix, package, service, method),
        NamingPolicy::LegacyCamelCase => legacy_camel_path(prefix, package, service, method),
    }
}

/// A parsed request path: `{prefix}/{package}.{service}/{method}`
///
/// Example: `/twirp/example.hats.Haberdasher/MakeHat`
/// - `prefix`: `/twirp`
/// - `package`: `example.hats`
/// - `service`: `Haberdasher`
/// - `method`: `MakeHat`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePath {
    pub prefix: String,
    pub package: String,
    pub service: String,
    pub method: String,
}

impl RoutePath {
    /// Parse a request path.
    ///
    /// The prefix may itself contain slashes, so we split from the right.
    pub fn parse(path: &str) -> Result<Self, NamingError> {
        let (service_path, method) = path
            .rsplit_once('/')
            .ok_or_else(|| NamingError::InvalidPath(format!("path must contain '/': '{path}'")))?;

        let (prefix, service_path) = service_path.rsplit_once('/').ok_or_else(|| {
            NamingError::InvalidPath(format!(
                "path must have the form prefix/package.service/method: '{path}'"
            ))
        })?;

        let (package, service) = service_path.rsplit_once('.').ok_or_else(|| {
            NamingError::InvalidPath(format!(
                "service path must contain package.service: '{service_path}'"
            ))
        })?;

        if package.is_empty() || service.is_empty() || method.is_empty() {
            return Err(NamingError::InvalidPath(format!(
                "package, service, and method must all be non-empty: '{path}'"
            )));
        }

        Ok(RoutePath {
            prefix: prefix.to_owned(),
            package: package.to_owned(),
            service: service.to_owned(),
            method: method.to_owned(),
        })
    }

    /// Returns the full service name: `{package}.{service}`
    pub fn full_service(&self) -> String {
        format!("{}.{}", self.package, self.service)
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}.{}/{}",
            self.prefix, self.package, self.service, self.method
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PKG: &str = "internal.twirptest.snake_case_names";

    #[test]
    fn test_snake_case_service_paths() {
        assert_eq!(
            literal_path(DEFAULT_PREFIX, PKG, "Haberdasher_v1", "MakeHat_v1").unwrap(),
            "/twirp/internal.twirptest.snake_case_names.Haberdasher_v1/MakeHat_v1"
        );
        assert_eq!(
            legacy_camel_path(DEFAULT_PREFIX, PKG, "Haberdasher_v1", "MakeHat_v1").unwrap(),
            "/twirp/internal.twirptest.snake_case_names.HaberdasherV1/MakeHatV1"
        );
    }

    #[test]
    fn test_legacy_camel_case_conformance() {
        let table = [
            ("Haberdasher_v1", "HaberdasherV1"),
            ("MakeHat_v1", "MakeHatV1"),
            ("MakeHat", "MakeHat"),
            ("make_hat", "makeHat"),
            ("makeHat", "makeHat"),
            ("snake_case_v2", "snakeCaseV2"),
            ("_leading", "XLeading"),
            ("__double", "XDouble"),
            ("a__b", "a_B"),
            ("Get_ID", "Get_ID"),
            ("foo_1bar", "foo_1bar"),
            ("v1beta", "v1beta"),
            ("_1x", "X1x"),
            ("V1beta_thing", "V1betaThing"),
            ("HTTPServer", "HTTPServer"),
            ("trailing_", "trailing_"),
            ("x", "x"),
        ];
        for (input, expected) in table {
            assert_eq!(legacy_camel_case(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_paths_identical_without_underscores() {
        for (service, method) in [("Haberdasher", "MakeHat"), ("lower", "call2"), ("A1", "B2c")] {
            assert_eq!(
                literal_path(DEFAULT_PREFIX, "pkg.sub_pkg", service, method).unwrap(),
                legacy_camel_path(DEFAULT_PREFIX, "pkg.sub_pkg", service, method).unwrap(),
            );
        }
    }

    #[test]
    fn test_package_is_never_recased() {
        let path = legacy_camel_path("/twirp", "my_pkg.v_1", "Svc_a", "Do_it").unwrap();
        assert_eq!(path, "/twirp/my_pkg.v_1.SvcA/DoIt");
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(matches!(
            literal_path("/twirp", "", "Svc", "M"),
            Err(NamingError::InvalidIdentifier { component: "package", .. })
        ));
        assert!(matches!(
            legacy_camel_path("/twirp", "pkg", "Svc", ""),
            Err(NamingError::InvalidIdentifier { component: "method", .. })
        ));
        assert!(matches!(
            literal_path("/twirp", "pkg", "a/b", "M"),
            Err(NamingError::InvalidIdentifier { component: "service", .. })
        ));
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("twirp"), "/twirp");
        assert_eq!(normalize_prefix("/twirp/"), "/twirp");
        assert_eq!(normalize_prefix("/api/v2"), "/api/v2");
        assert_eq!(
            literal_path("", "pkg", "Svc", "M").unwrap(),
            "/pkg.Svc/M"
        );
    }

    #[test]
    fn test_path_for_policy() {
        assert_eq!(
            path_for(NamingPolicy::Literal, "/twirp", "pkg", "S_x", "m_y").unwrap(),
            "/twirp/pkg.S_x/m_y"
        );
        assert_eq!(
            path_for(NamingPolicy::default(), "/twirp", "pkg", "S_x", "m_y").unwrap(),
            "/twirp/pkg.SX/mY"
        );
    }

    #[test]
    fn test_route_path_parse() {
        let path = RoutePath::parse("/twirp/example.hats.Haberdasher/MakeHat").unwrap();
        assert_eq!(path.prefix, "/twirp");
        assert_eq!(path.package, "example.hats");
        assert_eq!(path.service, "Haberdasher");
        assert_eq!(path.method, "MakeHat");
        assert_eq!(path.full_service(), "example.hats.Haberdasher");
        assert_eq!(path.to_string(), "/twirp/example.hats.Haberdasher/MakeHat");
    }

    #[test]
    fn test_route_path_nested_prefix() {
        let path = RoutePath::parse("/api/v2/pkg.Svc/Call").unwrap();
        assert_eq!(path.prefix, "/api/v2");
        assert_eq!(path.full_service(), "pkg.Svc");
    }

    #[test]
    fn test_route_path_rejects_malformed() {
        assert!(RoutePath::parse("pkg.Svc").is_err());
        assert!(RoutePath::parse("/twirp/Svc/Call").is_err());
        assert!(RoutePath::parse("/twirp/pkg.Svc/").is_err());
    }
}
