//! Base path resolution for asset URLs.
//!
//! Where the `img/...` tree lives depends on how the viewer is deployed: served
//! from the root of a host, or hosted under a project sub-path on a static
//! hosting subdomain. Which rule applies is a [`BasePathPolicy`] chosen by the
//! caller; none of them is treated as the one correct heuristic.

use std::fmt::Display;

/// The parts of the deployment location that base path resolution looks at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub hostname: String,
    pub pathname: String,
}

impl Location {
    pub fn new(hostname: impl Into<String>, pathname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            pathname: pathname.into(),
        }
    }

    /// The location used when there is no browser around (native builds).
    pub fn local() -> Self {
        Self::new("localhost", "/")
    }

    /// Reads hostname and path from `window.location`.
    #[cfg(target_arch = "wasm32")]
    pub fn from_window() -> Option<Self> {
        let location = web_sys::window()?.location();
        Some(Self {
            hostname: location.hostname().ok()?,
            pathname: location.pathname().ok()?,
        })
    }

    /// First directory of the path, e.g. `project` for `/project/index.html`.
    ///
    /// A lone last segment (`/index.html`) names a document, not a directory.
    pub fn first_directory(&self) -> Option<&str> {
        self.pathname
            .trim_start_matches('/')
            .split_once('/')
            .map(|(segment, _)| segment)
            .filter(|segment| !segment.is_empty())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BasePathError {
    #[error("host {hostname} serves projects from a sub-path but path {pathname:?} has no project segment")]
    MissingProjectSegment { hostname: String, pathname: String },
}

/// URL prefix under which the asset tree is reachable. Computed once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasePath(String);

impl BasePath {
    pub fn current_dir() -> Self {
        Self(".".to_string())
    }

    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins `relative` onto the prefix with exactly one separating slash.
    pub fn join(&self, relative: &str) -> String {
        let prefix = self.0.trim_end_matches('/');
        let relative = relative.trim_start_matches('/');
        format!("{prefix}/{relative}")
    }
}

impl Display for BasePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A rule that maps a deployment location to the asset base path.
pub trait BasePathPolicy {
    fn resolve(&self, location: &Location) -> Result<BasePath, BasePathError>;
}

/// Always the relative current directory (`.`).
#[derive(Clone, Debug, Default)]
pub struct CurrentDir;

impl BasePathPolicy for CurrentDir {
    fn resolve(&self, _: &Location) -> Result<BasePath, BasePathError> {
        Ok(BasePath::current_dir())
    }
}

/// A hard-coded prefix regardless of where the viewer runs.
#[derive(Clone, Debug)]
pub struct Fixed(pub String);

impl BasePathPolicy for Fixed {
    fn resolve(&self, _: &Location) -> Result<BasePath, BasePathError> {
        Ok(BasePath::new(self.0.clone()))
    }
}

/// Uses `prefix` whenever the hostname contains `needle`, the current directory otherwise.
#[derive(Clone, Debug)]
pub struct HostSniffing {
    pub needle: String,
    pub prefix: String,
}

impl BasePathPolicy for HostSniffing {
    fn resolve(&self, location: &Location) -> Result<BasePath, BasePathError> {
        if location.hostname.contains(&self.needle) {
            Ok(BasePath::new(self.prefix.clone()))
        } else {
            Ok(BasePath::current_dir())
        }
    }
}

/// Static hosting subdomains (e.g. `<user>.github.io`) serve each project under
/// `/<project>/`. On such a host the first path segment becomes the prefix.
#[derive(Clone, Debug)]
pub struct ProjectSubPath {
    pub host_suffix: String,
}

impl ProjectSubPath {
    pub fn new(host_suffix: impl Into<String>) -> Self {
        Self {
            host_suffix: host_suffix.into(),
        }
    }
}

impl ProjectSubPath {
    // `github.io` matches `someone.github.io` but not `notgithub.io`
    fn matches_host(&self, hostname: &str) -> bool {
        hostname == self.host_suffix
            || hostname
                .strip_suffix(self.host_suffix.as_str())
                .is_some_and(|rest| rest.ends_with('.'))
    }
}

impl BasePathPolicy for ProjectSubPath {
    fn resolve(&self, location: &Location) -> Result<BasePath, BasePathError> {
        if !self.matches_host(&location.hostname) {
            return Ok(BasePath::current_dir());
        }
        match location.first_directory() {
            Some(project) => Ok(BasePath::new(format!("/{project}"))),
            None => Err(BasePathError::MissingProjectSegment {
                hostname: location.hostname.clone(),
                pathname: location.pathname.clone(),
            }),
        }
    }
}

/// Selects one of the policies above. This is what [`crate::config::ViewerConfig`] carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BasePathStrategy {
    CurrentDir,
    Fixed(String),
    HostSniffing { needle: String, prefix: String },
    ProjectSubPath { host_suffix: String },
}

impl Default for BasePathStrategy {
    fn default() -> Self {
        Self::ProjectSubPath {
            host_suffix: "github.io".to_string(),
        }
    }
}

impl BasePathPolicy for BasePathStrategy {
    fn resolve(&self, location: &Location) -> Result<BasePath, BasePathError> {
        match self {
            BasePathStrategy::CurrentDir => CurrentDir.resolve(location),
            BasePathStrategy::Fixed(prefix) => Fixed(prefix.clone()).resolve(location),
            BasePathStrategy::HostSniffing { needle, prefix } => HostSniffing {
                needle: needle.clone(),
                prefix: prefix.clone(),
            }
            .resolve(location),
            BasePathStrategy::ProjectSubPath { host_suffix } => {
                ProjectSubPath::new(host_suffix.clone()).resolve(location)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "img/green-apple3d/apple02.obj";

    #[test]
    fn localhost_resolves_to_current_dir() {
        let base = BasePathStrategy::default()
            .resolve(&Location::new("localhost", "/index.html"))
            .unwrap();
        assert_eq!(base.as_str(), ".");
        assert_eq!(base.join(MODEL), "./img/green-apple3d/apple02.obj");
    }

    #[test]
    fn hosted_project_uses_first_directory() {
        let policy = ProjectSubPath::new("github.io");
        let base = policy
            .resolve(&Location::new("someone.github.io", "/orchard/index.html"))
            .unwrap();
        assert_eq!(base.as_str(), "/orchard");
        assert_eq!(base.join(MODEL), "/orchard/img/green-apple3d/apple02.obj");
    }

    #[test]
    fn hosted_project_without_trailing_file() {
        let policy = ProjectSubPath::new("github.io");
        let base = policy
            .resolve(&Location::new("someone.github.io", "/orchard/"))
            .unwrap();
        assert_eq!(base.join(MODEL), "/orchard/img/green-apple3d/apple02.obj");
    }

    #[test]
    fn hosted_root_without_project_is_an_error() {
        let policy = ProjectSubPath::new("github.io");
        for path in ["/", "", "//"] {
            let err = policy
                .resolve(&Location::new("someone.github.io", path))
                .unwrap_err();
            assert!(matches!(err, BasePathError::MissingProjectSegment { .. }));
        }
    }

    #[test]
    fn user_site_document_is_not_a_project() {
        let policy = ProjectSubPath::new("github.io");
        for path in ["/index.html", "/orchard"] {
            let err = policy
                .resolve(&Location::new("someone.github.io", path))
                .unwrap_err();
            assert!(matches!(err, BasePathError::MissingProjectSegment { .. }));
        }
    }

    #[test]
    fn host_suffix_needs_a_label_boundary() {
        let policy = ProjectSubPath::new("github.io");
        let base = policy
            .resolve(&Location::new("notgithub.io", "/orchard/"))
            .unwrap();
        assert_eq!(base.as_str(), ".");
        assert_eq!(base.join(MODEL), "./img/green-apple3d/apple02.obj");

        let base = policy
            .resolve(&Location::new("github.io", "/orchard/"))
            .unwrap();
        assert_eq!(base.as_str(), "/orchard");
    }

    #[test]
    fn location_first_directory() {
        assert_eq!(Location::new("h", "/a/b/c.html").first_directory(), Some("a"));
        assert_eq!(Location::new("h", "a/").first_directory(), Some("a"));
        assert_eq!(Location::new("h", "/c.html").first_directory(), None);
        assert_eq!(Location::new("h", "//x").first_directory(), None);
    }

    #[test]
    fn host_sniffing_only_matches_needle() {
        let policy = HostSniffing {
            needle: "github".to_string(),
            prefix: "/orchard".to_string(),
        };
        assert_eq!(
            policy
                .resolve(&Location::new("someone.github.io", "/"))
                .unwrap()
                .as_str(),
            "/orchard"
        );
        assert_eq!(
            policy
                .resolve(&Location::new("127.0.0.1", "/orchard/"))
                .unwrap()
                .as_str(),
            "."
        );
    }

    #[test]
    fn fixed_ignores_location() {
        let base = Fixed("https://cdn.example.com/apple/".to_string())
            .resolve(&Location::local())
            .unwrap();
        assert_eq!(
            base.join(MODEL),
            "https://cdn.example.com/apple/img/green-apple3d/apple02.obj"
        );
    }
}
