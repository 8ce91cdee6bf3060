//! Mapping build targets back to workspace projects.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use url::Url;

pub type ResyncFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// The IDE-side project model the client refreshes when targets change.
pub trait ProjectModel: Send + Sync + 'static {
    /// Project owning `target`. The URI has already had its query removed.
    fn project_for_target(&self, target: &Url) -> Option<String>;

    /// Re-synchronize one project with the build server.
    fn resync(&self, project: String) -> ResyncFuture;
}

/// Parse a build target URI and drop its query (`?sourceset=main`).
pub fn strip_query(uri: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(uri)?;
    url.set_query(None);
    Ok(url)
}

/// Configured project roots; a target belongs to the deepest root containing it.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceRoots {
    roots: Vec<PathBuf>,
}

impl WorkspaceRoots {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    /// Longest root that is a path prefix of `path`, compared by component.
    #[must_use]
    pub fn root_for_path(&self, path: &Path) -> Option<&Path> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .map(PathBuf::as_path)
    }

    /// Owning root of a `file:` target URI, as a display string.
    #[must_use]
    pub fn project_for_target(&self, target: &Url) -> Option<String> {
        let path = target.to_file_path().ok()?;
        self.root_for_path(&path)
            .map(|root| root.display().to_string())
    }
}
