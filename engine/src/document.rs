//! Which documents get linted, and where actionlint runs for them.

use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use url::Url;

/// Language identifiers editors use for workflow files.
pub const WORKFLOW_LANGUAGE_IDS: &[&str] = &["github-actions-workflow", "yaml"];

pub const WORKFLOW_GLOB: &str = "**/.github/workflows/*.{yml,yaml}";

/// An open buffer as the editor describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    pub uri: Url,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

impl TextDocument {
    #[must_use]
    pub fn new(uri: Url, language_id: impl Into<String>, version: i32, text: impl Into<String>) -> Self {
        Self {
            uri,
            language_id: language_id.into(),
            version,
            text: text.into(),
        }
    }
}

/// Decides whether a document is a workflow file on disk.
///
/// Untitled buffers, diff views and other non-`file` schemes never qualify.
#[derive(Debug, Clone)]
pub struct WorkflowFilter {
    matcher: GlobMatcher,
}

impl Default for WorkflowFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowFilter {
    #[must_use]
    pub fn new() -> Self {
        let mut builder = GlobBuilder::new(WORKFLOW_GLOB);
        builder.literal_separator(true);
        if cfg!(windows) {
            builder.case_insensitive(true);
        }
        let glob = builder.build().expect("valid workflow glob");
        Self {
            matcher: glob.compile_matcher(),
        }
    }

    #[must_use]
    pub fn qualifies(&self, uri: &Url, language_id: &str) -> bool {
        if uri.scheme() != "file" || !WORKFLOW_LANGUAGE_IDS.contains(&language_id) {
            return false;
        }
        uri.to_file_path()
            .is_ok_and(|path| self.matcher.is_match(&path))
    }
}

/// Where to run the tool and what to call the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub working_dir: PathBuf,
    /// `/`-separated, relative to `working_dir`.
    pub relative_path: String,
}

/// Workspace folders known to the host.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceRoots {
    roots: Vec<PathBuf>,
}

impl WorkspaceRoots {
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn set(&mut self, roots: Vec<PathBuf>) {
        self.roots = roots;
    }

    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// The innermost root containing `path`.
    #[must_use]
    pub fn root_for(&self, path: &Path) -> Option<&Path> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .map(PathBuf::as_path)
    }

    /// Run from the containing workspace root when there is one; otherwise
    /// from the file's own directory, naming the buffer by its file name.
    #[must_use]
    pub fn locate(&self, path: &Path) -> Location {
        if let Some(root) = self.root_for(path)
            && let Ok(relative) = path.strip_prefix(root)
        {
            return Location {
                working_dir: root.to_path_buf(),
                relative_path: to_forward_slashes(relative),
            };
        }

        let working_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let relative_path = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Location {
            working_dir,
            relative_path,
        }
    }
}

fn to_forward_slashes(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_uri(path: &str) -> Url {
        Url::from_file_path(path).unwrap()
    }

    #[cfg(not(windows))]
    #[test]
    fn test_workflow_files_qualify() {
        let filter = WorkflowFilter::new();
        for path in [
            "/repo/.github/workflows/ci.yml",
            "/repo/.github/workflows/release.yaml",
            "/deep/nested/repo/.github/workflows/x.yml",
        ] {
            assert!(filter.qualifies(&file_uri(path), "yaml"), "{path}");
        }
        assert!(filter.qualifies(
            &file_uri("/repo/.github/workflows/ci.yml"),
            "github-actions-workflow"
        ));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_other_paths_do_not_qualify() {
        let filter = WorkflowFilter::new();
        for path in [
            "/repo/.github/dependabot.yml",
            "/repo/.github/workflows/sub/ci.yml",
            "/repo/workflows/ci.yml",
            "/repo/.github/workflows/ci.json",
        ] {
            assert!(!filter.qualifies(&file_uri(path), "yaml"), "{path}");
        }
    }

    #[cfg(not(windows))]
    #[test]
    fn test_language_id_must_match() {
        let filter = WorkflowFilter::new();
        let uri = file_uri("/repo/.github/workflows/ci.yml");
        assert!(!filter.qualifies(&uri, "plaintext"));
        assert!(!filter.qualifies(&uri, "json"));
    }

    #[test]
    fn test_non_file_schemes_never_qualify() {
        let filter = WorkflowFilter::new();
        for uri in [
            "untitled:/repo/.github/workflows/ci.yml",
            "git:/repo/.github/workflows/ci.yml?ref=HEAD",
            "vscode-diff:/repo/.github/workflows/ci.yml",
        ] {
            let uri = Url::parse(uri).unwrap();
            assert!(!filter.qualifies(&uri, "yaml"), "{uri}");
        }
    }

    #[cfg(not(windows))]
    #[test]
    fn test_locate_under_root() {
        let roots = WorkspaceRoots::new(vec![PathBuf::from("/repo")]);
        let location = roots.locate(Path::new("/repo/.github/workflows/ci.yml"));
        assert_eq!(location.working_dir, PathBuf::from("/repo"));
        assert_eq!(location.relative_path, ".github/workflows/ci.yml");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_locate_prefers_innermost_root() {
        let roots = WorkspaceRoots::new(vec![
            PathBuf::from("/mono"),
            PathBuf::from("/mono/services/api"),
        ]);
        let location = roots.locate(Path::new("/mono/services/api/.github/workflows/ci.yml"));
        assert_eq!(location.working_dir, PathBuf::from("/mono/services/api"));
        assert_eq!(location.relative_path, ".github/workflows/ci.yml");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_locate_without_root_uses_parent() {
        let roots = WorkspaceRoots::default();
        let location = roots.locate(Path::new("/elsewhere/.github/workflows/ci.yml"));
        assert_eq!(
            location.working_dir,
            PathBuf::from("/elsewhere/.github/workflows")
        );
        assert_eq!(location.relative_path, "ci.yml");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_root_must_be_component_prefix() {
        let roots = WorkspaceRoots::new(vec![PathBuf::from("/rep")]);
        assert!(roots.root_for(Path::new("/repo/.github/workflows/ci.yml")).is_none());
    }

    #[cfg(windows)]
    #[test]
    fn test_locate_normalizes_separators() {
        let roots = WorkspaceRoots::new(vec![PathBuf::from(r"C:\repo")]);
        let location = roots.locate(Path::new(r"C:\repo\.github\workflows\ci.yml"));
        assert_eq!(location.relative_path, ".github/workflows/ci.yml");
    }
}
