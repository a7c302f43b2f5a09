use std::path::{Component, Path, PathBuf};

/// Resolves material file references to bytes under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a reference to a path inside the root. Absolute references and
    /// any `..` component are refused.
    pub fn resolve(&self, file_ref: &str) -> Option<PathBuf> {
        let relative = Path::new(file_ref.trim());
        if relative.as_os_str().is_empty() {
            return None;
        }
        let only_normal = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !only_normal {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Read the referenced file. Unresolvable or unreadable files yield `None`.
    pub async fn read(&self, file_ref: &str) -> Option<Vec<u8>> {
        let Some(path) = self.resolve(file_ref) else {
            tracing::warn!("Refusing file reference outside store: {}", file_ref);
            return None;
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("Could not read {}: {}", path.display(), e);
                None
            }
        }
    }
}
