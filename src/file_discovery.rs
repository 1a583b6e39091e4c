use crate::error::{DtdError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Finds candidate documents under a directory tree
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// Lowercase extensions to accept, without the dot
    extensions: Vec<String>,
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
    /// Directory levels below the root to descend (None = unlimited)
    max_depth: Option<usize>,
    follow_symlinks: bool,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_set: None,
            exclude_set: None,
            max_depth: None,
            follow_symlinks: false,
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Only keep files matching at least one of these globs
    pub fn with_include_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        self.include_set = build_glob_set(&patterns, "include")?;
        Ok(self)
    }

    /// Drop files matching any of these globs
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        self.exclude_set = build_glob_set(&patterns, "exclude")?;
        Ok(self)
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Discover matching files under `path`, sorted by path
    ///
    /// A path naming a single file is returned as-is, whatever its extension.
    pub async fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.discover(path).await?.files)
    }

    /// Like [`FileDiscovery::discover_files`], also counting entries that could not be read
    pub async fn discover(&self, path: &Path) -> Result<Discovery> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| DtdError::FileSystemTraversal {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut found = Discovery::default();
        if metadata.is_file() {
            found.files.push(path.to_path_buf());
            return Ok(found);
        }

        self.walk(path, 0, &mut found).await?;
        found.files.sort();
        Ok(found)
    }

    fn walk<'a>(
        &'a self,
        dir: &'a Path,
        depth: usize,
        found: &'a mut Discovery,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let traversal_error = |e: std::io::Error| DtdError::FileSystemTraversal {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            };

            let mut read_dir = fs::read_dir(dir).await.map_err(traversal_error)?;
            while let Some(entry) = read_dir.next_entry().await.map_err(traversal_error)? {
                let entry_path = entry.path();

                if !self.follow_symlinks && entry_path.is_symlink() {
                    continue;
                }

                let metadata = match fs::metadata(&entry_path).await {
                    Ok(metadata) => metadata,
                    Err(_) => {
                        found.unreadable += 1;
                        continue;
                    }
                };

                if metadata.is_file() {
                    if self.should_process(&entry_path) {
                        found.files.push(entry_path);
                    }
                } else if metadata.is_dir() {
                    if self.max_depth.is_some_and(|max| depth >= max) {
                        continue;
                    }
                    // An unreadable subdirectory does not abort the walk
                    if self.walk(&entry_path, depth + 1, found).await.is_err() {
                        found.unreadable += 1;
                    }
                }
            }

            Ok(())
        })
    }

    /// Extension, exclude and include checks, in that order
    pub fn should_process(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        if !self.extensions.contains(&extension.to_lowercase()) {
            return false;
        }

        if let Some(exclude_set) = &self.exclude_set
            && exclude_set.is_match(path)
        {
            return false;
        }

        match &self.include_set {
            Some(include_set) => include_set.is_match(path),
            None => true,
        }
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a directory walk
#[derive(Debug, Default, Clone)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    /// Entries skipped because their metadata or contents could not be read
    pub unreadable: usize,
}

fn build_glob_set(patterns: &[String], kind: &str) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            DtdError::Config(format!("Invalid {} pattern '{}': {}", kind, pattern, e))
        })?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|e| DtdError::Config(format!("Failed to build {} patterns: {}", kind, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_corpus() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("notes")).await.unwrap();
        fs::create_dir_all(root.join("archive/2019")).await.unwrap();

        fs::write(root.join("a.xml"), "<note/>").await.unwrap();
        fs::write(root.join("b.XML"), "<note/>").await.unwrap();
        fs::write(root.join("readme.txt"), "text").await.unwrap();
        fs::write(root.join("notes/c.xml"), "<note/>").await.unwrap();
        fs::write(root.join("archive/2019/old.xml"), "<note/>")
            .await
            .unwrap();
        fs::write(root.join("archive/2019/old.svg"), "<svg/>")
            .await
            .unwrap();

        temp_dir
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_discovers_sorted_xml_files() {
        let corpus = create_corpus().await;
        let files = FileDiscovery::new()
            .discover_files(corpus.path())
            .await
            .unwrap();

        assert_eq!(names(&files), vec!["a.xml", "old.xml", "b.XML", "c.xml"]);
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[tokio::test]
    async fn test_extra_extensions() {
        let corpus = create_corpus().await;
        let files = FileDiscovery::new()
            .with_extensions(vec!["xml".to_string(), ".svg".to_string()])
            .discover_files(corpus.path())
            .await
            .unwrap();
        assert_eq!(files.len(), 5);
    }

    #[tokio::test]
    async fn test_max_depth() {
        let corpus = create_corpus().await;
        let files = FileDiscovery::new()
            .with_max_depth(Some(1))
            .discover_files(corpus.path())
            .await
            .unwrap();

        let found = names(&files);
        assert!(found.contains(&"c.xml".to_string()));
        assert!(!found.contains(&"old.xml".to_string()));
    }

    #[tokio::test]
    async fn test_include_and_exclude_patterns() {
        let corpus = create_corpus().await;

        let excluded = FileDiscovery::new()
            .with_exclude_patterns(vec!["**/archive/**".to_string()])
            .unwrap()
            .discover_files(corpus.path())
            .await
            .unwrap();
        assert_eq!(excluded.len(), 3);

        let included = FileDiscovery::new()
            .with_include_patterns(vec!["**/notes/*.xml".to_string()])
            .unwrap()
            .discover_files(corpus.path())
            .await
            .unwrap();
        assert_eq!(names(&included), vec!["c.xml"]);
    }

    #[tokio::test]
    async fn test_single_file_is_returned_as_is() {
        let corpus = create_corpus().await;
        let path = corpus.path().join("readme.txt");
        let files = FileDiscovery::new().discover_files(&path).await.unwrap();
        assert_eq!(files, vec![path]);
    }

    #[tokio::test]
    async fn test_missing_root_is_traversal_error() {
        let err = FileDiscovery::new()
            .discover_files(Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, DtdError::FileSystemTraversal { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_counts_as_unreadable() {
        let corpus = create_corpus().await;
        std::os::unix::fs::symlink(
            corpus.path().join("missing.xml"),
            corpus.path().join("notes/link.xml"),
        )
        .unwrap();

        let followed = FileDiscovery::new()
            .with_follow_symlinks(true)
            .discover(corpus.path())
            .await
            .unwrap();
        assert_eq!(followed.unreadable, 1);
        assert_eq!(followed.files.len(), 4);

        let skipped = FileDiscovery::new().discover(corpus.path()).await.unwrap();
        assert_eq!(skipped.unreadable, 0);
        assert_eq!(skipped.files.len(), 4);
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let err = FileDiscovery::new()
            .with_include_patterns(vec!["a[".to_string()])
            .unwrap_err();
        assert!(matches!(err, DtdError::Config(_)));
    }

    #[test]
    fn test_should_process() {
        let discovery = FileDiscovery::new();
        assert!(discovery.should_process(Path::new("doc.xml")));
        assert!(discovery.should_process(Path::new("DOC.XML")));
        assert!(!discovery.should_process(Path::new("doc.dtd")));
        assert!(!discovery.should_process(Path::new("doc")));
    }
}
