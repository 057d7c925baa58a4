//! Filesystem schema source

use crate::error::{SchemaError, SchemaResult};
use crate::spec::PackageSpec;
use crate::store::{PackageLocator, SchemaSource};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves system packages from `<root>/<package name>.json`
///
/// Packages embedded in archives are not available here; pair it with a
/// source that reads archives for those.
#[derive(Debug, Clone)]
pub struct FsSchemaSource {
    root: PathBuf,
}

impl FsSchemaSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List the package names available on disk
    ///
    /// # Errors
    /// [`SchemaError::Source`] if the directory cannot be read.
    pub async fn package_names(&self) -> SchemaResult<Vec<String>> {
        let locator = PackageLocator::System(self.root.display().to_string());
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| SchemaError::source(locator.clone(), e))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SchemaError::source(locator.clone(), e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl SchemaSource for FsSchemaSource {
    async fn fetch_package(&self, locator: &PackageLocator) -> SchemaResult<PackageSpec> {
        let PackageLocator::System(name) = locator else {
            return Err(SchemaError::source(
                locator.clone(),
                "embedded packages are not served from the filesystem",
            ));
        };
        let path = self.root.join(format!("{name}.json"));
        debug!(path = %path.display(), "Reading schema package");

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SchemaError::source(locator.clone(), e))?;
        let mut spec: PackageSpec =
            serde_json::from_str(&text).map_err(|e| SchemaError::source(locator.clone(), e))?;
        spec.name.get_or_insert_with(|| name.clone());
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn reads_packages_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pkg.json"),
            json!({"section_definitions": [{"name": "A"}]}).to_string(),
        )
        .unwrap();
        let source = FsSchemaSource::new(dir.path());

        let spec = source
            .fetch_package(&PackageLocator::System("pkg".into()))
            .await
            .unwrap();
        assert_eq!(spec.name.as_deref(), Some("pkg"));
        assert_eq!(spec.section_definitions.len(), 1);
        assert_eq!(source.package_names().await.unwrap(), vec!["pkg"]);
    }

    #[tokio::test]
    async fn missing_and_embedded_packages_fail() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsSchemaSource::new(dir.path());

        let missing = source
            .fetch_package(&PackageLocator::System("nope".into()))
            .await;
        assert!(matches!(missing, Err(SchemaError::Source { .. })));

        let embedded = source
            .fetch_package(&PackageLocator::Entry {
                deployment: "https://nomad.example/api/v1".into(),
                entry_id: "E1".into(),
            })
            .await;
        assert!(matches!(embedded, Err(SchemaError::Source { .. })));
    }
}
