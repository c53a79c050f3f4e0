//! Shared command context and output helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use metagen::config::Config;
use metagen::repository::JsonCatalog;
use metagen_annotate::AnnotationService;

/// Loaded configuration plus the global flags every command needs.
pub struct Context {
    pub config: Config,
    pub catalog_path: PathBuf,
    pub json: bool,
}

impl Context {
    pub async fn load(
        config_path: Option<&Path>,
        catalog: Option<PathBuf>,
        json: bool,
    ) -> anyhow::Result<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }
        let config = Config::load_with(config_path).await?;

        let catalog_path = match catalog {
            Some(path) if path.is_absolute() => path,
            Some(path) => std::env::current_dir()?.join(path),
            None => config.catalog_path(),
        };

        Ok(Self {
            config,
            catalog_path,
            json,
        })
    }

    pub async fn open_catalog(&self) -> anyhow::Result<Arc<JsonCatalog>> {
        let catalog = JsonCatalog::open(&self.catalog_path).await.map_err(|e| {
            anyhow::anyhow!("Failed to open catalog {}: {}", self.catalog_path.display(), e)
        })?;
        Ok(Arc::new(catalog))
    }

    /// Build the annotation service over the catalog file.
    pub async fn service(&self) -> anyhow::Result<(AnnotationService, Arc<JsonCatalog>)> {
        let catalog = self.open_catalog().await?;
        let service = AnnotationService::new(&self.config, catalog.clone())?;
        Ok((service, catalog))
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn explicit_catalog_wins() {
        let dir = TempDir::new().unwrap();
        let catalog = dir.path().join("mine.json");
        let config = dir.path().join("metagen.toml");
        std::fs::write(&config, "catalog = \"other.json\"\n").unwrap();

        let ctx = Context::load(Some(&config), Some(catalog.clone()), false)
            .await
            .unwrap();
        assert_eq!(ctx.catalog_path, catalog);

        let ctx = Context::load(Some(&config), None, false).await.unwrap();
        if std::env::var(metagen::config::CATALOG_ENV).is_err() {
            assert_eq!(ctx.catalog_path, dir.path().join("other.json"));
        }
    }

    #[tokio::test]
    async fn missing_config_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Context::load(Some(&missing), None, false).await.is_err());
    }

    #[tokio::test]
    async fn service_opens_an_empty_catalog() {
        let dir = TempDir::new().unwrap();
        let ctx = Context {
            config: Config::default(),
            catalog_path: dir.path().join("catalog.json"),
            json: false,
        };
        let (service, catalog) = ctx.service().await.unwrap();
        assert!(catalog.snapshot().await.targets.is_empty());
        assert!(service.registry().get("simulated-general").is_some());
    }
}
