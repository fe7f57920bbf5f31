use crate::config::Config;
use crate::file_scanner::FileScanner;
use crate::web_loader::WebLoader;
use async_trait::async_trait;
use domain::models::Document;
use domain::services::DocumentSource;
use domain::Result;
use shared::utils::is_web_locator;

/// Sends `http(s)://` locators to the web loader and everything else to the file scanner.
/// Documents come back in locator order.
#[derive(Clone)]
pub struct SourceRouter {
    web: WebLoader,
    files: FileScanner,
}

impl SourceRouter {
    pub fn new(web: WebLoader, files: FileScanner) -> Self {
        Self { web, files }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            WebLoader::new(&config.content_classes, config.request_timeout)?,
            FileScanner::new(),
        ))
    }
}

#[async_trait]
impl DocumentSource for SourceRouter {
    async fn load(&self, locators: &[String]) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for locator in locators {
            let batch = std::slice::from_ref(locator);
            let loaded = if is_web_locator(locator) {
                self.web.load(batch).await?
            } else {
                self.files.load(batch).await?
            };
            documents.extend(loaded);
        }
        Ok(documents)
    }
}
