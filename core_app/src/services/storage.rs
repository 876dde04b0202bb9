use crate::config;
use async_trait::async_trait;

#[derive(Clone)]
pub struct StorageHandler {
    pub client: aws_sdk_s3::Client,
    pub bucket: String,
}

impl StorageHandler {
    pub async fn from_config(app_config: &config::AppConfig) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(app_config.aws_region.clone()))
            .load()
            .await;

        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: app_config.bucket_name().to_string(),
        }
    }
}

#[async_trait]
impl crate::services::StorageService for StorageHandler {
    async fn delete_pic(&self, path: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await?;

        Ok(())
    }
}
