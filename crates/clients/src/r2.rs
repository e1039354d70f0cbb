use std::env;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Credentials, Region},
    primitives::ByteStream,
    Client as S3Client,
};
use storymint_common::{define_module_client, ModuleClient};
use storymint_runtime::ObjectStorage;

fn required(var: &str) -> Result<String> {
    env::var(var).map_err(|_| anyhow!("{} is not set", var))
}

define_module_client! {
    (struct R2Client, "r2")
    client_type: S3Client,
    env: ["R2_ACCOUNT_ID", "R2_ACCESS_KEY_ID", "R2_SECRET_ACCESS_KEY", "R2_BUCKET_NAME"],
    setup: async {
        let account_id = required("R2_ACCOUNT_ID")?;
        let credentials = Credentials::new(
            required("R2_ACCESS_KEY_ID")?,
            required("R2_SECRET_ACCESS_KEY")?,
            None,
            None,
            "r2-client",
        );

        let s3_config = S3ConfigBuilder::new()
            .endpoint_url(format!("https://{}.r2.cloudflarestorage.com", account_id))
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .behavior_version_latest()
            .build();

        Ok::<_, anyhow::Error>(S3Client::from_conf(s3_config))
    }
}

impl R2Client {
    pub fn bucket_name(&self) -> String {
        env::var("R2_BUCKET_NAME").unwrap_or_default()
    }

    pub fn public_domain(&self) -> String {
        env::var("R2_PUBLIC_DOMAIN").unwrap_or_else(|_| format!("{}.r2.dev", self.bucket_name()))
    }
}

#[async_trait]
impl ObjectStorage for R2Client {
    async fn put(&self, key: &str, content_type: &str, data: Vec<u8>) -> Result<()> {
        self.get_client()
            .put_object()
            .bucket(self.bucket_name())
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to upload {} to R2: {}", key, e))?;

        tracing::debug!("[R2Client::put] stored {}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        // S3 semantics: deleting a missing key succeeds
        self.get_client()
            .delete_object()
            .bucket(self.bucket_name())
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to delete {} from R2: {}", key, e))?;

        tracing::debug!("[R2Client::delete] removed {}", key);
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        format!("https://{}/{}", self.public_domain(), key)
    }
}
