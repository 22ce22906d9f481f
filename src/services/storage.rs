use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;

/// Object bytes plus the content type recorded at upload time.
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// Canned ACLs objects are written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAcl {
    PublicRead,
}

impl From<ObjectAcl> for ObjectCannedAcl {
    fn from(acl: ObjectAcl) -> Self {
        match acl {
            ObjectAcl::PublicRead => ObjectCannedAcl::PublicRead,
        }
    }
}

#[async_trait]
pub trait StorageService: Send + Sync {
    async fn get_file(&self, key: &str) -> Result<StoredObject>;
    async fn put_file(&self, key: &str, data: Vec<u8>, content_type: &str, acl: ObjectAcl) -> Result<()>;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn get_file(&self, key: &str) -> Result<StoredObject> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("get_object {}/{}", self.bucket, key))?;

        let content_type = res.content_type().map(str::to_string);
        let data = res.body.collect().await?.to_vec();
        Ok(StoredObject { data, content_type })
    }

    async fn put_file(&self, key: &str, data: Vec<u8>, content_type: &str, acl: ObjectAcl) -> Result<()> {
        let res = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .acl(acl.into())
            .body(ByteStream::from(data))
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 put_object failed: bucket={}, key={}, error={:?}",
                self.bucket,
                key,
                e
            );
            return Err(anyhow::Error::new(e).context(format!("put_object {}/{}", self.bucket, key)));
        }
        Ok(())
    }
}
