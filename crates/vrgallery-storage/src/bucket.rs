//! Bucket bootstrap for the S3 backend.
//!
//! Opt-in (`S3_BOOTSTRAP_BUCKET=true`): checks the bucket exists and, when it does
//! not, creates it and attaches a public-read policy so object URLs are fetchable.

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use vrgallery_core::StorageConfig;

use crate::{StorageError, StorageResult};

/// Region where `CreateBucket` must be sent without a location constraint.
const US_EAST_1: &str = "us-east-1";

async fn build_client(config: &StorageConfig) -> StorageResult<Client> {
    let (Some(access_key), Some(secret_key)) = (
        config.aws_access_key_id.clone(),
        config.aws_secret_access_key.clone(),
    ) else {
        return Err(StorageError::ConfigError(
            "AWS credentials are required to bootstrap the bucket".to_string(),
        ));
    };

    let credentials = Credentials::new(access_key, secret_key, None, None, "vrgallery-config");
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()))
        .credentials_provider(credentials)
        .load()
        .await;

    let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
    if let Some(ref endpoint) = config.s3_endpoint {
        s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
    }

    Ok(Client::from_conf(s3_config.build()))
}

/// Bucket policy granting anonymous `s3:GetObject` on every object.
pub fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "PublicReadGetObject",
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{}/*", bucket),
        }]
    })
    .to_string()
}

/// Make sure the configured bucket exists, creating it with a public-read policy if not.
#[tracing::instrument(skip(config), fields(bucket = %config.s3_bucket))]
pub async fn ensure_bucket(config: &StorageConfig) -> StorageResult<()> {
    let client = build_client(config).await?;
    let bucket = config.s3_bucket.as_str();

    match client.head_bucket().bucket(bucket).send().await {
        Ok(_) => {
            tracing::info!("S3 bucket exists");
            return Ok(());
        }
        Err(e) => {
            let missing = e
                .as_service_error()
                .map(|se| se.is_not_found())
                .unwrap_or(false);
            if !missing {
                return Err(StorageError::BackendError(format!(
                    "Failed to check bucket {}: {}",
                    bucket, e
                )));
            }
        }
    }

    let mut create = client.create_bucket().bucket(bucket);
    if config.aws_region != US_EAST_1 {
        create = create.create_bucket_configuration(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(config.aws_region.as_str()))
                .build(),
        );
    }
    create.send().await.map_err(|e| {
        StorageError::BackendError(format!("Failed to create bucket {}: {}", bucket, e))
    })?;
    tracing::info!("S3 bucket created");

    client
        .put_bucket_policy()
        .bucket(bucket)
        .policy(public_read_policy(bucket))
        .send()
        .await
        .map_err(|e| {
            StorageError::BackendError(format!(
                "Failed to apply public read policy to {}: {}",
                bucket, e
            ))
        })?;
    tracing::info!("Public read policy applied to bucket");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_targets_every_object_in_bucket() {
        let policy: serde_json::Value =
            serde_json::from_str(&public_read_policy("vr-gallery-images")).unwrap();
        let statement = &policy["Statement"][0];
        assert_eq!(statement["Action"], "s3:GetObject");
        assert_eq!(statement["Principal"], "*");
        assert_eq!(statement["Resource"], "arn:aws:s3:::vr-gallery-images/*");
    }
}
