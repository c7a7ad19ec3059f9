//! S3-compatible object store speaking the REST API directly with AWS
//! Signature V4 over pure-Rust primitives (`hmac`, `sha2`). Path-style
//! addressing keeps it working against MinIO and LocalStack as well as AWS.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::application::ports::{ObjectStore, StorageError};
use crate::infrastructure::config::S3Settings;

type HmacSha256 = Hmac<Sha256>;

pub struct S3ObjectStore {
    client: Client,
    settings: S3Settings,
    max_bytes: u64,
}

impl S3ObjectStore {
    pub fn new(settings: S3Settings, max_bytes: u64) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            settings,
            max_bytes,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.bucket,
            encode_key(key)
        )
    }

    fn key_of<'a>(&self, uri: &'a str) -> Result<&'a str, StorageError> {
        uri.strip_prefix(&format!("s3://{}/", self.settings.bucket))
            .ok_or_else(|| StorageError::NotFound(uri.to_string()))
    }

    async fn request(
        &self,
        method: Method,
        key: &str,
        body: Vec<u8>,
        mime: Option<&str>,
    ) -> Result<reqwest::Response, StorageError> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let host = host_of(&self.settings.endpoint);
        let payload_hash = hex_sha256(&body);
        let canonical_uri = format!("/{}/{}", self.settings.bucket, encode_key(key));

        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            host, payload_hash, amz_date
        );
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";
        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri,
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let scope = format!("{}/{}/s3/aws4_request", date_stamp, self.settings.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex_sha256(canonical_request.as_bytes())
        );
        let signing_key = derive_signing_key(
            &self.settings.secret,
            &date_stamp,
            &self.settings.region,
            "s3",
        );
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.settings.key, scope, signed_headers, signature
        );

        let mut request = self
            .client
            .request(method, self.object_url(key))
            .header("authorization", authorization)
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", payload_hash);
        if let Some(mime) = mime {
            request = request.header("content-type", mime.to_string());
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], mime: &str) -> Result<String, StorageError> {
        if bytes.len() as u64 > self.max_bytes {
            return Err(StorageError::PayloadTooLarge {
                size: bytes.len() as u64,
                limit: self.max_bytes,
            });
        }
        let response = self
            .request(Method::PUT, key, bytes.to_vec(), Some(mime))
            .await?;
        if !response.status().is_success() {
            return Err(StorageError::Unavailable(format!(
                "put {} returned {}",
                key,
                response.status()
            )));
        }
        Ok(format!("s3://{}/{}", self.settings.bucket, key))
    }

    async fn get(&self, uri: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.key_of(uri)?;
        let response = self.request(Method::GET, key, Vec::new(), None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(uri.to_string())),
            status if status.is_success() => Ok(response
                .bytes()
                .await
                .map_err(|e| StorageError::Unavailable(e.to_string()))?
                .to_vec()),
            status => Err(StorageError::Unavailable(format!(
                "get {} returned {}",
                key, status
            ))),
        }
    }

    async fn delete(&self, uri: &str) -> Result<(), StorageError> {
        let key = self.key_of(uri)?;
        let response = self.request(Method::DELETE, key, Vec::new(), None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(StorageError::Unavailable(format!(
                "delete {} returned {}",
                key, status
            ))),
        }
    }

    async fn exists(&self, uri: &str) -> Result<bool, StorageError> {
        let key = self.key_of(uri)?;
        let response = self.request(Method::HEAD, key, Vec::new(), None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(StorageError::Unavailable(format!(
                "head {} returned {}",
                key, status
            ))),
        }
    }
}

fn host_of(endpoint: &str) -> String {
    endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

/// RFC 3986 encoding per path segment; slashes stay literal.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(uri_encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// kSigning = HMAC(HMAC(HMAC(HMAC("AWS4"+secret, date), region), "s3"), "aws4_request")
fn derive_signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding_preserves_slashes() {
        assert_eq!(encode_key("a/b c/d.pdf"), "a/b%20c/d.pdf");
        assert_eq!(encode_key("tenant/1/abc.pdf"), "tenant/1/abc.pdf");
    }

    #[test]
    fn host_strips_scheme_and_slash() {
        assert_eq!(host_of("https://s3.amazonaws.com/"), "s3.amazonaws.com");
        assert_eq!(host_of("http://localhost:9000"), "localhost:9000");
    }

    #[test]
    fn signing_key_is_deterministic() {
        let a = derive_signing_key("secret", "20250601", "us-east-1", "s3");
        let b = derive_signing_key("secret", "20250601", "us-east-1", "s3");
        assert_eq!(a, b);
        assert_ne!(a, derive_signing_key("secret", "20250602", "us-east-1", "s3"));
    }
}
