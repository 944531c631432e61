//! Object store backed by an S3 bucket.

use crate::sigv4::{sha256_hex, Credentials, Signer, SigningRequest, EMPTY_PAYLOAD_SHA256};
use crate::{ObjectStore, Result, StoreError};
use chrono::Utc;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

/// Bytes of an error body kept in [`StoreError::HttpStatus`].
const ERROR_BODY_CHARS: usize = 300;

/// S3 access with SigV4-signed requests.
///
/// AWS endpoints are addressed virtual-hosted style; a custom endpoint set
/// with [`S3Store::with_endpoint`] is addressed path style.
pub struct S3Store {
    bucket: String,
    region: String,
    endpoint: Option<String>,
    signer: Signer,
    client: Client,
}

impl S3Store {
    pub fn new(bucket: &str, region: &str, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            bucket: bucket.to_string(),
            region: region.to_string(),
            endpoint: None,
            signer: Signer::new(credentials, region, "s3"),
            client,
        })
    }

    /// Store using credentials from the environment.
    pub fn from_env(bucket: &str, region: &str) -> Result<Self> {
        Self::new(bucket, region, Credentials::from_env()?)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Send requests to an S3-compatible service such as `http://localhost:9000`.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        self
    }

    pub fn host(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .to_string(),
            None => format!("{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }

    fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}", self.host()),
        }
    }

    fn path(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        match &self.endpoint {
            Some(_) => format!("/{}/{key}", self.bucket),
            None => format!("/{key}"),
        }
    }

    /// Build a signed request. `extra_headers` are signed too.
    fn signed(
        &self,
        method: reqwest::Method,
        key: &str,
        payload_sha256: &str,
        extra_headers: &[(&str, &str)],
    ) -> RequestBuilder {
        let host = self.host();
        let path = self.path(key);

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_sha256.to_string()),
        ];
        for (k, v) in extra_headers {
            headers.push((k.to_string(), v.to_string()));
        }
        if let Some(token) = &self.signer.credentials().session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let signature = self.signer.sign(
            &SigningRequest {
                method: method.as_str(),
                path: &path,
                headers: headers.clone(),
                payload_sha256,
            },
            Utc::now(),
        );

        let url = format!("{}{}", self.base_url(), crate::sigv4::uri_encode_path(&path));
        let mut request = self
            .client
            .request(method, url)
            .header("x-amz-date", signature.amz_date)
            .header("authorization", signature.authorization);
        for (k, v) in headers.into_iter().filter(|(k, _)| k != "host") {
            request = request.header(k, v);
        }
        request
    }

    fn status_error(method: &str, key: &str, response: Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        StoreError::HttpStatus {
            method: method.to_string(),
            key: key.to_string(),
            status,
            body: body.chars().take(ERROR_BODY_CHARS).collect(),
        }
    }
}

impl ObjectStore for S3Store {
    /// `HEAD` the object: 404 is `false`, any other failure is an error.
    fn exists(&self, key: &str) -> Result<bool> {
        let response = self
            .signed(reqwest::Method::HEAD, key, EMPTY_PAYLOAD_SHA256, &[])
            .send()?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => {
                warn!(bucket = %self.bucket, key, status = s.as_u16(), "HEAD failed");
                Err(Self::status_error("HEAD", key, response))
            }
        }
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .signed(reqwest::Method::GET, key, EMPTY_PAYLOAD_SHA256, &[])
            .send()?;

        match response.status() {
            s if s.is_success() => Ok(response.bytes()?.to_vec()),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(key.to_string())),
            _ => Err(Self::status_error("GET", key, response)),
        }
    }

    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let payload_sha256 = sha256_hex(bytes);
        let response = self
            .signed(
                reqwest::Method::PUT,
                key,
                &payload_sha256,
                &[("content-type", content_type)],
            )
            .body(bytes.to_vec())
            .send()?;

        if !response.status().is_success() {
            return Err(Self::status_error("PUT", key, response));
        }
        debug!(bucket = %self.bucket, key, bytes = bytes.len(), "Uploaded object");
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        format!("{}{}", self.base_url(), self.path(key))
    }

    fn href_root(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
