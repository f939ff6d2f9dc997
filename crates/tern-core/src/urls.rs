//! Access-URL construction policy.
//!
//! The catalog publishes granule files under one of two URL shapes: a
//! hosted-distribution form fronted by the platform's distribution service,
//! or a direct-storage form addressing the object itself. Reconciliation
//! computes both candidates for a file and accepts the catalog URL if it
//! matches either. The policy is a pure function of bucket and key.

/// Builds candidate access URLs for a stored file.
pub trait AccessUrlPolicy: Send + Sync + 'static {
    /// URL under the hosted distribution endpoint.
    fn distribution_url(&self, bucket: &str, key: &str) -> String;

    /// URL addressing the object directly in storage.
    fn direct_url(&self, bucket: &str, key: &str) -> String;
}

/// Standard policy: `{endpoint}/{bucket}/{key}` for hosted distribution and
/// `{scheme}://{bucket}/{key}` for direct storage addressing.
#[derive(Debug, Clone)]
pub struct DistributionEndpoint {
    endpoint: String,
    storage_scheme: String,
}

impl DistributionEndpoint {
    /// Creates a policy for the given distribution endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        Self {
            endpoint,
            storage_scheme: "s3".to_string(),
        }
    }

    /// Overrides the direct-storage URL scheme.
    #[must_use]
    pub fn with_storage_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.storage_scheme = scheme.into();
        self
    }
}

impl AccessUrlPolicy for DistributionEndpoint {
    fn distribution_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.endpoint)
    }

    fn direct_url(&self, bucket: &str, key: &str) -> String {
        format!("{}://{bucket}/{key}", self.storage_scheme)
    }
}
