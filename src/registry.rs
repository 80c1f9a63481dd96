use crate::config::{CertPaths, DockerEndpoint};
use crate::error::{ConfigError, RegistryError};
use crate::types::ContainerSummary;
use futures_util::future::BoxFuture;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, StatusCode};
use hyper_openssl::HttpsConnector;
use openssl::ssl::{SslConnector, SslFiletype, SslMethod};
use serde::Deserialize;
use tracing::debug;

/// Lists the containers running next to this node.
pub trait Registry: Send + Sync {
    fn list_containers(&self) -> BoxFuture<'_, Result<Vec<ContainerSummary>, RegistryError>>;

    /// Full container ID of the container whose hostname is `hostname`, if the
    /// runtime knows one.
    fn resolve_self<'a>(
        &'a self,
        hostname: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, RegistryError>>;
}

/// Docker Engine API over mutually authenticated TLS.
pub struct DockerRegistry {
    endpoint: DockerEndpoint,
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

#[derive(Deserialize)]
struct ContainerInspect {
    #[serde(rename = "Id")]
    id: String,
}

impl DockerRegistry {
    pub fn new(endpoint: DockerEndpoint, certs: &CertPaths) -> Result<Self, ConfigError> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);

        let mut ssl = SslConnector::builder(SslMethod::tls())?;
        ssl.set_certificate_file(&certs.cert, SslFiletype::PEM)?;
        ssl.set_private_key_file(&certs.key, SslFiletype::PEM)?;
        ssl.set_ca_file(&certs.ca)?;

        let https = HttpsConnector::with_connector(http, ssl)?;
        let client = Client::builder().build::<_, Body>(https);

        Ok(Self { endpoint, client })
    }

    async fn get(&self, path: &str) -> Result<(StatusCode, hyper::body::Bytes), RegistryError> {
        let url = format!("{}{}", self.endpoint.base(), path);
        let req = Request::get(&url).body(Body::empty())?;
        let resp = self.client.request(req).await?;
        let status = resp.status();
        let body = hyper::body::to_bytes(resp.into_body()).await?;
        debug!("Registry GET {} -> {}", path, status);
        Ok((status, body))
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> RegistryError {
    RegistryError::Status {
        status,
        body: String::from_utf8_lossy(body).trim().to_string(),
    }
}

/// Interpret a `GET /containers/json` response.
fn listing(status: StatusCode, body: &[u8]) -> Result<Vec<ContainerSummary>, RegistryError> {
    if !status.is_success() {
        return Err(status_error(status, body));
    }
    Ok(serde_json::from_slice(body)?)
}

/// Interpret a `GET /containers/{name}/json` response. An unknown name is not
/// an error.
fn inspected(status: StatusCode, body: &[u8]) -> Result<Option<String>, RegistryError> {
    match status {
        StatusCode::NOT_FOUND => Ok(None),
        s if s.is_success() => {
            let inspect: ContainerInspect = serde_json::from_slice(body)?;
            Ok(Some(inspect.id))
        }
        s => Err(status_error(s, body)),
    }
}

impl Registry for DockerRegistry {
    fn list_containers(&self) -> BoxFuture<'_, Result<Vec<ContainerSummary>, RegistryError>> {
        Box::pin(async move {
            let (status, body) = self.get("/containers/json").await?;
            listing(status, &body)
        })
    }

    fn resolve_self<'a>(
        &'a self,
        hostname: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, RegistryError>> {
        Box::pin(async move {
            let (status, body) = self.get(&format!("/containers/{}/json", hostname)).await?;
            inspected(status, &body)
        })
    }
}
