//! Elasticsearch client construction and the HTTP transport built on it.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use elasticsearch::auth::Credentials;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::indices::{
    IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesRefreshParts,
};
use elasticsearch::{
    ClearScrollParts, CountParts, DeleteByQueryParts, DeleteParts, Elasticsearch, GetParts,
    IndexParts, ScrollParts, SearchParts, UpdateByQueryParts, UpdateParts,
};
use serde_json::{Value, json};

use crate::config::{ConnectionAuth, ConnectionConfig};
use crate::connection::Connection;
use crate::error::{ConnectionError, QuarryResult, TransportError, TransportResult};
use crate::transport::{Endpoint, RequestParams, SearchTransport, TransportResponse};

/// Builds clients and connections from configuration. Holds no state.
pub struct ClientFactory;

impl ClientFactory {
    /// Builds an Elasticsearch client for the named connection.
    ///
    /// The connection pool targets the first configured server.
    pub fn build(name: &str, config: &ConnectionConfig) -> QuarryResult<Elasticsearch> {
        let host = config
            .servers
            .first()
            .ok_or_else(|| ConnectionError::ClientBuild {
                name: name.to_string(),
                message: "no servers configured".to_string(),
            })?;

        if config.servers.len() > 1 {
            tracing::warn!(
                "Connection '{}' lists {} servers; only {} is used",
                name,
                config.servers.len(),
                host.url()
            );
        }

        let parsed_url: elasticsearch::http::Url =
            host.url().parse().map_err(|e| ConnectionError::ClientBuild {
                name: name.to_string(),
                message: format!("Invalid URL: {}", e),
            })?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);

        let mut builder = TransportBuilder::new(conn_pool).timeout(config.timeout);

        if config.disable_certificate_validation {
            builder = builder.cert_validation(CertificateValidation::None);
        }

        if let Some(auth) = config.effective_auth() {
            builder = match auth {
                ConnectionAuth::Basic { username, password } => {
                    builder.auth(Credentials::Basic(username, password))
                }
                ConnectionAuth::Bearer { token } => builder.auth(Credentials::Bearer(token)),
            };
        }

        let transport = builder.build().map_err(|e| ConnectionError::ClientBuild {
            name: name.to_string(),
            message: format!("Failed to build transport: {}", e),
        })?;

        Ok(Elasticsearch::new(transport))
    }

    /// Builds a [`Connection`] with an HTTP transport and the configured ignore list.
    pub fn connection(name: &str, config: &ConnectionConfig) -> QuarryResult<Connection> {
        let client = Self::build(name, config)?;
        tracing::debug!("Built Elasticsearch client for connection '{}'", name);
        Ok(
            Connection::new(name, Arc::new(ElasticsearchTransport::new(client)))
                .with_ignores(config.ignore.iter().copied()),
        )
    }
}

/// [`SearchTransport`] backed by the official Elasticsearch client.
#[derive(Clone)]
pub struct ElasticsearchTransport {
    client: Elasticsearch,
}

impl Debug for ElasticsearchTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchTransport").finish_non_exhaustive()
    }
}

impl ElasticsearchTransport {
    /// Wraps a constructed client.
    pub fn new(client: Elasticsearch) -> Self {
        Self { client }
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &Elasticsearch {
        &self.client
    }
}

fn require<'a>(value: Option<&'a str>, what: &str, endpoint: Endpoint) -> TransportResult<&'a str> {
    value.ok_or_else(|| TransportError::Request {
        status: None,
        message: format!("{} requires {}", endpoint, what),
    })
}

fn request_error(err: elasticsearch::Error) -> TransportError {
    TransportError::Request {
        status: err.status_code().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl SearchTransport for ElasticsearchTransport {
    async fn perform(
        &self,
        endpoint: Endpoint,
        params: RequestParams,
    ) -> TransportResult<TransportResponse> {
        let index = params.index.as_deref();
        let id = params.id.as_deref();
        let body = params.body.clone().unwrap_or_else(|| json!({}));

        tracing::debug!(
            "Elasticsearch {} on index '{}'",
            endpoint,
            index.unwrap_or("_all")
        );
        tracing::trace!("Request body: {}", body);

        let response = match endpoint {
            Endpoint::IndicesCreate => {
                let index = require(index, "an index", endpoint)?;
                self.client
                    .indices()
                    .create(IndicesCreateParts::Index(index))
                    .body(body)
                    .send()
                    .await
            }
            Endpoint::IndicesDelete => {
                let indices = [require(index, "an index", endpoint)?];
                self.client
                    .indices()
                    .delete(IndicesDeleteParts::Index(&indices))
                    .send()
                    .await
            }
            Endpoint::IndicesExists => {
                let indices = [require(index, "an index", endpoint)?];
                self.client
                    .indices()
                    .exists(IndicesExistsParts::Index(&indices))
                    .send()
                    .await
            }
            Endpoint::IndicesRefresh => {
                let indices = [require(index, "an index", endpoint)?];
                self.client
                    .indices()
                    .refresh(IndicesRefreshParts::Index(&indices))
                    .send()
                    .await
            }
            Endpoint::Search => {
                let indices: Vec<&str> = index.into_iter().collect();
                let parts = if indices.is_empty() {
                    SearchParts::None
                } else {
                    SearchParts::Index(&indices)
                };
                let request = self.client.search(parts).body(body);
                match params.scroll.as_deref() {
                    Some(scroll) => request.scroll(scroll).send().await,
                    None => request.send().await,
                }
            }
            Endpoint::Scroll => {
                self.client
                    .scroll(ScrollParts::None)
                    .body(body)
                    .send()
                    .await
            }
            Endpoint::ClearScroll => {
                self.client
                    .clear_scroll(ClearScrollParts::None)
                    .body(body)
                    .send()
                    .await
            }
            Endpoint::Count => {
                let indices: Vec<&str> = index.into_iter().collect();
                let parts = if indices.is_empty() {
                    CountParts::None
                } else {
                    CountParts::Index(&indices)
                };
                self.client.count(parts).body(body).send().await
            }
            Endpoint::Get => {
                let index = require(index, "an index", endpoint)?;
                let id = require(id, "a document id", endpoint)?;
                self.client.get(GetParts::IndexId(index, id)).send().await
            }
            Endpoint::Index => {
                let index = require(index, "an index", endpoint)?;
                match id {
                    Some(id) => {
                        self.client
                            .index(IndexParts::IndexId(index, id))
                            .body(body)
                            .send()
                            .await
                    }
                    None => {
                        self.client
                            .index(IndexParts::Index(index))
                            .body(body)
                            .send()
                            .await
                    }
                }
            }
            Endpoint::Update => {
                let index = require(index, "an index", endpoint)?;
                let id = require(id, "a document id", endpoint)?;
                self.client
                    .update(UpdateParts::IndexId(index, id))
                    .body(body)
                    .send()
                    .await
            }
            Endpoint::Delete => {
                let index = require(index, "an index", endpoint)?;
                let id = require(id, "a document id", endpoint)?;
                self.client
                    .delete(DeleteParts::IndexId(index, id))
                    .send()
                    .await
            }
            Endpoint::UpdateByQuery => {
                let indices = [require(index, "an index", endpoint)?];
                self.client
                    .update_by_query(UpdateByQueryParts::Index(&indices))
                    .body(body)
                    .send()
                    .await
            }
            Endpoint::DeleteByQuery => {
                let indices = [require(index, "an index", endpoint)?];
                self.client
                    .delete_by_query(DeleteByQueryParts::Index(&indices))
                    .body(body)
                    .send()
                    .await
            }
        }
        .map_err(request_error)?;

        let status = response.status_code().as_u16();
        let body = if endpoint == Endpoint::IndicesExists {
            Value::Null
        } else {
            let text = response.text().await.map_err(request_error)?;
            decode_body(&text)
        };

        let accepted = (200..300).contains(&status)
            || params.ignores(status)
            || (endpoint == Endpoint::IndicesExists && status == 404);

        if !accepted {
            tracing::debug!("Elasticsearch {} failed with status {}", endpoint, status);
            return Err(TransportError::Status { status, body });
        }

        Ok(TransportResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostDescriptor;

    #[test]
    fn test_build_client_from_default_config() {
        let config = ConnectionConfig::default();
        assert!(ClientFactory::build("default", &config).is_ok());
    }

    #[test]
    fn test_build_client_without_servers_fails() {
        let config = ConnectionConfig::new(vec![]);
        let err = ClientFactory::build("empty", &config).unwrap_err();
        assert!(err.to_string().contains("empty"));
        assert!(err.to_string().contains("no servers configured"));
    }

    #[test]
    fn test_connection_carries_ignore_list() {
        let config = ConnectionConfig::new(vec![HostDescriptor::new("localhost")])
            .with_ignore([404, 409, 404]);
        let connection = ClientFactory::connection("main", &config).unwrap();
        assert_eq!(connection.name(), "main");
        assert_eq!(
            connection.ignores().iter().copied().collect::<Vec<_>>(),
            vec![404, 409]
        );
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(""), Value::Null);
        assert_eq!(decode_body("{\"acknowledged\":true}")["acknowledged"], true);
        assert_eq!(decode_body("plain"), Value::String("plain".to_string()));
    }
}
