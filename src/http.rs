//! HTTP API for the fixture directory
//!
//! ## Catalogue
//! - `GET /fixtures` - paged listing
//!   (`search`, `manufacturer`, `type`, `lightSource`, `page`, `per_page`)
//! - `POST /fixtures` - create a fixture
//! - `GET /fixtures/{idOrSlug}` - fixture with vendors and certification
//! - `GET /fixtures/{idOrSlug}/similar?limit=N` - ranked similar fixtures
//! - `GET|POST /manufacturers`, `GET /manufacturers/{slug}`
//! - `GET|POST /vendors?type=vendor|distributor`, `GET /vendors/{slug}`
//! - `POST /vendors/{slug}/fixtures/{fixtureSlug}` - vendor carries fixture
//! - `GET|POST /fixture-types`
//!
//! ## Endorsements
//! - `GET /endorsement-categories?appliesTo=fixture|vendor`
//! - `GET /{fixtures|vendors}/{slug}/endorsements?sessionId=`
//! - `POST /{fixtures|vendors}/{slug}/endorsements/{category}/vote`
//!   with body `{ voteType, sessionId }`
//! - `DELETE /{fixtures|vendors}/{slug}/endorsements/{category}/vote?sessionId=`
//!
//! ## Certification
//! - `POST /endorsement-issues/certify/{fixtureId}`
//!   with body `{ threshold?, minVotesPerCategory? }`
//! - `GET /fixtures/{idOrSlug}/certification`
//! - `GET /certifications`
//!
//! ## Example Usage
//!
//! ```bash
//! curl http://localhost:8095/fixtures/mac-aura-xb/similar?limit=5
//!
//! curl -X POST -H "Content-Type: application/json" \
//!      -d '{"voteType":"up","sessionId":"3f1c..."}' \
//!      http://localhost:8095/fixtures/mac-aura-xb/endorsements/beam-quality/vote
//!
//! curl -X POST http://localhost:8095/endorsement-issues/certify/42
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::db::directory::{CreateFixtureTypeInput, CreateManufacturerInput, CreateVendorInput};
use crate::db::fixtures::FixtureKey;
use crate::db::{CreateFixtureInput, EntityKind, FixtureQuery};
use crate::error::RegistryError;
use crate::services::{
    self, error_response, from_create_result, from_option, from_result, CertifyInput,
    HandlerResult, Services, VoteInput,
};
use crate::views::VoteResultView;

#[derive(Debug, Default, Deserialize)]
struct LimitQuery {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionQuery {
    #[serde(default, alias = "session_id")]
    session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VendorQuery {
    #[serde(default, rename = "type")]
    vendor_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryQuery {
    #[serde(default, alias = "applies_to")]
    applies_to: Option<String>,
}

fn parse_query<T: DeserializeOwned + Default>(query: Option<&str>) -> Result<T, RegistryError> {
    match query {
        None | Some("") => Ok(T::default()),
        Some(q) => serde_urlencoded::from_str(q)
            .map_err(|e| RegistryError::InvalidInput(format!("Invalid query string: {}", e))),
    }
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, RegistryError> {
    Ok(serde_json::from_slice(body)?)
}

/// Like [`parse_body`], but an empty body means "all defaults"
fn parse_optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, RegistryError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        Ok(T::default())
    } else {
        parse_body(body)
    }
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(services: Arc<Services>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            bind_addr,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), RegistryError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .await
                {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Read the request body and route it
    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(str::to_string);

        debug!(method = %method, path = %path, "Incoming request");

        let body = req.into_body().collect().await?.to_bytes();
        Ok(self.dispatch(&method, &path, query.as_deref(), &body))
    }

    /// Route one request. Separate from the hyper plumbing so it can be
    /// driven without a socket.
    pub fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        body: &Bytes,
    ) -> Response<Full<Bytes>> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let result = match (method, segments.as_slice()) {
            (&Method::GET, ["health"]) => self.handle_health(),

            // Fixtures
            (&Method::GET, ["fixtures"]) => self.handle_list_fixtures(query),
            (&Method::POST, ["fixtures"]) => self.handle_create_fixture(body),
            (&Method::GET, ["fixtures", key]) => self.handle_get_fixture(key),
            (&Method::GET, ["fixtures", key, "similar"]) => self.handle_similar(key, query),
            (&Method::GET, ["fixtures", key, "certification"]) => {
                self.handle_get_certification(key)
            }

            // Endorsements
            (&Method::GET, ["fixtures", key, "endorsements"]) => {
                self.handle_list_endorsements(EntityKind::Fixture, key, query)
            }
            (&Method::POST, ["fixtures", key, "endorsements", category, "vote"]) => {
                self.handle_vote(EntityKind::Fixture, key, category, body)
            }
            (&Method::DELETE, ["fixtures", key, "endorsements", category, "vote"]) => {
                self.handle_retract(EntityKind::Fixture, key, category, query)
            }
            (&Method::GET, ["vendors", slug, "endorsements"]) => {
                self.handle_list_endorsements(EntityKind::Vendor, slug, query)
            }
            (&Method::POST, ["vendors", slug, "endorsements", category, "vote"]) => {
                self.handle_vote(EntityKind::Vendor, slug, category, body)
            }
            (&Method::DELETE, ["vendors", slug, "endorsements", category, "vote"]) => {
                self.handle_retract(EntityKind::Vendor, slug, category, query)
            }
            (&Method::GET, ["endorsement-categories"]) => self.handle_list_categories(query),

            // Certification
            (&Method::POST, ["endorsement-issues", "certify", fixture_id]) => {
                self.handle_certify(fixture_id, body)
            }
            (&Method::GET, ["certifications"]) => {
                Ok(from_result(self.services.certifications.list()))
            }

            // Directory
            (&Method::GET, ["manufacturers"]) => {
                Ok(from_result(self.services.directory.list_manufacturers()))
            }
            (&Method::POST, ["manufacturers"]) => self.handle_create_manufacturer(body),
            (&Method::GET, ["manufacturers", slug]) => Ok(from_option(
                self.services.directory.get_manufacturer(slug),
                &format!("Manufacturer '{}' not found", slug),
            )),
            (&Method::GET, ["vendors"]) => self.handle_list_vendors(query),
            (&Method::POST, ["vendors"]) => self.handle_create_vendor(body),
            (&Method::GET, ["vendors", slug]) => Ok(from_option(
                self.services.directory.get_vendor(slug),
                &format!("Vendor '{}' not found", slug),
            )),
            (&Method::POST, ["vendors", slug, "fixtures", fixture_slug]) => Ok(from_result(
                self.services.directory.link_fixture(slug, fixture_slug),
            )),
            (&Method::GET, ["fixture-types"]) => {
                Ok(from_result(self.services.directory.list_fixture_types()))
            }
            (&Method::POST, ["fixture-types"]) => self.handle_create_fixture_type(body),

            (_, segs) if is_known_route(segs) => Ok(services::method_not_allowed()),
            _ => Ok(services::not_found("Not Found")),
        };

        result.unwrap_or_else(error_response)
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    fn handle_health(&self) -> HandlerResult {
        let stats = self.services.db.stats()?;
        Ok(services::ok(&serde_json::json!({
            "status": "ok",
            "fixtures": stats.fixture_count,
            "activeFixtures": stats.active_fixture_count,
            "manufacturers": stats.manufacturer_count,
            "vendors": stats.vendor_count,
            "votes": stats.vote_count,
            "certified": stats.certified_count,
        })))
    }

    fn handle_list_fixtures(&self, query: Option<&str>) -> HandlerResult {
        let query: FixtureQuery = parse_query(query)?;
        Ok(from_result(self.services.fixtures.list(&query)))
    }

    fn handle_create_fixture(&self, body: &Bytes) -> HandlerResult {
        let input: CreateFixtureInput = parse_body(body)?;
        Ok(from_create_result(self.services.fixtures.create(input)))
    }

    fn handle_get_fixture(&self, key: &str) -> HandlerResult {
        Ok(from_option(
            self.services.fixtures.get(&FixtureKey::parse(key)),
            &format!("Fixture '{}' not found", key),
        ))
    }

    fn handle_similar(&self, key: &str, query: Option<&str>) -> HandlerResult {
        let LimitQuery { limit } = parse_query(query)?;
        Ok(from_result(
            self.services.fixtures.similar(&FixtureKey::parse(key), limit),
        ))
    }

    fn handle_get_certification(&self, key: &str) -> HandlerResult {
        Ok(from_option(
            self.services.certifications.get(&FixtureKey::parse(key)),
            &format!("Fixture '{}' is not certified", key),
        ))
    }

    fn handle_list_endorsements(
        &self,
        kind: EntityKind,
        key: &str,
        query: Option<&str>,
    ) -> HandlerResult {
        let SessionQuery { session_id } = parse_query(query)?;
        Ok(from_result(self.services.endorsements.list_for_entity(
            kind,
            key,
            session_id.as_deref(),
        )))
    }

    fn handle_vote(
        &self,
        kind: EntityKind,
        key: &str,
        category: &str,
        body: &Bytes,
    ) -> HandlerResult {
        let input: VoteInput = parse_optional_body(body)?;
        let tally = self
            .services
            .endorsements
            .cast_vote(kind, key, category, &input)?;
        Ok(services::ok(&VoteResultView::from(tally)))
    }

    fn handle_retract(
        &self,
        kind: EntityKind,
        key: &str,
        category: &str,
        query: Option<&str>,
    ) -> HandlerResult {
        let SessionQuery { session_id } = parse_query(query)?;
        let tally = self.services.endorsements.retract_vote(
            kind,
            key,
            category,
            session_id.as_deref(),
        )?;
        Ok(services::ok(&VoteResultView::from(tally)))
    }

    fn handle_list_categories(&self, query: Option<&str>) -> HandlerResult {
        let CategoryQuery { applies_to } = parse_query(query)?;
        let kind = applies_to.as_deref().map(str::parse::<EntityKind>).transpose()?;
        Ok(from_result(self.services.endorsements.categories(kind)))
    }

    /// Pass → 200, fail → 400 with the criteria that failed
    fn handle_certify(&self, fixture_id: &str, body: &Bytes) -> HandlerResult {
        let fixture_id: i32 = fixture_id.parse().map_err(|_| {
            RegistryError::InvalidInput(format!("fixtureId '{}' is not an integer", fixture_id))
        })?;
        let input: CertifyInput = parse_optional_body(body)?;

        let result = self.services.certifications.evaluate(fixture_id, &input)?;
        let status = if result.success {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        };
        Ok(services::json_response(status, &result))
    }

    fn handle_create_manufacturer(&self, body: &Bytes) -> HandlerResult {
        let input: CreateManufacturerInput = parse_body(body)?;
        Ok(from_create_result(
            self.services.directory.create_manufacturer(input),
        ))
    }

    fn handle_list_vendors(&self, query: Option<&str>) -> HandlerResult {
        let VendorQuery { vendor_type } = parse_query(query)?;
        Ok(from_result(
            self.services.directory.list_vendors(vendor_type.as_deref()),
        ))
    }

    fn handle_create_vendor(&self, body: &Bytes) -> HandlerResult {
        let input: CreateVendorInput = parse_body(body)?;
        Ok(from_create_result(self.services.directory.create_vendor(input)))
    }

    fn handle_create_fixture_type(&self, body: &Bytes) -> HandlerResult {
        let input: CreateFixtureTypeInput = parse_body(body)?;
        Ok(from_create_result(
            self.services.directory.create_fixture_type(input),
        ))
    }
}

/// Paths that exist under some other method
fn is_known_route(segments: &[&str]) -> bool {
    matches!(
        segments,
        ["health"]
            | ["fixtures"]
            | ["fixtures", _]
            | ["fixtures", _, "similar" | "certification" | "endorsements"]
            | ["fixtures", _, "endorsements", _, "vote"]
            | ["vendors"]
            | ["vendors", _]
            | ["vendors", _, "endorsements"]
            | ["vendors", _, "endorsements", _, "vote"]
            | ["vendors", _, "fixtures", _]
            | ["endorsement-categories"]
            | ["endorsement-issues", "certify", _]
            | ["certifications"]
            | ["manufacturers"]
            | ["manufacturers", _]
            | ["fixture-types"]
    )
}
