//! HTTP surface of a node: the peer RPCs and the client API.
//!
//! | route | handler |
//! |---|---|
//! | `POST /paxos/{phase}/{proposal}/{*path}` | acceptor phase |
//! | `POST /seq/{op}` | sequence counter |
//! | `POST /version/{*path}` | latest learned KV version on this node |
//! | `POST /` | append to the log |
//! | `GET /` | latest record for (writer, reader, channel) |
//! | `GET /{seq}` | tail read |
//! | `GET /{*key}` | latest KV version |
//! | `PUT /{*key}/{version}` | KV write |
//!
//! Under mutual TLS the peer routes answer 401 to certificates whose common
//! name is not in the peer set.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use logdb_core::{AcceptorReply, LogDbError, Phase, ProposalSeq, RoundOutcome, Tags};
use logdb_paxos::{NodeContext, PeerSet, ReadRecord, SeqOp};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::peer_tls::PeerIdentity;

type SharedNode = Arc<NodeContext>;

pub(crate) fn router(node: SharedNode) -> Router {
    Router::new()
        .route("/paxos/{phase}/{proposal}/{*path}", post(paxos))
        .route("/seq/{op}", post(seq))
        .route("/version/{*path}", post(version))
        .route("/", post(append).get(latest))
        .route("/{*path}", get(read).put(put))
        .with_state(node)
        .layer(TraceLayer::new_for_http())
}

/// Who sent the request. `None` on plain HTTP, where nobody is authenticated.
#[derive(Clone, Debug, Default)]
pub(crate) struct Caller(Option<PeerIdentity>);

impl Caller {
    /// Certificate common name, used as KV namespace and log writer.
    fn name(&self) -> Option<&str> {
        self.0.as_ref().and_then(|id| id.0.as_deref())
    }

    /// Peer RPCs over TLS are reserved for members of the peer set.
    fn authorize_peer(&self, peers: &PeerSet) -> ApiResult<()> {
        match &self.0 {
            None => Ok(()),
            Some(PeerIdentity(Some(name))) if peers.contains(name) => Ok(()),
            Some(PeerIdentity(name)) => {
                let name = name.as_deref().unwrap_or("<no common name>");
                warn!(peer = %name, "peer RPC from non-member refused");
                Err(ApiError(LogDbError::Unauthorized(name.to_string())))
            }
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(parts.extensions.get::<PeerIdentity>().cloned()))
    }
}

// ===== errors =====

pub(crate) struct ApiError(LogDbError);

impl From<LogDbError> for ApiError {
    fn from(e: LogDbError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self.0 {
            LogDbError::Unresolved(outcome) => return outcome_response(*outcome),
            LogDbError::SequenceQuorum { .. } => StatusCode::SERVICE_UNAVAILABLE,
            LogDbError::InvalidPath(_)
            | LogDbError::InvalidProposal(_)
            | LogDbError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            LogDbError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LogDbError::Transport(_) => StatusCode::BAD_GATEWAY,
            LogDbError::Io(_)
            | LogDbError::CorruptRecord { .. }
            | LogDbError::Serialization(_) => {
                warn!(error = %self.0, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (code, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn outcome_code(outcome: RoundOutcome) -> StatusCode {
    match outcome {
        RoundOutcome::Committed => StatusCode::OK,
        RoundOutcome::Conflict | RoundOutcome::AlreadyLearned => StatusCode::CONFLICT,
        RoundOutcome::QuorumFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn outcome_response(outcome: RoundOutcome) -> Response {
    (
        outcome_code(outcome),
        [("x-status", outcome.status())],
    )
        .into_response()
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ===== peer RPCs =====

async fn paxos(
    State(node): State<SharedNode>,
    caller: Caller,
    Path((phase, proposal, path)): Path<(String, String, String)>,
    body: Bytes,
) -> ApiResult<Json<AcceptorReply>> {
    caller.authorize_peer(node.peers())?;
    let phase: Phase = phase.parse()?;
    let proposal = ProposalSeq::parse(&proposal)?;
    let body = (phase == Phase::Accept).then_some(&body[..]);
    Ok(Json(node.serve_paxos(phase, &proposal, &path, body).await?))
}

async fn seq(
    State(node): State<SharedNode>,
    caller: Caller,
    Path(op): Path<String>,
) -> ApiResult<Json<u64>> {
    caller.authorize_peer(node.peers())?;
    let op: SeqOp = op.parse()?;
    Ok(Json(node.serve_seq(op)))
}

async fn version(
    State(node): State<SharedNode>,
    caller: Caller,
    Path(path): Path<String>,
) -> ApiResult<Json<Option<u64>>> {
    caller.authorize_peer(node.peers())?;
    Ok(Json(node.serve_version(path.trim_matches('/')).await?))
}

// ===== client API =====

async fn append(
    State(node): State<SharedNode>,
    caller: Caller,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> ApiResult<Response> {
    let tags: Tags = params.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    let seq = node.log().append(caller.name(), tags, &body).await?;

    let mut headers = HeaderMap::new();
    headers.insert("x-seq", HeaderValue::from(seq));
    Ok((headers, Json(seq)).into_response())
}

async fn put(
    State(node): State<SharedNode>,
    caller: Caller,
    Path(path): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let (key, version) = split_version(&path)?;
    let namespace = caller.name().unwrap_or_default();
    let outcome = node.kv(namespace).put(key, version, &body).await?;
    debug!(key = %key, version, %outcome, "kv put");
    Ok(outcome_response(outcome))
}

async fn read(
    State(node): State<SharedNode>,
    caller: Caller,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let identity = caller.name().unwrap_or_default().to_string();

    let found = match path.parse::<u64>() {
        Ok(from) => {
            let reader = params.get("reader").cloned().unwrap_or(identity);
            let channel = params.get("channel").map(String::as_str).unwrap_or("");
            node.log().tail(from, &reader, channel).await?
        }
        Err(_) => node.kv(&identity).latest(&path).await?,
    };

    Ok(match found {
        Some((seq, rec)) => record_response(seq, rec),
        None => StatusCode::NOT_FOUND.into_response(),
    })
}

async fn latest(
    State(node): State<SharedNode>,
    caller: Caller,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let writer = caller.name().unwrap_or_default().to_string();
    let reader = params.get("reader").cloned().unwrap_or_else(|| writer.clone());
    let channel = params.get("channel").map(String::as_str).unwrap_or("");

    match node.log().latest(&writer, &reader, channel).await? {
        Some((seq, rec)) => {
            let body = serde_json::to_string_pretty(&rec.tags).map_err(LogDbError::from)?;
            let mut headers = HeaderMap::new();
            headers.insert("x-seq", HeaderValue::from(seq));
            Ok((headers, body).into_response())
        }
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

/// `a/b/3` into `("a/b", 3)`.
fn split_version(path: &str) -> ApiResult<(&str, u64)> {
    let path = path.trim_matches('/');
    let invalid = || ApiError(LogDbError::InvalidPath(format!("{}: expected <key>/<version>", path)));
    let (key, version) = path.rsplit_once('/').ok_or_else(invalid)?;
    let version = version.parse().map_err(|_| invalid())?;
    Ok((key, version))
}

/// Body is the record value, tags travel as `x-<tag>` headers.
fn record_response(seq: u64, rec: ReadRecord) -> Response {
    let mut headers = HeaderMap::new();
    for (tag, value) in &rec.tags {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let name = HeaderName::try_from(format!("x-{}", tag.to_ascii_lowercase()));
        match (name, HeaderValue::from_str(&rendered)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => debug!(tag = %tag, "tag not representable as header"),
        }
    }
    headers.insert("x-seq", HeaderValue::from(seq));
    (headers, rec.value).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_last_segment() {
        assert_eq!(split_version("a/b/3").ok(), Some(("a/b", 3)));
        assert_eq!(split_version("/k/10/").ok(), Some(("k", 10)));
        assert!(split_version("k").is_err());
        assert!(split_version("k/latest").is_err());
    }

    #[test]
    fn outcomes_map_to_status_codes() {
        let resp = outcome_response(RoundOutcome::Committed);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-status"], "OK");

        let resp = ApiError(LogDbError::Unresolved(RoundOutcome::QuorumFailed(Phase::Promise)))
            .into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.headers()["x-status"], "NO_PROMISE_QUORUM");

        let resp = ApiError(LogDbError::Unresolved(RoundOutcome::Conflict)).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = ApiError(LogDbError::InvalidPath("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError(LogDbError::Unauthorized("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn peer_rpcs_require_membership_under_tls() {
        let peers = PeerSet::new("10.0.0.1:7000", vec!["10.0.0.2:7000".to_string()]);
        let over_tls = |name: Option<&str>| Caller(Some(PeerIdentity(name.map(str::to_string))));

        assert!(Caller(None).authorize_peer(&peers).is_ok());
        assert!(over_tls(Some("10.0.0.2:7000")).authorize_peer(&peers).is_ok());
        assert!(over_tls(Some("10.0.0.9:7000")).authorize_peer(&peers).is_err());
        assert!(over_tls(None).authorize_peer(&peers).is_err());

        assert_eq!(over_tls(Some("client-a")).name(), Some("client-a"));
        assert_eq!(Caller(None).name(), None);
    }

    #[test]
    fn tags_become_headers() {
        let mut tags = Tags::new();
        tags.insert("channel".into(), json!("c1"));
        tags.insert("length".into(), json!(5));
        tags.insert("bad header".into(), json!("x"));
        let rec = ReadRecord {
            tags,
            value: b"hello".to_vec(),
            length: 37,
        };

        let resp = record_response(4, rec);
        let headers = resp.headers();
        assert_eq!(headers["x-channel"], "c1");
        assert_eq!(headers["x-length"], "5");
        assert_eq!(headers["x-seq"], "4");
        assert!(!headers.contains_key("x-bad header"));
    }
}


#[cfg(test)]
mod mutual_tls {
    use std::path::PathBuf;
    use std::time::Duration;

    use logdb_paxos::{HttpTransport, HttpTransportConfig, NodeSettings};
    use logdb_storage::RecordStore;
    use tempfile::TempDir;

    use super::*;
    use crate::peer_tls::{server_config, PeerIdentityAcceptor};
    use crate::service_configuration::TlsConfig;

    fn cert_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/certs")
            .join(name)
    }

    /// One node behind mutual TLS whose peer set also lists `extra_peers`.
    async fn start_tls(extra_peers: Vec<String>) -> (String, TempDir) {
        let tls = TlsConfig {
            ca: cert_path("ca-cert.pem"),
            cert: cert_path("node-cert.pem"),
            key: cert_path("node-key.pem"),
        };
        let tmp = TempDir::new().unwrap();
        let transport = HttpTransport::new(HttpTransportConfig {
            timeout: Duration::from_millis(500),
            tls: None,
        })
        .unwrap();
        let node = NodeContext::open(
            NodeSettings {
                append_attempts: 1,
                tail_wait: Duration::from_millis(100),
                index_poll: Duration::from_millis(50),
            },
            PeerSet::new("127.0.0.1:7000", extra_peers),
            Arc::new(RecordStore::new(tmp.path())),
            Arc::new(transport),
        )
        .await
        .unwrap();

        let handle = axum_server::Handle::new();
        let server = axum_server::bind("127.0.0.1:0".parse().unwrap())
            .acceptor(PeerIdentityAcceptor::new(server_config(&tls).unwrap()))
            .handle(handle.clone())
            .serve(router(node).into_make_service());
        tokio::spawn(server);
        let bound = handle.listening().await.unwrap();
        (format!("127.0.0.1:{}", bound.port()), tmp)
    }

    fn client(with_identity: bool) -> reqwest::Client {
        let ca = std::fs::read(cert_path("ca-cert.pem")).unwrap();
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .add_root_certificate(reqwest::Certificate::from_pem(&ca).unwrap());
        if with_identity {
            let mut pem = std::fs::read(cert_path("node-cert.pem")).unwrap();
            pem.extend(std::fs::read(cert_path("node-key.pem")).unwrap());
            builder = builder.identity(reqwest::Identity::from_pem(&pem).unwrap());
        }
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn certificate_common_name_gates_peer_rpcs() {
        let (member_of, _a) = start_tls(vec!["127.0.0.1:7001".to_string()]).await;
        let resp = client(true)
            .post(format!("https://{}/seq/max", member_of))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.json::<u64>().await.unwrap(), 0);

        let (stranger_to, _b) = start_tls(Vec::new()).await;
        let resp = client(true)
            .post(format!("https://{}/seq/max", stranger_to))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn connections_without_client_certificate_are_refused() {
        let (addr, _dir) = start_tls(Vec::new()).await;
        let result = client(false)
            .post(format!("https://{}/seq/max", addr))
            .send()
            .await;
        assert!(result.is_err());
    }
}
