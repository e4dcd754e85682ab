use super::dto::ErrorResponseDto;
use super::{error_response, UplinkContext};
use crate::error::UplinkError;
use crate::models::request_log::RequestStatus;
use brsense_core::{
    compose, parse_document, Envelope, EnvelopeKind, IngestionOutcome, Reply, ReplyContext,
    WireFormat,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use warp::hyper::body::Bytes;
use warp::Filter;

const TOKEN_HEADER: &str = "x-uplink-token";
/// Bytes of a rejected body kept in the request log
const REJECTED_BODY_EXCERPT: usize = 256;

pub fn routes(
    context: &Arc<UplinkContext>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    receive(context.clone()).or(confirmation(context.clone()))
}

/// Who may deliver. Allow-listed addresses always pass, everyone else needs
/// the shared token, unless no token is configured at all.
///
/// Proxy headers only name the client when the socket peer is a trusted proxy.
#[derive(Debug, Clone, Default)]
pub struct UplinkGuard {
    shared_token: Option<String>,
    allowed_ips: HashSet<String>,
    trusted_proxies: HashSet<String>,
}

impl UplinkGuard {
    pub fn new(
        shared_token: Option<String>,
        allowed_ips: &[String],
        trusted_proxies: &[String],
    ) -> Self {
        UplinkGuard {
            shared_token,
            allowed_ips: allowed_ips.iter().cloned().collect(),
            trusted_proxies: trusted_proxies.iter().cloned().collect(),
        }
    }

    pub fn admits(&self, client_ip: &str, token: Option<&str>) -> bool {
        if self.allowed_ips.contains(client_ip) {
            return true;
        }
        match &self.shared_token {
            None => true,
            Some(expected) => token.map(str::trim) == Some(expected.as_str()),
        }
    }

    fn trusts(&self, remote: Option<SocketAddr>) -> bool {
        remote
            .map(|addr| self.trusted_proxies.contains(&addr.ip().to_string()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryRoute {
    Receive,
    Confirmation,
}

impl DeliveryRoute {
    fn as_str(&self) -> &'static str {
        match self {
            DeliveryRoute::Receive => "receive",
            DeliveryRoute::Confirmation => "confirmation",
        }
    }
}

/// POST /v1/uplink/receive
///
/// Telemetry and provisioning deliveries of the Globalstar gateway
#[utoipa::path(
    post,
    path = "/v1/uplink/receive",
    tag = "uplink",
    request_body(content = String, description = "stuMessages or prvmsgs document, XML or JSON"),
    params(
        ("x-uplink-token" = Option<String>, Header, description = "Shared secret for senders outside the allow-list"),
    ),
    responses(
        (status = 200, description = "Acknowledgment in the format of the request", body = String),
        (status = 400, description = "Empty or unparseable body", body = ErrorResponseDto),
        (status = 401, description = "Sender not allowed", body = ErrorResponseDto),
        (status = 413, description = "Body too large"),
    )
)]
pub(crate) fn receive(
    context: Arc<UplinkContext>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    delivery(context, DeliveryRoute::Receive, warp::path!("v1" / "uplink" / "receive"))
}

/// POST /v1/uplink/confirmation
///
/// Provisioning confirmations, anything unrecognized gets the provisioning reply
#[utoipa::path(
    post,
    path = "/v1/uplink/confirmation",
    tag = "uplink",
    request_body(content = String, description = "prvmsgs document, XML or JSON"),
    params(
        ("x-uplink-token" = Option<String>, Header, description = "Shared secret for senders outside the allow-list"),
    ),
    responses(
        (status = 200, description = "Acknowledgment in the format of the request", body = String),
        (status = 400, description = "Empty or unparseable body", body = ErrorResponseDto),
        (status = 401, description = "Sender not allowed", body = ErrorResponseDto),
        (status = 413, description = "Body too large"),
    )
)]
pub(crate) fn confirmation(
    context: Arc<UplinkContext>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    delivery(
        context,
        DeliveryRoute::Confirmation,
        warp::path!("v1" / "uplink" / "confirmation"),
    )
}

fn delivery(
    context: Arc<UplinkContext>,
    route: DeliveryRoute,
    path: impl Filter<Extract = (), Error = warp::Rejection> + Clone + Send + Sync + 'static,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let limit = context.max_body_bytes;
    let guard = context.guard.clone();
    warp::any()
        .map(move || context.clone())
        .and(warp::post())
        .and(path)
        .and(client_ip(guard))
        .and(warp::header::optional::<String>(TOKEN_HEADER))
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::content_length_limit(limit))
        .and(warp::body::bytes())
        .and_then(
            move |context: Arc<UplinkContext>,
                  client_ip: String,
                  token: Option<String>,
                  content_type: Option<String>,
                  body: Bytes| async move {
                let format = WireFormat::sniff(&body, content_type.as_deref());
                let span = info_span!(
                    "uplink",
                    route = route.as_str(),
                    client_ip = %client_ip,
                    format = ?format
                );
                let resp = handle_delivery(context, route, &client_ip, token, format, &body)
                    .instrument(span)
                    .await;
                build_reply(resp)
            },
        )
        .boxed()
}

fn build_reply(resp: Result<Reply, UplinkError>) -> Result<Box<dyn warp::Reply>, warp::Rejection> {
    match resp {
        Ok(reply) => Ok(Box::new(warp::reply::with_header(
            reply.body,
            "content-type",
            reply.content_type,
        ))),
        Err(err) => Ok(error_response(&err)),
    }
}

async fn handle_delivery(
    context: Arc<UplinkContext>,
    route: DeliveryRoute,
    client_ip: &str,
    token: Option<String>,
    format: WireFormat,
    body: &[u8],
) -> Result<Reply, UplinkError> {
    if !context.guard.admits(client_ip, token.as_deref()) {
        let err = UplinkError::Unauthorized(client_ip.to_owned());
        let excerpt = &body[..body.len().min(REJECTED_BODY_EXCERPT)];
        let request_id = open_audit(&context, client_ip, excerpt).await;
        close_audit(&context, request_id, RequestStatus::Rejected, &err.to_string()).await;
        return Err(err);
    }

    let request_id = open_audit(&context, client_ip, body).await;

    let document = match parse_document(body, format) {
        Ok(document) => document,
        Err(e) => {
            close_audit(&context, request_id, RequestStatus::Error, &e.to_string()).await;
            return Err(e.into());
        }
    };

    let envelope = Envelope::from_document(document);
    let kind = match (route, envelope.kind()) {
        (DeliveryRoute::Confirmation, EnvelopeKind::Unrecognized) => {
            EnvelopeKind::Provisioning {
                prv_message_id: None,
            }
        }
        (_, kind) => kind,
    };

    let outcome = context.ingestor.ingest(&envelope).await;
    let status = if outcome.is_ok() {
        RequestStatus::Success
    } else {
        RequestStatus::Error
    };
    close_audit(&context, request_id, status, &summarize(&outcome)).await;

    info!(
        provider_time = envelope.time_stamp().unwrap_or_default(),
        seen = outcome.messages_seen,
        saved = outcome.readings_saved,
        "Acknowledging delivery"
    );
    Ok(compose(&kind, &outcome, format, &ReplyContext::new()))
}

fn summarize(outcome: &IngestionOutcome) -> String {
    serde_json::to_string(outcome).unwrap_or_default()
}

async fn open_audit(context: &UplinkContext, client_ip: &str, body: &[u8]) -> Option<i32> {
    let raw_body = String::from_utf8_lossy(body);
    match context.audit.open(client_ip, &raw_body).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Failed logging request: {}", e);
            None
        }
    }
}

async fn close_audit(
    context: &UplinkContext,
    request_id: Option<i32>,
    status: RequestStatus,
    message: &str,
) {
    let request_id = match request_id {
        Some(id) => id,
        None => return,
    };
    if let Err(e) = context.audit.close(request_id, status, message).await {
        warn!(request_id = request_id, "Failed updating request log: {}", e);
    }
}

fn client_ip(guard: UplinkGuard) -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("cf-connecting-ip")
        .and(warp::header::optional::<String>("x-forwarded-for"))
        .and(warp::addr::remote())
        .map(
            move |cf_ip: Option<String>, forwarded: Option<String>, remote: Option<SocketAddr>| {
                resolve_client_ip(&guard, cf_ip.as_deref(), forwarded.as_deref(), remote)
            },
        )
}

/// Proxy headers first when sent by a trusted proxy, the socket address otherwise
fn resolve_client_ip(
    guard: &UplinkGuard,
    cf_ip: Option<&str>,
    forwarded: Option<&str>,
    remote: Option<SocketAddr>,
) -> String {
    if !guard.trusts(remote) {
        return match remote {
            Some(addr) => addr.ip().to_string(),
            None => "unknown".to_owned(),
        };
    }

    let proxied = cf_ip
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            forwarded
                .and_then(|list| list.split(',').next())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        });

    match (proxied, remote) {
        (Some(ip), _) => ip.to_owned(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_owned(),
    }
}
