use super::{build_response, UplinkContext};
use std::sync::Arc;
use warp::Filter;

pub fn routes(
    context: &Arc<UplinkContext>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    health(context.clone())
}

/// GET api/health
///
/// Liveness of the service and its database
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up, see database_state", body = HealthyDto),
    )
)]
pub(crate) fn health(
    context: Arc<UplinkContext>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || context.clone())
        .and(warp::get())
        .and(warp::path!("api" / "health"))
        .and_then(|context: Arc<UplinkContext>| async move {
            let (database_state, device_count) =
                match context.ingestor.store().device_count().await {
                    Ok(count) => ("ok".to_owned(), Some(count)),
                    Err(e) => (e.to_string(), None),
                };
            let ret = dto::HealthyDto {
                healthy: true,
                database_state,
                device_count,
            };
            build_response(Ok(ret))
        })
        .boxed()
}

pub mod dto {
    use serde::{Deserialize, Serialize};
    use utoipa::ToSchema;

    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct HealthyDto {
        pub healthy: bool,
        pub database_state: String,
        pub device_count: Option<i64>,
    }
}

use dto::HealthyDto;
