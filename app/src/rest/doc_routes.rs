use super::dto::ErrorResponseDto;
use super::metric_routes::{self, dto::HealthyDto};
use super::uplink_routes;
use utoipa::OpenApi;
use warp::Filter;

#[derive(OpenApi)]
#[openapi(
    paths(
        uplink_routes::receive,
        uplink_routes::confirmation,
        metric_routes::health
    ),
    components(schemas(ErrorResponseDto, HealthyDto)),
    tags(
        (name = "uplink", description = "Globalstar SmartOne C deliveries"),
        (name = "health", description = "Service liveness")
    )
)]
pub struct ApiDoc;

pub fn routes() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api = ApiDoc::openapi();
    warp::path!("api" / "doc" / "api.json")
        .and(warp::get())
        .map(move || warp::reply::json(&api))
}
