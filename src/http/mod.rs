pub mod error;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use error::ApiError;
pub use state::HttpState;

use crate::traits::SegmentationModel;

pub fn router<M: SegmentationModel + 'static>(state: HttpState<M>, body_limit_bytes: usize) -> Router {
    let static_dir = state.artifacts.dir().to_path_buf();
    Router::new()
        .route("/", get(routes::health::<M>))
        .route("/info", get(routes::info::<M>))
        .route("/segment", post(routes::segment::<M>))
        .route("/segment/mask", post(routes::segment_mask::<M>))
        .route("/segment/batch", post(routes::segment_batch::<M>))
        .route("/predict", post(routes::predict_links::<M>))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
