//! lighttable-server library - HTTP service for collaborative media review
//!
//! Serves the data directory to signed-in reviewers: browsing, raw file
//! streaming with byte ranges, per-file ratings/comments/selection stored in
//! sidecar files, uploads, and background video transcoding.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use lighttable_common::access::UserDirectory;
use lighttable_common::config::Settings;
use lighttable_common::files::FileTree;
use lighttable_common::metadata::MetadataStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod transcode;

pub use error::{ApiError, ApiResult};
use transcode::{Encoder, Transcoder};

/// Multipart framing allowance on top of the upload limit
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub tree: FileTree,
    pub store: MetadataStore,
    pub users: UserDirectory,
    pub transcoder: Transcoder,
    /// Key for signing session tokens
    pub session_secret: Arc<[u8]>,
    /// Mark the session cookie `Secure`
    pub secure_cookies: bool,
}

impl AppState {
    /// Wire up state from resolved settings
    pub fn new(settings: &Settings, session_secret: &str, encoder: Arc<dyn Encoder>) -> Self {
        let store = MetadataStore::new(&settings.data_dir);
        let tree = FileTree::new(store.clone()).with_max_upload_bytes(settings.max_upload_bytes);
        let transcoder = Transcoder::new(store.clone(), encoder, settings.jobs);

        Self {
            tree,
            store,
            users: UserDirectory::new(&settings.users_file),
            transcoder,
            session_secret: Arc::from(session_secret.as_bytes()),
            secure_cookies: settings.secure_cookies,
        }
    }
}

/// Build application router
///
/// `/health` and the login/logout endpoints are public; everything else
/// requires a valid session cookie.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let upload_limit = state
        .tree
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let upload_limit = usize::try_from(upload_limit).unwrap_or(usize::MAX);

    // Protected routes (require a session)
    let protected = Router::new()
        .route("/api/auth/me", get(api::auth::me))
        .route(
            "/api/files",
            get(api::files::list_files)
                .post(api::files::create_folder)
                .delete(api::files::delete_entry),
        )
        .route("/api/files/*path", get(api::files::serve_file))
        .route(
            "/api/upload",
            post(api::files::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/file-check", get(api::files::file_check))
        .route(
            "/api/metadata",
            get(api::metadata::get_metadata).post(api::metadata::update_metadata),
        )
        .route(
            "/api/convert",
            get(api::convert::conversion_status).post(api::convert::start_conversion),
        )
        .route("/api/convert/events", get(api::convert::conversion_events))
        .route(
            "/api/thumbnail",
            get(api::media::thumbnail_query).post(api::media::thumbnail_body),
        )
        .route(
            "/api/video-thumbnails",
            get(api::media::preview_track_query).post(api::media::preview_track_body),
        )
        .route("/api/video-info", get(api::media::video_info))
        .route(
            "/api/settings/users",
            get(api::settings::list_users).post(api::settings::manage_users),
        )
        .route("/api/settings/folders", get(api::settings::folder_tree))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::session_middleware,
        ));

    // Public routes (no session)
    let public = Router::new()
        .route("/api/auth/login", post(api::auth::login))
        .route("/api/auth/logout", post(api::auth::logout))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
