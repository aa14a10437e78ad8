//! REST query service for the web UI.
//!
//! Read access to the catalog plus a favorite toggle, owner metadata, a
//! status probe and a shutdown switch:
//!
//! | Route                  | Answer                                   |
//! |------------------------|------------------------------------------|
//! | `GET /query?kw=&form=` | matching books, or the no-match sentinel |
//! | `GET /set_fav?val=&id=`| empty body                               |
//! | `GET /dbmeta?key=user` | owner name as a JSON string              |
//! | `GET /status`          | `{"status":"running"}`                   |
//! | `GET /turnoff`         | empty body, then graceful shutdown       |

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use crate::error::CatalogError;
use crate::store::CatalogStore;

/// Shared state for the query service.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<CatalogStore>>,
    /// Notified by `/turnoff`.
    pub shutdown: Arc<Notify>,
}

impl AppState {
    pub fn new(store: CatalogStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            shutdown: Arc::new(Notify::new()),
        }
    }
}

/// Serve until `/turnoff` is requested or Ctrl-C is pressed.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<(), CatalogError> {
    let addr = format!("{}:{}", host, port);
    let serve_err = |source: std::io::Error| CatalogError::Serve {
        addr: addr.clone(),
        source,
    };
    let socket: SocketAddr = addr.parse().map_err(|e: std::net::AddrParseError| {
        serve_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    })?;

    let shutdown = Arc::clone(&state.shutdown);
    let app = create_router(state);

    tracing::info!("Starting query service at http://{}", socket);
    let listener = tokio::net::TcpListener::bind(socket)
        .await
        .map_err(serve_err)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown.notified() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
            tracing::info!("Query service shutting down");
        })
        .await
        .map_err(serve_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewBook;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn setup_state() -> AppState {
        let mut store = CatalogStore::open_in_memory().await.unwrap();
        store.set_owner("ada", "secret").await.unwrap();
        let springer = store.add_publisher("Springer").await.unwrap();
        store
            .add_book(
                &NewBook {
                    title: "Deep Learning".into(),
                    publisher_id: Some(springer),
                    topics: vec!["Artificial Intelligence".into()],
                    ..Default::default()
                },
                true,
            )
            .await
            .unwrap();
        store
            .add_book(
                &NewBook {
                    title: "Ocean Data".into(),
                    form: crate::model::Form::Dataset,
                    topics: vec!["Naval".into()],
                    ..Default::default()
                },
                true,
            )
            .await
            .unwrap();
        store.commit_transaction().await.unwrap();
        AppState::new(store)
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status() {
        let app = create_router(setup_state().await);
        let (status, json) = get_json(app, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({"status": "running"}));
    }

    #[tokio::test]
    async fn test_query_wildcard_and_topic() {
        let state = setup_state().await;

        let (_, all) = get_json(create_router(state.clone()), "/query?kw=*&form=all").await;
        assert_eq!(all.as_array().unwrap().len(), 2);
        assert_eq!(all[0]["title"], "Deep Learning");
        assert_eq!(all[0]["author"], "Published By Springer");
        assert_eq!(all[0]["keywords"][0], "Artificial Intelligence");
        assert_eq!(all[0]["favourite"], false);
        assert_eq!(all[1]["author"], "");

        let (_, naval) = get_json(create_router(state.clone()), "/query?kw=naval&form=data").await;
        assert_eq!(naval.as_array().unwrap().len(), 1);
        assert_eq!(naval[0]["title"], "Ocean Data");

        let (_, books) = get_json(create_router(state), "/query?kw=naval&form=book").await;
        assert_eq!(books[0]["title"], "Could not find any matches.");
        assert!(books[0].get("id").is_none());
    }

    #[tokio::test]
    async fn test_query_missing_and_malformed_arguments() {
        let state = setup_state().await;
        let (status, json) = get_json(create_router(state.clone()), "/query").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["title"], "Could not find any matches.");

        let (_, json) = get_json(create_router(state), "/query?kw=*&form=magazine").await;
        assert_eq!(json[0]["title"], "Could not find any matches.");
    }

    #[tokio::test]
    async fn test_set_fav_commits() {
        let state = setup_state().await;
        let response = create_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/set_fav?val=1&id=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.store.lock().await.in_transaction());

        let (_, all) = get_json(create_router(state.clone()), "/query?kw=*&form=all").await;
        assert_eq!(all[0]["favourite"], true);

        // Anything but "1" clears the flag; a bad id is ignored.
        for uri in ["/set_fav?val=yes&id=1", "/set_fav?val=1&id=abc"] {
            let response = create_router(state.clone())
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let (_, all) = get_json(create_router(state), "/query?kw=*&form=all").await;
        assert_eq!(all[0]["favourite"], false);
    }

    #[tokio::test]
    async fn test_dbmeta_user() {
        let state = setup_state().await;
        let (_, user) = get_json(create_router(state.clone()), "/dbmeta?key=user").await;
        assert_eq!(user, "ada");
        let (_, other) = get_json(create_router(state), "/dbmeta?key=version").await;
        assert!(other.is_null());
    }

    #[tokio::test]
    async fn test_cors_header() {
        let response = create_router(setup_state().await)
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .header("Origin", "http://localhost:8080")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
    }

    #[tokio::test]
    async fn test_turnoff_signals_shutdown() {
        let state = setup_state().await;
        let response = create_router(state.clone())
            .oneshot(Request::builder().uri("/turnoff").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        tokio::time::timeout(Duration::from_secs(1), state.shutdown.notified())
            .await
            .expect("shutdown was not signalled");
    }
}
