//! JSON-over-HTTP API for the Zeitgeist event log.
//!
//! Exposes an axum [`Router`] backed by any [`zeit_core::store::EventLog`],
//! plus optional routers for the blacklist and data-source extensions.
//! Auth and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", zeit_api::api_router(store.clone(), Some(blacklist), None))
//! ```

pub mod blacklist;
pub mod datasources;
pub mod error;
pub mod events;
pub mod monitors;
pub mod storages;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use zeit_core::{blacklist::Blacklist, datasource::DataSourceRegistry, store::EventLog};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`. The blacklist and
/// data-source routes are mounted only when their extension is given.
pub fn api_router<S>(
  store: Arc<S>,
  blacklist: Option<Arc<Blacklist>>,
  data_sources: Option<Arc<DataSourceRegistry>>,
) -> Router<()>
where
  S: EventLog + 'static,
{
  let router = Router::new()
    // Events
    .route("/events", post(events::insert::<S>))
    .route("/events/get", post(events::get::<S>))
    .route("/events/delete", post(events::delete::<S>))
    .route("/events/find-ids", post(events::find_ids::<S>))
    .route("/events/find", post(events::find::<S>))
    .route("/related-uris", post(events::related_uris::<S>))
    .route("/log", delete(events::delete_log::<S>))
    // Monitors
    .route("/monitors", post(monitors::install::<S>))
    .route("/monitors/{id}", delete(monitors::remove::<S>))
    // Storage media
    .route("/storages", get(storages::list::<S>))
    .route(
      "/storages/{medium}",
      put(storages::available::<S>).delete(storages::unavailable::<S>),
    )
    .with_state(store);

  let router = match blacklist {
    Some(blacklist) => router.merge(blacklist_router(blacklist)),
    None => router,
  };
  match data_sources {
    Some(registry) => router.merge(data_source_router(registry)),
    None => router,
  }
}

/// Routes for listing, adding and removing blacklist templates.
pub fn blacklist_router(blacklist: Arc<Blacklist>) -> Router<()> {
  Router::new()
    .route("/blacklist", get(blacklist::list))
    .route("/blacklist/{id}", put(blacklist::add).delete(blacklist::remove))
    .with_state(blacklist)
}

/// Routes for registering data sources and toggling them.
pub fn data_source_router(registry: Arc<DataSourceRegistry>) -> Router<()> {
  Router::new()
    .route("/data-sources", get(datasources::list))
    .route("/data-sources/{id}", get(datasources::get).put(datasources::register))
    .route("/data-sources/{id}/enabled", put(datasources::set_enabled))
    .with_state(registry)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
  };
  use serde_json::{Value, json};
  use tokio_stream::StreamExt as _;
  use tower::ServiceExt as _;
  use zeit_core::extension::ExtensionChain;
  use zeit_store_sqlite::{SqliteStore, StoreOptions};

  use super::*;

  async fn app() -> Router {
    let blacklist = Arc::new(Blacklist::new(Arc::default()));
    let registry = Arc::new(DataSourceRegistry::new());
    let options = StoreOptions {
      extensions: ExtensionChain::new().with(blacklist.clone()).with(registry.clone()),
      ..Default::default()
    };
    let store = SqliteStore::open_in_memory(options).await.unwrap();
    api_router(Arc::new(store), Some(blacklist), Some(registry))
  }

  async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string())),
      None => builder.body(Body::empty()),
    }
    .unwrap();
    app.clone().oneshot(req).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn event(timestamp: i64, actor: &str, uri: &str) -> Value {
    json!({
      "timestamp": timestamp,
      "interpretation": "acc",
      "manifestation": "ua",
      "actor": actor,
      "subjects": [{ "uri": uri }],
    })
  }

  #[tokio::test]
  async fn insert_then_get() {
    let app = app().await;
    let resp = send(&app, "POST", "/events", Some(json!({ "events": [event(100, "app://a", "file:///x")] })))
      .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!([1]));

    let resp = send(&app, "POST", "/events/get", Some(json!({ "ids": [1, 9] }))).await;
    let events = json_body(resp).await;
    assert_eq!(events[0]["id"], 1);
    assert_eq!(events[0]["subjects"][0]["current_uri"], "file:///x");
    assert!(events[1].is_null());
  }

  #[tokio::test]
  async fn find_with_templates_and_order_codes() {
    let app = app().await;
    let events = json!({ "events": [
      event(1, "app://a", "x"),
      event(2, "app://b", "y"),
      event(3, "app://a", "z"),
    ]});
    send(&app, "POST", "/events", Some(events)).await;

    let query = json!({ "templates": [{ "actor": "app://a" }], "order": 1 });
    let resp = send(&app, "POST", "/events/find-ids", Some(query)).await;
    assert_eq!(json_body(resp).await, json!([1, 3]));

    let query = json!({ "templates": [{ "actor": "!app://a" }], "sender": "test" });
    let found = json_body(send(&app, "POST", "/events/find", Some(query)).await).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["actor"], "app://b");
  }

  #[tokio::test]
  async fn unsupported_operator_is_a_bad_request() {
    let app = app().await;
    let query = json!({ "templates": [{ "id": "!1" }] });
    let resp = send(&app, "POST", "/events/find-ids", Some(query)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].as_str().unwrap().contains("negation"));
  }

  #[tokio::test]
  async fn unknown_order_code_is_rejected() {
    let app = app().await;
    let resp = send(&app, "POST", "/events/find-ids", Some(json!({ "order": 99 }))).await;
    assert!(resp.status().is_client_error());
  }

  #[tokio::test]
  async fn delete_reports_the_time_span() {
    let app = app().await;
    let events = json!({ "events": [event(10, "app://a", "x"), event(20, "app://a", "y")] });
    send(&app, "POST", "/events", Some(events)).await;

    let resp = send(&app, "POST", "/events/delete", Some(json!({ "ids": [1, 2] }))).await;
    assert_eq!(json_body(resp).await, json!({ "start": 10, "end": 20 }));

    let resp = send(&app, "POST", "/events/delete", Some(json!({ "ids": [1] }))).await;
    assert!(json_body(resp).await.is_null());
  }

  #[tokio::test]
  async fn related_uris_over_http() {
    let app = app().await;
    let events = json!({ "events": [
      event(1, "app://a", "before"),
      event(2, "app://seed", "seed"),
      event(3, "app://a", "after"),
    ]});
    send(&app, "POST", "/events", Some(events)).await;

    let query = json!({
      "event_templates": [{ "actor": "app://seed" }],
      "num_results": 5,
      "result_type": 1,
    });
    let resp = send(&app, "POST", "/related-uris", Some(query)).await;
    assert_eq!(json_body(resp).await, json!(["after", "before"]));
  }

  #[tokio::test]
  async fn storage_registry_round() {
    let app = app().await;
    let resp = send(&app, "PUT", "/storages/usb", Some(json!({ "display_name": "Stick" }))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&app, "DELETE", "/storages/usb", None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let media = json_body(send(&app, "GET", "/storages", None).await).await;
    assert_eq!(media[0]["value"], "usb");
    assert_eq!(media[0]["available"], false);
    assert_eq!(media[0]["display_name"], "Stick");
  }

  #[tokio::test]
  async fn blacklist_vetoes_inserts() {
    let app = app().await;
    let resp = send(&app, "PUT", "/blacklist/no-b", Some(json!({ "actor": "app://b" }))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let listed = json_body(send(&app, "GET", "/blacklist", None).await).await;
    assert_eq!(listed["no-b"]["actor"], "app://b");

    let events = json!({ "events": [event(1, "app://a", "x"), event(2, "app://b", "y")] });
    let ids = json_body(send(&app, "POST", "/events", Some(events)).await).await;
    assert_eq!(ids, json!([1, 0]));

    let resp = send(&app, "DELETE", "/blacklist/no-b", None).await;
    assert_eq!(json_body(resp).await["actor"], "app://b");
    let resp = send(&app, "DELETE", "/blacklist/no-b", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  /// Split a server-sent event payload into `(event, data)` pairs.
  fn sse_events(text: &str) -> Vec<(String, Value)> {
    text
      .split("\n\n")
      .filter_map(|block| {
        let mut name = None;
        let mut data = None;
        for line in block.lines() {
          if let Some(v) = line.strip_prefix("event: ") {
            name = Some(v.to_string());
          } else if let Some(v) = line.strip_prefix("data: ") {
            data = Some(serde_json::from_str(v).unwrap());
          }
        }
        Some((name?, data?))
      })
      .collect()
  }

  #[tokio::test]
  async fn monitor_streams_matching_events_until_removed() {
    let app = app().await;
    let resp = send(&app, "POST", "/monitors", Some(json!({ "templates": [{ "actor": "app://a" }] })))
      .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");

    let mut body = resp.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    let installed = sse_events(std::str::from_utf8(&first).unwrap());
    assert_eq!(installed[0].0, "installed");
    let id = installed[0].1["id"].as_u64().unwrap();

    let events = json!({ "events": [event(1, "app://a", "x"), event(2, "app://b", "y")] });
    send(&app, "POST", "/events", Some(events)).await;
    send(&app, "POST", "/events/delete", Some(json!({ "ids": [2] }))).await;

    let resp = send(&app, "DELETE", &format!("/monitors/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let mut rest = String::new();
    while let Some(chunk) = body.next().await {
      rest.push_str(std::str::from_utf8(&chunk.unwrap()).unwrap());
    }
    let notifications = sse_events(&rest);
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0].0, "insert");
    assert_eq!(notifications[0].1["events"].as_array().unwrap().len(), 1);
    assert_eq!(notifications[0].1["events"][0]["actor"], "app://a");
    assert_eq!(notifications[1].0, "delete");
    assert_eq!(notifications[1].1["ids"], json!([2]));

    let resp = send(&app, "DELETE", &format!("/monitors/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn monitor_with_bad_template_is_refused() {
    let app = app().await;
    let resp = send(&app, "POST", "/monitors", Some(json!({ "templates": [{ "id": "!1" }] }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn disabled_data_source_is_vetoed() {
    let app = app().await;
    let registration = json!({ "name": "Editor", "sender": "editor" });
    let resp = send(&app, "PUT", "/data-sources/org.example.editor", Some(registration)).await;
    assert_eq!(json_body(resp).await, json!({ "enabled": true }));

    let resp = send(&app, "PUT", "/data-sources/org.example.editor/enabled", Some(json!({ "enabled": false })))
      .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let source = json_body(send(&app, "GET", "/data-sources/org.example.editor", None).await).await;
    assert_eq!(source["enabled"], false);
    assert_eq!(source["running"], true);

    let insert = json!({ "events": [event(1, "app://a", "x")], "sender": "editor" });
    assert_eq!(json_body(send(&app, "POST", "/events", Some(insert)).await).await, json!([0]));

    let listed = json_body(send(&app, "GET", "/data-sources", None).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let resp = send(&app, "PUT", "/data-sources/nope/enabled", Some(json!({ "enabled": true }))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn delete_log_empties_the_store() {
    let app = app().await;
    let events = json!({ "events": [event(1, "app://a", "x"), event(2, "app://a", "y")] });
    send(&app, "POST", "/events", Some(events)).await;

    let resp = send(&app, "DELETE", "/log", None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let ids = json_body(send(&app, "POST", "/events/find-ids", Some(json!({}))).await).await;
    assert_eq!(ids, json!([]));
    let events = json!({ "events": [event(3, "app://a", "z")] });
    assert_eq!(json_body(send(&app, "POST", "/events", Some(events)).await).await, json!([1]));
  }
}
