use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use rnm_shared::errors::ErrorCode;
use rnm_shared::types::auth::{Claims, JwtSecret, UserRole};

use rnm_marketplace::config::AppConfig;
use rnm_marketplace::models::{EngagementCounter, Gender, ListingType, ReviewState, UserProfile};
use rnm_marketplace::policy::Actor;
use rnm_marketplace::services::listings::{self, ListingDraft, ListingPatch};
use rnm_marketplace::services::photos::PhotoStorage;
use rnm_marketplace::services::{moderation, saved};
use rnm_marketplace::store::{ListingFilter, ListingRepository, MemoryStore, Store, UserRepository};
use rnm_marketplace::{router, AppState};

const SECRET: &str = "lifecycle-test-secret";

struct NullStorage;

#[async_trait]
impl PhotoStorage for NullStorage {
    async fn put(&self, key: &str, _body: Vec<u8>, _content_type: &str) -> Result<String, String> {
        Ok(format!("http://photos.test/{key}"))
    }

    async fn ping(&self) -> Result<(), String> {
        Ok(())
    }
}

async fn profile(store: &dyn Store, role: UserRole) -> Actor {
    let mut profile = UserProfile::new(Uuid::now_v7(), "+919876543210");
    profile.role = role;
    Actor::from(&store.ensure_user(profile).await.unwrap())
}

fn draft() -> ListingDraft {
    ListingDraft {
        title: "Spacious single room".into(),
        listing_type: ListingType::Room,
        category: Some("single".into()),
        price: 5000,
        deposit: 10000,
        description: None,
        rules: None,
        photos: vec![],
        city: "Pune".into(),
        area: "Kothrud".into(),
        landmark: None,
        full_address: None,
        gender: Some(Gender::Unisex),
        food_type: None,
    }
}

// --- Service level ---

#[tokio::test]
async fn reject_edit_approve_round_trip() {
    let store = MemoryStore::new();
    let owner = profile(&store, UserRole::Owner).await;
    let admin = profile(&store, UserRole::Admin).await;

    let listing = listings::create(&store, &owner, draft()).await.unwrap();
    assert_eq!(listing.review.state(), ReviewState::Pending);

    let rejected = moderation::reject(&store, &admin, listing.id, "Photos unclear").await.unwrap();
    assert_eq!(rejected.review.rejection_reason(), Some("Photos unclear"));

    let patch = ListingPatch {
        title: Some("Spacious single room, new photos".into()),
        ..Default::default()
    };
    let edited = listings::update(&store, &owner, listing.id, patch).await.unwrap();
    assert_eq!(edited.review.state(), ReviewState::Pending);
    assert_eq!(edited.review.rejection_reason(), None);

    let approved = moderation::approve(&store, &admin, listing.id).await.unwrap();
    assert_eq!(approved.review.state(), ReviewState::Verified);
    assert!(approved.review.is_verified());

    let (log, total) = moderation::audit_log(&store, &admin, &Default::default()).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(log[0].target_id, listing.id);
}

#[tokio::test]
async fn concurrent_views_are_all_counted() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let owner = profile(store.as_ref(), UserRole::Owner).await;
    let listing = listings::create(store.as_ref(), &owner, draft()).await.unwrap();

    let (a, b, c) = tokio::join!(
        listings::record_engagement(store.as_ref(), listing.id, EngagementCounter::Views),
        listings::record_engagement(store.as_ref(), listing.id, EngagementCounter::Views),
        listings::record_engagement(store.as_ref(), listing.id, EngagementCounter::Views),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let stored = store.find_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(stored.view_count, 3);
    assert_eq!(stored.contact_count, 0);
}

#[tokio::test]
async fn saving_twice_conflicts() {
    let store = MemoryStore::new();
    let owner = profile(&store, UserRole::Owner).await;
    let user = profile(&store, UserRole::User).await;
    let listing = listings::create(&store, &owner, draft()).await.unwrap();

    saved::save(&store, &user, listing.id).await.unwrap();
    let err = saved::save(&store, &user, listing.id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadySaved);
    assert_eq!(saved::list_for_user(&store, &user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn browse_by_city_and_verified() {
    let store = MemoryStore::new();
    let owner = profile(&store, UserRole::Owner).await;
    let admin = profile(&store, UserRole::Admin).await;

    let pune = listings::create(&store, &owner, draft()).await.unwrap();
    moderation::approve(&store, &admin, pune.id).await.unwrap();
    listings::create(&store, &owner, draft()).await.unwrap();
    let nashik = ListingDraft {
        city: "Nashik".into(),
        ..draft()
    };
    let nashik = listings::create(&store, &owner, nashik).await.unwrap();
    moderation::approve(&store, &admin, nashik.id).await.unwrap();

    let filter = ListingFilter {
        city: Some("Pune".into()),
        verified: Some(true),
        ..Default::default()
    };
    let found = listings::browse(&store, filter).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].listing.id, pune.id);
}

// --- HTTP ---

fn app(store: Arc<dyn Store>) -> Router {
    let config = AppConfig {
        rabbitmq_url: String::new(),
        ..Default::default()
    };
    router(Arc::new(AppState {
        store,
        config,
        rabbitmq: None,
        photos: Arc::new(NullStorage),
        metrics_handle: None,
        jwt: JwtSecret::new(SECRET),
    }))
}

fn bearer(actor: &Actor) -> String {
    bearer_for(actor.id, actor.role)
}

fn bearer_for(id: Uuid, role: UserRole) -> String {
    let claims = Claims::new(id, role, 3600);
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
    format!("Bearer {token}")
}

async fn call(app: &Router, method: Method, uri: &str, auth: Option<&Actor>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(actor) = auth {
        request = request.header(header::AUTHORIZATION, bearer(actor));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok_without_broker() {
    let app = app(Arc::new(MemoryStore::new()));
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn owner_submits_and_admin_moderates_over_http() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let owner = profile(store.as_ref(), UserRole::Owner).await;
    let admin = profile(store.as_ref(), UserRole::Admin).await;
    let app = app(store);

    let draft = json!({
        "title": "Veg tiffin service",
        "type": "mess",
        "category": "veg",
        "price": 2500,
        "city": "Pune",
        "area": "Kothrud",
        "food_type": "veg"
    });
    let (status, body) = call(&app, Method::POST, "/listings", Some(&owner), Some(draft)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // pending listings stay out of browse until approved
    let (_, body) = call(&app, Method::GET, "/listings?verified=true", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let uri = format!("/admin/listings/{id}/reject");
    let (status, body) = call(&app, Method::POST, &uri, Some(&admin), Some(json!({ "reason": "Photos unclear" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["rejection_reason"], "Photos unclear");

    let (_, body) = call(&app, Method::GET, "/admin/listings?status=rejected", Some(&admin), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    let (_, body) = call(&app, Method::GET, "/admin/listings?status=pending", Some(&admin), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let uri = format!("/admin/listings/{id}/approve");
    let (status, body) = call(&app, Method::POST, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_verified"], true);

    let (_, body) = call(&app, Method::GET, "/listings?city=Pune&verified=true", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["owner"]["phone"], "+919876543210");
}

#[tokio::test]
async fn role_gates_are_enforced_over_http() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let user = profile(store.as_ref(), UserRole::User).await;
    let app = app(store);

    let (status, _) = call(&app, Method::GET, "/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, Method::GET, "/admin/stats", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], ErrorCode::Forbidden.code());

    let (status, body) = call(&app, Method::GET, "/me/capabilities", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tabs"], json!(["browse", "saved", "profile"]));

    let (status, body) = call(&app, Method::POST, "/me/upgrade", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "owner");
}

#[tokio::test]
async fn admin_access_follows_the_stored_role() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let promoted = profile(store.as_ref(), UserRole::Admin).await;
    let demoted = profile(store.as_ref(), UserRole::User).await;
    let app = app(store);

    // token minted before the promotion still carries the old role
    let request = Request::builder()
        .uri("/admin/stats")
        .header(header::AUTHORIZATION, bearer_for(promoted.id, UserRole::User))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // and a stale admin claim does not outlive a stored demotion
    let request = Request::builder()
        .uri("/admin/stats")
        .header(header::AUTHORIZATION, bearer_for(demoted.id, UserRole::Admin))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unsave_without_bookmark_reports_not_removed() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let user = profile(store.as_ref(), UserRole::User).await;
    let app = app(store);

    let uri = format!("/saved/{}", Uuid::now_v7());
    let (status, body) = call(&app, Method::DELETE, &uri, Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], false);
}
