use promo_network::config::AppConfig;
use promo_network::seed::ensure_default_introducer;
use promo_network::{build_app, MemoryStore};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn post(&self, path: &str, token: Option<&str>, json: Value) -> (StatusCode, Value) {
        let response = self
            .request(reqwest::Method::POST, path, token)
            .json(&json)
            .send()
            .await
            .unwrap();
        read(response).await
    }

    async fn put(&self, path: &str, token: Option<&str>, json: Value) -> (StatusCode, Value) {
        let response = self
            .request(reqwest::Method::PUT, path, token)
            .json(&json)
            .send()
            .await
            .unwrap();
        read(response).await
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let response = self
            .request(reqwest::Method::GET, path, token)
            .send()
            .await
            .unwrap();
        read(response).await
    }
}

async fn read(response: reqwest::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

/// Serve a fresh in-memory app with the default introducer seeded.
async fn spawn_app() -> (TestClient, AppConfig) {
    let config = AppConfig::default();
    let store = MemoryStore::new();
    ensure_default_introducer(&store, &config.seed).await.unwrap();

    let app = build_app(store, config.clone()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (TestClient::new(format!("http://{}", address)), config)
}

async fn signup(
    client: &TestClient,
    name: &str,
    mobile: &str,
    user_type: &str,
    introducer: &Value,
) -> (StatusCode, Value) {
    client
        .post(
            "/api/auth/signup",
            None,
            json!({
                "name": name,
                "displayName": name,
                "mobile": mobile,
                "password": "secret123",
                "userType": user_type,
                "introducerId": introducer["id"],
                "introducerMobile": introducer["mobile"],
                "introducerName": introducer["name"],
            }),
        )
        .await
}

#[tokio::test]
async fn test_health_check() {
    let (client, _) = spawn_app().await;
    let (status, body) = client.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_member_signup_network_and_admin_workflow() {
    let (client, config) = spawn_app().await;

    println!("1. Looking up the seeded introducer...");
    let (status, found) = client
        .get(
            &format!("/api/users/search?mobile={}", config.seed.introducer_mobile),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let introducer = found["users"][0].clone();
    assert_eq!(introducer["mobile"], config.seed.introducer_mobile.as_str());

    println!("2. Signing up two members...");
    let (status, asha) = signup(&client, "Asha", "9000000001", "channelpartner", &introducer).await;
    assert_eq!(status, StatusCode::CREATED, "{}", asha);
    let asha_token = asha["token"].as_str().unwrap().to_string();
    assert_eq!(asha["user"]["userType"], "CP");

    let (status, ravi) = signup(&client, "Ravi", "9000000002", "both", &asha["user"]).await;
    assert_eq!(status, StatusCode::CREATED, "{}", ravi);

    let (status, duplicate) = signup(&client, "Again", "9000000001", "customer", &introducer).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate["message"], "User with this mobile number already exists");

    println!("3. Checking authentication...");
    let (status, me) = client.get("/api/auth/me", Some(&asha_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["mobile"], "9000000001");

    let (status, body) = client.get("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token, authorization denied");

    let (status, body) = client.get("/api/auth/me", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");

    let (status, body) = client
        .post(
            "/api/auth/login",
            None,
            json!({ "mobile": "9000000001", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, login) = client
        .post(
            "/api/auth/login",
            None,
            json!({ "mobile": "9000000002", "password": "secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user"]["name"], "Ravi");

    println!("4. Reading the referral network...");
    let introducer_id = introducer["id"].as_str().unwrap();
    let (status, network) = client
        .get(
            &format!("/api/users/referral-network/{}", introducer_id),
            Some(&asha_token),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", network);
    assert_eq!(network["totalBranches"], 2);
    let root_branch = &network["branches"][0];
    assert_eq!(root_branch["isRoot"], true);
    assert_eq!(root_branch["level2"]["total"], 1);
    assert_eq!(root_branch["level3"]["total"], 1);
    // A member who is both counts on both sides
    assert_eq!(root_branch["level3"]["cp"], 1);
    assert_eq!(root_branch["level3"]["customer"], 1);

    let (status, level) = client
        .get(
            &format!("/api/users/level-users/{}/3", introducer_id),
            Some(&asha_token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(level["success"], true);
    assert_eq!(level["totalUsers"], 1);
    assert_eq!(level["users"][0]["name"], "Ravi");

    let (status, _) = client
        .get(
            &format!("/api/users/level-users/{}/9", introducer_id),
            Some(&asha_token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, referrals) = client.get("/api/users/all-users", Some(&asha_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(referrals["users"].as_array().unwrap().len(), 1);

    println!("5. Exercising the admin surface...");
    let (status, body) = client.get("/api/admin/users", Some(&asha_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Access denied. Admin only.");

    let (status, body) = client
        .post(
            "/api/admin/login",
            None,
            json!({ "username": "admin", "password": "nope" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid admin credentials");

    let (status, admin) = client
        .post(
            "/api/admin/login",
            None,
            json!({
                "username": config.auth.admin_username,
                "password": config.auth.admin_password,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let admin_token = admin["token"].as_str().unwrap().to_string();

    let (status, stats) = client.get("/api/admin/users/stats", Some(&admin_token)).await;
    assert_eq!(status, StatusCode::OK, "{}", stats);
    assert_eq!(stats["stats"]["totalUsers"], 3);
    assert_eq!(stats["stats"]["usersThisWeek"], 3);

    let (status, chain) = client
        .get(
            &format!("/api/admin/referral-chain/{}", introducer_id),
            Some(&admin_token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chain["stats"]["totalReferrals"], 2);

    let (status, public) = client.get("/api/admin/public-top-introducers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["topIntroducers"].as_array().unwrap().len(), 2);

    println!("6. Moving a member between types...");
    let ravi_id = ravi["user"]["id"].as_str().unwrap();
    let (status, body) = client
        .put(
            &format!("/api/users/update-user-type/{}", ravi_id),
            Some(&asha_token),
            json!({ "userType": "Customer" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["userType"], "Customer");

    let (_, network) = client
        .get(
            &format!("/api/users/referral-network/{}", introducer_id),
            Some(&asha_token),
        )
        .await;
    assert_eq!(network["branches"][0]["level3"]["cp"], 0);
    assert_eq!(network["branches"][0]["level3"]["customer"], 1);
}

#[tokio::test]
async fn test_image_generation_requires_an_active_image() {
    let (client, config) = spawn_app().await;
    let (_, login) = client
        .post(
            "/api/auth/login",
            None,
            json!({
                "mobile": config.seed.introducer_mobile,
                "password": config.seed.introducer_password,
            }),
        )
        .await;
    let token = login["token"].as_str().unwrap().to_string();

    let (status, body) = client
        .post(
            "/api/images/generate",
            Some(&token),
            json!({ "imageId": "missing", "language": "english" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Promotional image not found or not active");

    let (status, images) = client.get("/api/admin/public-images", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(images["images"].as_array().unwrap().is_empty());
}
