use reconap_core::{EngineConfig, TenantId};
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let app = reconap_api::app::build_app(EngineConfig::default()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn identity_headers(tenant_id: TenantId, roles: &str) -> Vec<(&'static str, String)> {
    vec![
        ("x-tenant-id", tenant_id.to_string()),
        ("x-principal-id", Uuid::now_v7().to_string()),
        ("x-roles", roles.to_string()),
    ]
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let res = client.get(format!("{}/health", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn identity_headers_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let res = client.get(format!("{}/v1/whoami", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_context_is_derived_from_headers() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    let mut req = client.get(format!("{}/v1/whoami", srv.base_url));
    for (k, v) in identity_headers(tenant_id, "admin") {
        req = req.header(k, v);
    }
    let res = req.send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn create_vendor_requires_idempotency_key() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    let mut req = client.post(format!("{}/v1/vendors", srv.base_url)).json(&json!({
        "legal_name": "Acme Supply Co",
    }));
    for (k, v) in identity_headers(tenant_id, "admin") {
        req = req.header(k, v);
    }
    let res = req.send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["type"], "https://reconap.dev/problems/idempotency_key_required");
}

#[tokio::test]
async fn create_vendor_replays_on_repeated_idempotency_key() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();
    let idem_key = Uuid::now_v7().to_string();

    let send = |client: &reqwest::Client| {
        let mut req = client.post(format!("{}/v1/vendors", srv.base_url)).json(&json!({
            "legal_name": "Acme Supply Co",
        }));
        for (k, v) in identity_headers(tenant_id, "admin") {
            req = req.header(k, v);
        }
        req.header("idempotency-key", idem_key.clone()).send()
    };

    let first = send(&client).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_body: serde_json::Value = first.json().await.unwrap();

    let second = send(&client).await.unwrap();
    assert_eq!(second.status(), StatusCode::CREATED);
    let second_body: serde_json::Value = second.json().await.unwrap();

    assert_eq!(first_body["id"], second_body["id"], "replay must return the same stored response");
}

#[tokio::test]
async fn create_vendor_rejects_key_reuse_with_different_body() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();
    let idem_key = Uuid::now_v7().to_string();

    let mut first = client.post(format!("{}/v1/vendors", srv.base_url)).json(&json!({ "legal_name": "Acme Supply Co" }));
    for (k, v) in identity_headers(tenant_id, "admin") {
        first = first.header(k, v);
    }
    let first_res = first.header("idempotency-key", idem_key.clone()).send().await.unwrap();
    assert_eq!(first_res.status(), StatusCode::CREATED);

    let mut second = client.post(format!("{}/v1/vendors", srv.base_url)).json(&json!({ "legal_name": "A Totally Different Vendor" }));
    for (k, v) in identity_headers(tenant_id, "admin") {
        second = second.header(k, v);
    }
    let second_res = second.header("idempotency-key", idem_key).send().await.unwrap();
    assert_eq!(second_res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = second_res.json().await.unwrap();
    assert_eq!(body["type"], "https://reconap.dev/problems/idempotency_conflict");
}

#[tokio::test]
async fn viewer_role_cannot_create_vendors() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    let mut req = client.post(format!("{}/v1/vendors", srv.base_url)).json(&json!({ "legal_name": "Acme Supply Co" }));
    for (k, v) in identity_headers(tenant_id, "viewer") {
        req = req.header(k, v);
    }
    let res = req.header("idempotency-key", Uuid::now_v7().to_string()).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn three_way_match_lifecycle_creates_vendor_po_receipt_invoice_and_matches() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    let post_json = |path: &str, body: serde_json::Value| {
        let mut req = client.post(format!("{}{path}", srv.base_url)).json(&body);
        for (k, v) in identity_headers(tenant_id, "admin") {
            req = req.header(k, v);
        }
        req.header("idempotency-key", Uuid::now_v7().to_string()).send()
    };

    let vendor: serde_json::Value = post_json("/v1/vendors", json!({ "legal_name": "Acme Supply Co" }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let vendor_id = vendor["id"].as_str().unwrap().to_string();

    let po: serde_json::Value = post_json(
        "/v1/purchase-orders",
        json!({
            "po_number": "PO-1001",
            "vendor_id": vendor_id,
            "currency": "USD",
            "po_date": "2026-06-01",
            "expected_date": "2026-06-15",
            "line_items": [
                { "line_no": 1, "sku": "SKU-1", "description": "Widget", "ordered_qty": 10, "unit_price": "25.00" },
            ],
        }),
    )
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    let po_id = po["id"].as_str().unwrap().to_string();

    let receipt_res = post_json(
        "/v1/receipts",
        json!({
            "po_id": po_id,
            "received_date": "2026-06-10",
            "total_amount": "250.00",
            "line_items": [{ "po_line_no": 1, "received_qty": 10 }],
        }),
    )
    .await
    .unwrap();
    assert_eq!(receipt_res.status(), StatusCode::CREATED);

    let invoice: serde_json::Value = post_json(
        "/v1/invoices",
        json!({
            "invoice_number": "INV-1001",
            "vendor_id": vendor_id,
            "po_id": po_id,
            "subtotal": "250.00",
            "tax_amount": "0.00",
            "total_amount": "250.00",
            "currency": "USD",
            "invoice_date": "2026-06-12",
        }),
    )
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    let invoice_id = invoice["id"].as_str().unwrap().to_string();

    let run_res = post_json(&format!("/v1/invoices/{invoice_id}/matches/run"), json!({})).await.unwrap();
    assert_eq!(run_res.status(), StatusCode::OK);
    let results: serde_json::Value = run_res.json().await.unwrap();
    let items = results.as_array().expect("match run returns a list of results");
    assert!(!items.is_empty(), "exact 3-way match must produce at least one result");
}
