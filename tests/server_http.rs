use nl2sql_dashboard::config::GenerationSettings;
use nl2sql_dashboard::llm::FixedResponseModel;
use nl2sql_dashboard::server::serve;
use nl2sql_dashboard::Dashboard;
use rusqlite::Connection;
use std::sync::Arc;
use tokio::net::TcpListener;

async fn start_server(model_response: &str) -> String {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE Responses (respondent TEXT NOT NULL, role_id INTEGER, score REAL);
         INSERT INTO Responses VALUES ('r1', 1, 4.0), ('r2', 2, 3.5), ('r3', 2, NULL);",
    )
    .unwrap();
    let dashboard = Arc::new(Dashboard::new(
        conn,
        Arc::new(FixedResponseModel::new(model_response)),
        GenerationSettings::default(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, dashboard));
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_ask_over_http() {
    let base = start_server(
        "SELECT role_id, AVG(score) AS avg_score FROM Responses GROUP BY role_id ORDER BY role_id;",
    )
    .await;

    let body: serde_json::Value = reqwest::Client::new()
        .post(format!("{}/api/ask", base))
        .json(&serde_json::json!({"question": "Average score per role?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "answered");
    assert_eq!(body["question"], "Average score per role?");
    assert_eq!(
        body["result"]["columns"],
        serde_json::json!(["role_id", "avg_score"])
    );
    assert_eq!(body["result"]["rows"], serde_json::json!([[1, 4.0], [2, 3.5]]));
    assert_eq!(body["result"]["row_count"], 2);
}

#[tokio::test]
async fn test_validation_failure_over_http() {
    let base = start_server("UPDATE Responses SET score = 5;").await;

    let body: serde_json::Value = reqwest::Client::new()
        .post(format!("{}/api/ask", base))
        .json(&serde_json::json!({"question": "Give everyone full marks"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "generation_failed");
    assert_eq!(body["message"], "Invalid SQL output: Not a SELECT");
    assert!(body.get("sql").is_none());
}

#[tokio::test]
async fn test_page_and_health_over_http() {
    let base = start_server("SELECT 1;").await;

    let page = reqwest::get(format!("{}/", base)).await.unwrap();
    assert!(page.status().is_success());
    let html = page.text().await.unwrap();
    assert!(html.contains("NL2SQL Dashboard"));
    assert!(html.contains("Ask a question about your survey data:"));

    let health: serde_json::Value = reqwest::get(format!("{}/api/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["service"], "nl2sql-dashboard");
}

#[tokio::test]
async fn test_schema_over_http() {
    let base = start_server("SELECT 1;").await;

    let schema: serde_json::Value = reqwest::get(format!("{}/api/schema", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let columns = &schema["tables"][0]["columns"];
    assert_eq!(schema["tables"][0]["name"], "Responses");
    assert_eq!(columns[0]["name"], "respondent");
    assert_eq!(columns[0]["not_null"], true);
    assert_eq!(columns[2]["declared_type"], "REAL");
}
