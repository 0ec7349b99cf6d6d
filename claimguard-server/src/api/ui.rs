//! Minimal HTML index of the API

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use crate::AppState;

pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/ui", get(index_page))
}

async fn index_page() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>ClaimGuard</title>
    <style>
        body { font-family: system-ui, sans-serif; max-width: 760px; margin: 40px auto; line-height: 1.6; }
        code { background: #f2f2f2; padding: 1px 4px; }
    </style>
</head>
<body>
    <h1>ClaimGuard fraud pipeline</h1>
    <ol>
        <li><code>POST /data/generate</code> synthetic claims and documents</li>
        <li><code>GET /ingest</code> claim store status</li>
        <li><code>POST /features/compute</code> Stage-1 features</li>
        <li><code>POST /docs/prepare</code> chunk raw documents</li>
        <li><code>POST /embeddings/build</code> build the retrieval index</li>
        <li><code>GET /embeddings/info</code> index details</li>
        <li><code>GET /stage2/analyze?claim_id=C100000&amp;k=5</code> analyze one claim</li>
        <li><code>POST /stage2/evaluate</code> analyze all candidates</li>
        <li><code>GET /candidates/list?limit=200</code> Stage-1 candidates</li>
        <li><code>GET /review-queue?limit=100</code> latest review queue</li>
    </ol>
    <p><a href="/health">/health</a></p>
</body>
</html>
"#,
    )
}
