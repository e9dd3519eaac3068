use axum::response::Html;

const INDEX_HTML: &str = r#"<!doctype html>
<meta charset="utf-8">
<title>USB-LLM Launcher</title>
<meta http-equiv="Cache-Control" content="no-store" />
<meta http-equiv="Pragma" content="no-cache" />
<meta http-equiv="Expires" content="0" />
<h1>USB-LLM launcher is running</h1>
<ul>
  <li><code>GET /</code>: this page</li>
  <li><code>GET /healthz</code>: JSON health (mode/submode/runtime)</li>
  <li><code>GET /v1/models</code>: read-only selected model</li>
  <li><code>POST /api/stream</code>: SSE draft stream</li>
</ul>
<p>Bound to <code>127.0.0.1</code> only.</p>
"#;

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
