//! Static HTML control panel served at `/`

use axum::response::Html;

/// `GET /`
pub async fn index() -> Html<&'static str> {
    Html(CONTROL_PANEL)
}

const CONTROL_PANEL: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>kvgate</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 760px; margin: 40px auto; padding: 0 16px; background: #f4f5f7; }
    main { background: #fff; padding: 24px 32px; border-radius: 8px; box-shadow: 0 1px 6px rgba(0, 0, 0, .12); }
    h1 { color: #0063b1; margin-top: 0; }
    fieldset { border: 1px solid #dde1e6; border-radius: 6px; margin: 18px 0; }
    input { padding: 8px; width: 260px; border: 1px solid #c8ccd2; border-radius: 4px; }
    button { padding: 8px 14px; border: 0; border-radius: 4px; background: #0063b1; color: #fff; cursor: pointer; }
    button.danger { background: #b3261e; }
    pre { background: #f7f8fa; border-left: 3px solid #0063b1; padding: 12px; white-space: pre-wrap; }
  </style>
</head>
<body>
<main>
  <h1>kvgate</h1>
  <p>Store and read secrets through the gateway.</p>

  <fieldset>
    <legend>Set secret</legend>
    <input id="set-name" placeholder="name">
    <input id="set-value" placeholder="value">
    <button onclick="setSecret()">Send</button>
  </fieldset>

  <fieldset>
    <legend>Get or delete secret</legend>
    <input id="get-name" placeholder="name">
    <button onclick="getSecret()">Receive</button>
    <button class="danger" onclick="deleteSecret()">Delete</button>
  </fieldset>

  <fieldset>
    <legend>List secret names (bearer token)</legend>
    <input id="token" placeholder="token">
    <button onclick="listSecrets()">List</button>
  </fieldset>

  <pre id="output" hidden></pre>
</main>
<script>
  const value = (id) => document.getElementById(id).value;

  async function call(path, options) {
    const out = document.getElementById('output');
    out.hidden = false;
    try {
      const res = await fetch(path, options);
      const body = await res.json();
      out.textContent = res.status + '\n' + JSON.stringify(body, null, 2);
    } catch (e) {
      out.textContent = 'request failed: ' + e.message;
    }
  }

  function setSecret() {
    call('/secrets', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ name: value('set-name'), value: value('set-value') }),
    });
  }

  function getSecret() {
    call('/secrets/' + encodeURIComponent(value('get-name')));
  }

  function deleteSecret() {
    call('/secrets/' + encodeURIComponent(value('get-name')), { method: 'DELETE' });
  }

  function listSecrets() {
    call('/api/secrets', { headers: { Authorization: 'Bearer ' + value('token') } });
  }
</script>
</body>
</html>
"#;
