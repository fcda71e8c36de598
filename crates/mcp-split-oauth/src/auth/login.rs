//! HTML login page for the authorization endpoint.

/// Render the resource-owner login page.
///
/// The form carries only the server-minted transaction id; every other
/// authorization parameter stays server-side in the pending record. All
/// interpolated values are HTML-escaped.
pub fn render_login_page(client_name: &str, txn_id: &str, error_message: Option<&str>) -> String {
    let error_html = error_message
        .map(|msg| {
            format!(
                r#"<div style="background:#fee;border:1px solid #c00;color:#c00;padding:10px;border-radius:4px;margin-bottom:16px">{}</div>"#,
                html_escape(msg)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>Sign in - MCP Authorization Server</title>
<style>
body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; background: #f5f5f5; margin: 0; display: flex; justify-content: center; align-items: center; min-height: 100vh; }}
.card {{ background: #fff; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); padding: 32px; max-width: 400px; width: 100%; }}
h1 {{ font-size: 20px; margin: 0 0 8px; color: #333; }}
.subtitle {{ color: #666; font-size: 14px; margin: 0 0 24px; }}
label {{ display: block; font-size: 14px; font-weight: 500; margin-bottom: 6px; color: #333; }}
input[type="text"], input[type="password"] {{ width: 100%; padding: 10px; border: 1px solid #ddd; border-radius: 4px; font-size: 14px; box-sizing: border-box; margin-bottom: 12px; }}
input[type="text"]:focus, input[type="password"]:focus {{ outline: none; border-color: #4a90d9; box-shadow: 0 0 0 2px rgba(74,144,217,0.2); }}
button {{ width: 100%; padding: 10px; background: #4a90d9; color: #fff; border: none; border-radius: 4px; font-size: 14px; font-weight: 500; cursor: pointer; margin-top: 8px; }}
button:hover {{ background: #357abd; }}
.hint {{ background: #eef5fd; border: 1px solid #bcd8f5; border-radius: 4px; color: #336; font-size: 13px; padding: 10px; margin-bottom: 16px; }}
</style>
</head>
<body>
<div class="card">
<h1>MCP Authorization Server</h1>
<p class="subtitle"><strong>{client_name}</strong> is requesting access</p>
{error_html}
<div class="hint">Demo credentials: <code>demo_user</code> / <code>demo_password</code></div>
<form method="POST" action="/login/callback">
<input type="hidden" name="txn" value="{txn_escaped}">
<label for="username">Username</label>
<input type="text" id="username" name="username" placeholder="Username" required autofocus>
<label for="password">Password</label>
<input type="password" id="password" name="password" placeholder="Password" required>
<button type="submit">Sign in</button>
</form>
</div>
</body>
</html>"#,
        client_name = html_escape(client_name),
        error_html = error_html,
        txn_escaped = html_escape(txn_id),
    )
}

/// Render a terminal error page for requests that cannot continue, such as
/// an expired login transaction.
pub fn render_error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Authorization Error</title>
<style>
body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; background: #f5f5f5; margin: 0; display: flex; justify-content: center; align-items: center; min-height: 100vh; }}
.card {{ background: #fff; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); padding: 32px; max-width: 400px; width: 100%; }}
h1 {{ font-size: 20px; margin: 0 0 8px; color: #c00; }}
p {{ color: #666; font-size: 14px; }}
</style>
</head>
<body>
<div class="card">
<h1>Authorization Error</h1>
<p>{}</p>
</div>
</body>
</html>"#,
        html_escape(message)
    )
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
