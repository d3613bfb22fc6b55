//! Synthetic auto-submitting documents for the two login steps.
//!
//! The server's own login form assumes a human; unattended login instead
//! loads a locally synthesized page whose form carries the credentials in
//! hidden fields and submits itself on load. Field names and target paths
//! mirror the server's real forms exactly; the server cannot tell the
//! difference. Actions are absolute same-origin URLs so the document works
//! regardless of the surface's base-URL handling.

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// The primary login submission.
pub fn login_document(game_host: &str, login: &str, password: &str) -> String {
    format!(
        r#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=windows-1251"></head>
<body onload="document.forms['auth'].submit();">
<form name="auth" method="POST" action="http://{host}/game.php">
<input type="hidden" name="player_nick" value="{login}">
<input type="hidden" name="player_password" value="{password}">
</form>
</body></html>"#,
        host = game_host,
        login = html_escape(login),
        password = html_escape(password),
    )
}

/// The secondary ("flash") password submission.
pub fn flash_password_document(game_host: &str, flash_password: &str) -> String {
    format!(
        r#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=windows-1251"></head>
<body onload="document.forms['flash'].submit();">
<form name="flash" method="POST" action="http://{host}/game.php?fp=1">
<input type="hidden" name="flashpass" value="{flash}">
</form>
</body></html>"#,
        host = game_host,
        flash = html_escape(flash_password),
    )
}
