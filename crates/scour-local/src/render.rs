//! Page rendering through Node + Playwright.
//!
//! One headless Chromium process per render, args passed over stdin as JSON,
//! JSON-only stdout, and a hard wall-clock timeout with `kill_on_drop` so no
//! browser outlives the agent whatever the exit path.
//!
//! Expected setup: Node.js on PATH and the `playwright` npm package
//! resolvable by Node (plus `npx playwright install chromium`). Environments
//! without it set `SCOUR_RENDER_DISABLE=1` and the reader falls back to a
//! plain HTTP fetch.

use std::time::Duration;

use tokio::io::AsyncWriteExt;

use scour_core::{Error, Result};

use crate::{env, env_truthy};

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub final_url: String,
    pub status: Option<u16>,
    pub html: String,
}

const JS: &str = r#"
const fs = require('fs');

function ok(obj) { process.stdout.write(JSON.stringify(obj)); }
function bad(code, message) { ok({ ok: false, error: { code, message } }); }

async function main() {
  let arg = '';
  try { arg = fs.readFileSync(0, 'utf8'); } catch (_) {}
  let req;
  try { req = JSON.parse(arg); } catch (e) { return bad('invalid_params', 'bad JSON args'); }

  let pw;
  try { pw = require('playwright'); } catch (e) {
    return bad('not_configured', 'Playwright is not installed for Node.js (require("playwright") failed)');
  }

  const url = String(req.url || '').trim();
  if (!url) return bad('invalid_params', 'url must be non-empty');
  const timeoutMs = Number(req.timeout_ms || 20000);

  let browser;
  try {
    browser = await pw.chromium.launch({ headless: true });
    const context = await browser.newContext({ serviceWorkers: 'block' });
    const page = await context.newPage();
    // Images/media/fonts rarely help text extraction; skip them.
    try {
      await page.route('**/*', (route) => {
        const rt = route.request().resourceType();
        if (rt === 'image' || rt === 'media' || rt === 'font') return route.abort();
        return route.continue();
      });
    } catch (_) {}

    const resp = await page.goto(url, { waitUntil: 'domcontentloaded', timeout: timeoutMs });
    // Best-effort settle: don't block forever on long-polling.
    try { await page.waitForLoadState('networkidle', { timeout: Math.min(5000, timeoutMs) }); } catch (_) {}

    const html = await page.content();
    ok({ ok: true, final_url: page.url(), status: resp ? resp.status() : null, html });
  } catch (e) {
    bad('fetch_failed', String(e && e.message ? e.message : e));
  } finally {
    try { if (browser) await browser.close(); } catch (_) {}
  }
}

main().catch((e) => bad('fetch_failed', String(e && e.message ? e.message : e)));
"#;

pub async fn render_html(url: &str, timeout_ms: u64) -> Result<RenderedPage> {
    // Deterministic escape hatch (tests and "no local tooling" environments).
    if env_truthy("SCOUR_RENDER_DISABLE") {
        return Err(Error::NotConfigured(
            "render backend disabled (SCOUR_RENDER_DISABLE)".to_string(),
        ));
    }

    let args_json = serde_json::json!({
        "url": url,
        "timeout_ms": timeout_ms,
    })
    .to_string();

    // Hard wall-clock timeout for the whole Node+Playwright operation;
    // checking elapsed after completion would not prevent hangs.
    let hard_timeout_ms = timeout_ms.saturating_add(10_000);
    let node_bin = env("SCOUR_NODE").unwrap_or_else(|| "node".to_string());

    let mut cmd = tokio::process::Command::new(node_bin);
    if let Some(node_path) = env("SCOUR_NODE_PATH") {
        // Lets a globally-installed Playwright be found without touching
        // the user's NODE_PATH.
        cmd.env("NODE_PATH", node_path);
    }
    let mut child = cmd
        .arg("-e")
        .arg(JS)
        .kill_on_drop(true)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| {
            Error::NotConfigured(format!(
                "page render requires Node.js (`node`) and the Playwright npm package: {e}"
            ))
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // Best-effort: a failed write surfaces as a deterministic JSON error
        // from the child (or a wait failure below).
        let _ = stdin.write_all(args_json.as_bytes()).await;
        let _ = stdin.shutdown().await;
    }

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Fetch("render: missing stdout pipe".to_string()))?;
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = tokio::io::AsyncReadExt::read_to_end(&mut stdout, &mut buf).await;
        buf
    });
    // Chromium is chatty on stderr; an undrained pipe fills up and blocks
    // the child, so both pipes are read concurrently with the wait.
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Fetch("render: missing stderr pipe".to_string()))?;
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = tokio::io::AsyncReadExt::read_to_end(&mut stderr, &mut buf).await;
        buf
    });

    match tokio::time::timeout(Duration::from_millis(hard_timeout_ms), child.wait()).await {
        Ok(status) => {
            status.map_err(|e| Error::Fetch(format!("render: node wait failed: {e}")))?;
        }
        Err(_) => {
            let _ = child.kill().await;
            let _ = child.wait().await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(Error::Fetch(format!(
                "render hard timeout after {hard_timeout_ms}ms fetching {url}"
            )));
        }
    }

    let raw = stdout_task.await.unwrap_or_default();
    let err_raw = stderr_task.await.unwrap_or_default();
    let stdout_text = String::from_utf8_lossy(&raw).trim().to_string();
    let v: serde_json::Value = serde_json::from_str(&stdout_text).map_err(|e| {
        let stderr_text = String::from_utf8_lossy(&err_raw);
        tracing::debug!(stderr = %stderr_text.trim(), "render produced no usable JSON");
        Error::Fetch(format!("render returned invalid JSON: {e}"))
    })?;

    if v.get("ok").and_then(|x| x.as_bool()) != Some(true) {
        let code = v
            .pointer("/error/code")
            .and_then(|x| x.as_str())
            .unwrap_or("fetch_failed");
        let message = v
            .pointer("/error/message")
            .and_then(|x| x.as_str())
            .unwrap_or("render failed");
        return Err(match code {
            "not_configured" => Error::NotConfigured(message.to_string()),
            "invalid_params" => Error::InvalidUrl(message.to_string()),
            _ => Error::Fetch(message.to_string()),
        });
    }

    let html = v
        .get("html")
        .and_then(|x| x.as_str())
        .unwrap_or("")
        .to_string();
    // Avoid pathological empty results looking like success.
    if html.trim().is_empty() {
        return Err(Error::Fetch("render returned empty HTML".to_string()));
    }

    Ok(RenderedPage {
        final_url: v
            .get("final_url")
            .and_then(|x| x.as_str())
            .unwrap_or(url)
            .to_string(),
        status: v.get("status").and_then(|x| x.as_u64()).map(|n| n as u16),
        html,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disable_flag_reports_not_configured() {
        let _lock = crate::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("SCOUR_RENDER_DISABLE", "1");
        let err = render_html("https://example.com", 1_000).await.unwrap_err();
        std::env::remove_var("SCOUR_RENDER_DISABLE");
        assert!(matches!(err, Error::NotConfigured(_)));
    }

    // A noisy child that fills the stderr pipe must not deadlock the wait;
    // both pipes are drained concurrently, so the render still succeeds.
    #[cfg(unix)]
    #[tokio::test]
    async fn survives_a_stderr_flood_from_the_child() {
        use std::os::unix::fs::PermissionsExt;

        let script = std::env::temp_dir().join(format!("scour-noisy-node-{}.sh", std::process::id()));
        std::fs::write(
            &script,
            concat!(
                "#!/bin/sh\n",
                "head -c 1048576 /dev/zero | tr '\\0' 'x' 1>&2\n",
                r#"printf '{"ok":true,"final_url":"https://example.com/","status":200,"html":"<p>rendered</p>"}'"#,
                "\n",
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let page = {
            let _lock = crate::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            std::env::set_var("SCOUR_NODE", &script);
            std::env::remove_var("SCOUR_RENDER_DISABLE");
            let out = render_html("https://example.com/", 2_000).await;
            std::env::remove_var("SCOUR_NODE");
            out
        };
        let _ = std::fs::remove_file(&script);

        let page = page.unwrap();
        assert_eq!(page.html, "<p>rendered</p>");
        assert_eq!(page.status, Some(200));
    }
}
