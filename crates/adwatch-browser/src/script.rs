//! JavaScript snippets evaluated in the page.
//!
//! Every snippet is a self-invoking expression that returns a JSON-serializable
//! value; `undefined` never comes back over CDP by value. Values from Rust are
//! embedded as JSON literals, never spliced in as raw text.

use crate::error::{BrowserError, Result};
use adwatch_probe::BaitElement;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Global used to keep hard-lock state between engage and release.
pub const LOCK_STATE_GLOBAL: &str = "__adwatchLock";

/// Global the modal buttons write the visitor's choice to.
pub const CHOICE_GLOBAL: &str = "__adwatchChoice";

/// Evaluate `expression` and decode its value.
pub async fn evaluate<T: DeserializeOwned>(page: &Page, expression: String) -> Result<T> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(BrowserError::ScriptError)?;

    let result = page.evaluate_expression(params).await?;
    result
        .into_value()
        .map_err(|e| BrowserError::ScriptError(e.to_string()))
}

fn literal<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

pub fn is_available() -> String {
    "(() => document.readyState !== 'loading' && !!document.body)()".to_string()
}

pub fn insert(element: &BaitElement) -> String {
    format!(
        r"(() => {{
  const build = (spec) => {{
    const el = document.createElement(spec.tag);
    el.id = spec.id;
    if (spec.classes.length) el.className = spec.classes.join(' ');
    for (const [name, value] of spec.attributes) el.setAttribute(name, value);
    if (spec.style) el.style.cssText = spec.style;
    if (spec.text) el.textContent = spec.text;
    for (const child of spec.children) el.appendChild(build(child));
    return el;
  }};
  document.body.appendChild(build({spec}));
  return true;
}})()",
        spec = literal(element)
    )
}

pub fn measure(id: &str) -> String {
    format!(
        r"(() => {{
  const el = document.getElementById({id});
  if (!el) return null;
  const style = window.getComputedStyle(el);
  return {{
    boxWidth: el.offsetWidth,
    boxHeight: el.offsetHeight,
    display: style.display,
    visibility: style.visibility,
    computedHeight: parseFloat(style.height) || 0,
    childCount: el.children.length,
    hasContent: el.innerHTML.trim().length > 0,
  }};
}})()",
        id = literal(id)
    )
}

pub fn remove(id: &str) -> String {
    format!(
        "(() => {{ const el = document.getElementById({id}); if (el) el.remove(); return true; }})()",
        id = literal(id)
    )
}

/// Resolves to `"loaded"` or `"failed"`; stays pending if the request is
/// dropped, in which case the element keeps its id so [`remove`] can find it.
pub fn load_script(id: &str, url: &str) -> String {
    format!(
        r"new Promise((resolve) => {{
  const script = document.createElement('script');
  script.id = {id};
  script.async = true;
  script.src = {url};
  script.onload = () => {{ script.remove(); resolve('loaded'); }};
  script.onerror = () => {{ script.remove(); resolve('failed'); }};
  document.head.appendChild(script);
}})",
        id = literal(id),
        url = literal(url)
    )
}

pub fn request_ad_fill(id: &str) -> String {
    format!(
        r"(() => {{
  if (!document.getElementById({id})) return false;
  (window.adsbygoogle = window.adsbygoogle || []).push({{}});
  return true;
}})()",
        id = literal(id)
    )
}

/// Storage access wrapped so a `SecurityError` comes back as data.
pub fn storage(area: &str, op: &str, key: &str, value: Option<&str>) -> String {
    format!(
        r"(() => {{
  try {{
    const store = window[{area}];
    const op = {op};
    if (op === 'get') return {{ ok: true, value: store.getItem({key}) }};
    if (op === 'set') {{ store.setItem({key}, {value}); return {{ ok: true, value: null }}; }}
    store.removeItem({key});
    return {{ ok: true, value: null }};
  }} catch (e) {{
    return {{ ok: false, error: String(e) }};
  }}
}})()",
        area = literal(area),
        op = literal(op),
        key = literal(key),
        value = literal(&value)
    )
}

pub fn show_modal(container_id: &str) -> String {
    format!(
        r"(() => {{
  if (document.getElementById({id})) return true;
  const modal = document.createElement('div');
  modal.id = {id};
  modal.setAttribute('role', 'dialog');
  modal.style.cssText = 'position:fixed;inset:0;z-index:2147483647;display:flex;align-items:center;justify-content:center;background:rgba(0,0,0,.6);font-family:sans-serif';
  modal.innerHTML = '<div style=\'background:#fff;padding:24px;max-width:420px;border-radius:8px\'>'
    + '<h2>Ad blocker detected</h2>'
    + '<p>This site is supported by advertising. Please disable your ad blocker and try again.</p>'
    + '<button data-choice=\'disabled\'>I disabled it</button> '
    + '<button data-choice=\'continued\'>Continue anyway</button></div>';
  modal.addEventListener('click', (e) => {{
    const choice = e.target && e.target.getAttribute && e.target.getAttribute('data-choice');
    if (choice) window.{choice_global} = choice;
  }});
  document.body.appendChild(modal);
  return true;
}})()",
        id = literal(container_id),
        choice_global = CHOICE_GLOBAL
    )
}

pub fn hide_modal(container_id: &str) -> String {
    remove(container_id)
}

/// Returns the pending modal choice and clears it.
pub fn take_choice() -> String {
    format!(
        "(() => {{ const c = window.{CHOICE_GLOBAL} || null; window.{CHOICE_GLOBAL} = null; return c; }})()"
    )
}

pub fn navigate(url: &str) -> String {
    format!(
        "(() => {{ window.location.assign({url}); return true; }})()",
        url = literal(url)
    )
}

/// Hides every body child except the container, swallows dev-tool shortcuts
/// and the context menu, and silences the console. Idempotent.
pub fn engage_lock(container_id: &str) -> String {
    format!(
        r"(() => {{
  if (window.{lock}) return true;
  const id = {id};
  const style = document.createElement('style');
  style.textContent = 'body > *:not(#' + CSS.escape(id) + ') {{ display: none !important; }}';
  document.head.appendChild(style);
  const onKey = (e) => {{
    const mod = e.ctrlKey || e.metaKey;
    const key = (e.key || '').toUpperCase();
    if (e.key === 'F12' || (mod && e.shiftKey && ['I', 'J', 'C'].includes(key)) || (mod && key === 'U')) {{
      e.preventDefault();
      e.stopPropagation();
    }}
  }};
  const onMenu = (e) => e.preventDefault();
  document.addEventListener('keydown', onKey, true);
  document.addEventListener('contextmenu', onMenu, true);
  const saved = {{}};
  for (const name of ['log', 'info', 'warn', 'error', 'debug', 'table', 'dir']) {{
    saved[name] = console[name];
    console[name] = () => {{}};
  }}
  window.{lock} = {{ style, onKey, onMenu, saved }};
  return true;
}})()",
        lock = LOCK_STATE_GLOBAL,
        id = literal(container_id)
    )
}

/// Undoes [`engage_lock`]. Safe to call when no lock is engaged.
pub fn release_lock() -> String {
    format!(
        r"(() => {{
  const lock = window.{lock};
  if (!lock) return false;
  lock.style.remove();
  document.removeEventListener('keydown', lock.onKey, true);
  document.removeEventListener('contextmenu', lock.onMenu, true);
  for (const [name, fn] of Object.entries(lock.saved)) console[name] = fn;
  delete window.{lock};
  return true;
}})()",
        lock = LOCK_STATE_GLOBAL
    )
}
