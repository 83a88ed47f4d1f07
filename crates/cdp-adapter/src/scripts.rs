//! Page-side scripts evaluated by [`crate::CdpDocument`].
//!
//! Elements are tagged with a `data-promptsmith-node` attribute the first time a query returns
//! them; later calls look the element up by that tag. Every argument is embedded as a JSON
//! literal.

use serde_json::Value;

pub const NODE_ATTRIBUTE: &str = "data-promptsmith-node";

fn literal(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

const TAG_FN: &str = r#"const tag = (el) => {
    if (!el.hasAttribute('data-promptsmith-node')) {
      window.__promptsmithSeq = (window.__promptsmithSeq || 0) + 1;
      el.setAttribute('data-promptsmith-node', 'n' + window.__promptsmithSeq);
    }
    return el.getAttribute('data-promptsmith-node');
  };"#;

/// Resolves to the first match's tag, or `null`.
pub fn query(selector: &str) -> String {
    format!(
        r#"(() => {{
  {TAG_FN}
  const el = document.querySelector({selector});
  return el ? tag(el) : null;
}})()"#,
        selector = literal(selector)
    )
}

/// Resolves to the tags of every match in document order.
pub fn query_all(selector: &str) -> String {
    format!(
        r#"(() => {{
  {TAG_FN}
  return Array.from(document.querySelectorAll({selector})).map(tag);
}})()"#,
        selector = literal(selector)
    )
}

fn with_node(node: &str, body: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector('[{NODE_ATTRIBUTE}=' + JSON.stringify({node}) + ']');
  if (!el) return null;
  {body}
}})()"#,
        node = literal(node)
    )
}

/// Resolves to a `NodeInfo`-shaped object, or `null` when the node is gone.
pub fn describe(node: &str) -> String {
    with_node(
        node,
        r#"const style = window.getComputedStyle(el);
  const visible = el.offsetParent !== null && style.visibility !== 'hidden' && style.display !== 'none';
  return {
    tag: el.tagName.toLowerCase(),
    visible,
    enabled: !el.disabled && el.getAttribute('aria-disabled') !== 'true',
    editable: el.isContentEditable || el.tagName === 'TEXTAREA' || el.tagName === 'INPUT',
    text: el.innerText || el.textContent || '',
    src: typeof el.src === 'string' && el.src ? el.src : null,
    width: Math.round(typeof el.width === 'number' ? el.width : el.offsetWidth) || 0,
    height: Math.round(typeof el.height === 'number' ? el.height : el.offsetHeight) || 0,
  };"#,
    )
}

/// Writes through the prototype value setter so framework-managed inputs observe the change.
pub fn set_native_value(node: &str, value: &str) -> String {
    with_node(
        node,
        &format!(
            r#"const value = {value};
  el.focus();
  if (el.isContentEditable) {{
    el.innerText = value;
  }} else {{
    const proto = el.tagName === 'TEXTAREA' ? window.HTMLTextAreaElement.prototype : window.HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
    setter.call(el, value);
  }}
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;"#,
            value = literal(value)
        ),
    )
}

pub fn click(node: &str) -> String {
    with_node(node, "el.click();\n  return true;")
}

pub fn press_enter(node: &str) -> String {
    with_node(
        node,
        r#"el.focus();
  el.dispatchEvent(new KeyboardEvent('keydown', { key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true }));
  return true;"#,
    )
}
