//! Page-context JavaScript used by script-based drivers.
//!
//! Element operations run as self-contained expressions so they work on any
//! CDP connection and inside same-origin frames, where per-node handles would
//! have to be re-resolved after every navigation.

use serde_json::Value;

use super::Locator;

/// Wrap a function body so it runs with `arguments` bound to `args`.
pub fn call_script(body: &str, args: &[Value]) -> String {
    let args = Value::Array(args.to_vec());
    format!("(function() {{\n{}\n}}).apply(window, {})", body, args)
}

/// Serialize a string as a JavaScript string literal.
fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

fn lookup_expr(locator: &Locator) -> String {
    match locator {
        Locator::XPath(xpath) => format!(
            "doc.evaluate({}, doc, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            js_string(xpath)
        ),
        Locator::Name(name) => format!("(doc.getElementsByName({})[0] || null)", js_string(name)),
        Locator::Css(css) => format!("doc.querySelector({})", js_string(css)),
    }
}

fn frame_lookup(frame: &str) -> String {
    let frame = js_string(frame);
    format!(
        "(document.getElementById({f}) || document.getElementsByName({f})[0] || null)",
        f = frame
    )
}

/// Build an expression that binds `el` to the located element and runs `body`.
fn with_element(frame: Option<&str>, locator: &Locator, body: &str) -> String {
    let doc = match frame {
        Some(frame) => format!(
            "var frame = {};\n  var doc = frame ? frame.contentDocument : null;\n  if (!doc) {{ return {{ found: false }}; }}",
            frame_lookup(frame)
        ),
        None => "var doc = document;".to_string(),
    };
    format!(
        "(function() {{\n  {}\n  var el = {};\n  {}\n}})()",
        doc,
        lookup_expr(locator),
        body
    )
}

/// `{found}`: whether the element exists.
pub fn presence(frame: Option<&str>, locator: &Locator) -> String {
    with_element(frame, locator, "return { found: !!el };")
}

/// `{found, value}`: property `name`, or the attribute when no property exists.
pub fn attribute(frame: Option<&str>, locator: &Locator, name: &str) -> String {
    let body = format!(
        "if (!el) {{ return {{ found: false }}; }}\n  \
         var v = el[{n}];\n  \
         if (v === undefined || v === null || typeof v === 'object' || typeof v === 'function') {{ v = el.getAttribute({n}); }}\n  \
         return {{ found: true, value: v === null ? null : String(v) }};",
        n = js_string(name)
    );
    with_element(frame, locator, &body)
}

/// `{found, value}`: rendered text of the element.
pub fn text(frame: Option<&str>, locator: &Locator) -> String {
    with_element(
        frame,
        locator,
        "if (!el) { return { found: false }; }\n  \
         return { found: true, value: el.innerText !== undefined ? el.innerText : el.textContent };",
    )
}

/// `{found}`: clicks the element when present.
pub fn click(frame: Option<&str>, locator: &Locator) -> String {
    with_element(
        frame,
        locator,
        "if (!el) { return { found: false }; }\n  el.click();\n  return { found: true };",
    )
}

/// `{found}`: appends `text` to the element's value and fires input events.
pub fn send_keys(frame: Option<&str>, locator: &Locator, text: &str) -> String {
    let body = format!(
        "if (!el) {{ return {{ found: false }}; }}\n  \
         el.focus();\n  \
         el.value = (el.value || '') + {t};\n  \
         el.dispatchEvent(new Event('input', {{ bubbles: true }}));\n  \
         el.dispatchEvent(new Event('change', {{ bubbles: true }}));\n  \
         return {{ found: true }};",
        t = js_string(text)
    );
    with_element(frame, locator, &body)
}

/// Boolean: whether a frame element with this id or name exists.
pub fn frame_exists(frame: &str) -> String {
    format!("!!{}", frame_lookup(frame))
}

/// Whether an element-script result reported a located element.
pub fn found(result: &Value) -> bool {
    result.get("found").and_then(Value::as_bool).unwrap_or(false)
}

/// The `value` field of an element-script result.
pub fn value(result: &Value) -> Option<String> {
    result
        .get("value")
        .and_then(Value::as_str)
        .map(str::to_string)
}
