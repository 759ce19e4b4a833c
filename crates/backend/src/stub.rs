//! Proxy tool source rendering.
//!
//! The backend executes registered tools server-side, so every proxy tool
//! needs a body. The body never does real work: it packages its arguments
//! into a `proxy_tool_call` envelope that the agent hands back to the
//! gateway, which forwards the call to the caller.

use agentbridge_core::tool::{ParamKind, ProxyToolStub, StubParameter};

/// Render the Python source registered for a proxy tool.
pub fn render_source(stub: &ProxyToolStub) -> String {
    let signature = stub
        .parameters
        .iter()
        .filter(|p| is_identifier(&p.name))
        .map(render_parameter)
        .collect::<Vec<_>>()
        .join(", ");

    let required = stub
        .required
        .iter()
        .filter(|name| is_identifier(name))
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"def {def_name}({signature}):
    """{doc}"""
    import inspect
    import json
    import uuid

    frame = inspect.currentframe()
    names, _, _, values = inspect.getargvalues(frame)
    required = [{required}]
    arguments = {{
        k: values[k]
        for k in names
        if values[k] not in (None, '', 0, [], {{}}) or k in required
    }}

    return {{
        "type": "proxy_tool_call",
        "tool_call_id": "call_" + uuid.uuid4().hex[:8],
        "function": {{
            "name": {caller_name},
            "arguments": json.dumps(arguments),
        }},
    }}
"#,
        def_name = stub.registered_name,
        doc = escape_docstring(&stub.description),
        caller_name = string_literal(&stub.caller_name),
    )
}

/// A JSON string literal, which Python also parses as a `str`.
fn string_literal(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "''".into())
}

fn render_parameter(param: &StubParameter) -> String {
    let (annotation, default) = match param.kind {
        ParamKind::String => ("str", "''"),
        ParamKind::Number => ("float", "0"),
        ParamKind::Boolean => ("bool", "False"),
        ParamKind::Array => ("list", "[]"),
        ParamKind::Object => ("dict", "{}"),
    };
    format!("{}: {annotation} = {default}", param.name)
}

/// Parameter names become Python identifiers; anything else is skipped.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn escape_docstring(text: &str) -> String {
    text.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
}
