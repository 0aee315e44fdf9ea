// SPDX-License-Identifier: CC0-1.0

//! SVG rendering of token JSON.
//!
//! The rendered bytes are what gets content-hashed and stored, so every
//! byte here is consensus: key order is fixed (`p`, `op`, `tick`, then the
//! operation's own fields), the JSON uses one-space indentation with
//! `", "`/`": "` separators, numbers render as quoted strings and Unicode
//! is emitted raw.

use serde_json::{Map, Value};
use types::tick::decode_unicode_escapes;

use crate::store::StateStore;

const PRIORITY_KEYS: [&str; 3] = ["p", "op", "tick"];

fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_owned(),
        Some(Value::String(s)) =>
            serde_json::to_string(s).unwrap_or_else(|_| "null".to_owned()),
        // Numbers carry their literal over, quoted.
        Some(Value::Number(n)) => format!("\"{}\"", n),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => serde_json::to_string(other).unwrap_or_else(|_| "null".to_owned()),
    }
}

fn pretty_json(pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return "{}".to_owned();
    }
    let mut out = String::from("{");
    for (i, (key, rendered)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str("\n \"");
        out.push_str(key);
        out.push_str("\": ");
        out.push_str(rendered);
    }
    out.push_str("\n}");
    out
}

fn display_tick(map: &Map<String, Value>) -> String {
    let tick = map.get("tick").and_then(Value::as_str).unwrap_or("");
    let tick = if tick.contains('\\') { decode_unicode_escapes(tick) } else { tick.to_owned() };
    tick.to_uppercase()
}

fn uppercased(map: &Map<String, Value>, key: &str) -> String {
    map.get(key).and_then(Value::as_str).unwrap_or("").to_uppercase()
}

fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_owned())
}

fn token_pairs(map: &Map<String, Value>) -> Vec<(String, String)> {
    let op = uppercased(map, "op");
    let amount_keys: &[&str] = match op.as_str() {
        "DEPLOY" => &["max", "lim"],
        "MINT" | "TRANSFER" => &["amt"],
        _ => {
            log::error!("no canonical fields for op {:?}, rendering an empty token", op);
            return Vec::new();
        }
    };
    let mut pairs = vec![
        ("p".to_owned(), quoted(&uppercased(map, "p"))),
        ("op".to_owned(), quoted(&op)),
        ("tick".to_owned(), quoted(&display_tick(map))),
    ];
    for key in amount_keys {
        pairs.push(((*key).to_owned(), render_value(map.get(*key))));
    }
    pairs
}

fn wrap_svg(json: &str, background: Option<&crate::store::SrcBackground>) -> Vec<u8> {
    let svg = match background {
        Some(bg) => format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 420 420"><foreignObject font-size="{}" width="100%" height="100%"><p xmlns="http://www.w3.org/1999/xhtml" style="background-image: url(data:{});color:{};padding:20px;margin:0px;width:1000px;height:1000px;"><pre>{}</pre></p></foreignObject></svg>"#,
            bg.font_size, bg.base64, bg.text_color, json
        ),
        None => format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 420 420"><foreignObject font-size="30px" width="100%" height="100%"><p xmlns="http://www.w3.org/1999/xhtml" style="background: rgb(149,56,182); background: linear-gradient(138deg, rgba(149,56,182,1) 23%, rgba(0,56,255,1) 100%);padding:20px;margin:0px;width:1000px;height:1000px;"><pre>{}</pre></p></foreignObject></svg>"#,
            json
        ),
    };
    svg.into_bytes()
}

/// Renders an SRC-20 token mapping as the stamp's SVG artifact, using the
/// tick's background art when the store has one.
pub fn build_src20_svg<S: StateStore + ?Sized>(store: &S, map: &Map<String, Value>) -> Vec<u8> {
    let background = map
        .get("tick")
        .and_then(Value::as_str)
        .and_then(|tick| store.background(tick));
    wrap_svg(&pretty_json(&token_pairs(map)), background.as_ref())
}

/// Renders an SRC-721 mapping as SVG: priority keys first, remaining keys
/// in insertion order, always on the gradient background.
pub fn build_src721_svg(map: &Map<String, Value>) -> Vec<u8> {
    let mut pairs: Vec<(String, String)> = PRIORITY_KEYS
        .iter()
        .filter(|key| map.contains_key(**key))
        .map(|key| ((*key).to_owned(), render_value(map.get(*key))))
        .collect();
    for (key, value) in map {
        if !PRIORITY_KEYS.contains(&key.as_str()) {
            pairs.push((key.clone(), render_value(Some(value))));
        }
    }
    wrap_svg(&pretty_json(&pairs), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SrcBackground};

    fn map(json: &str) -> Map<String, Value> {
        match serde_json::from_str(json).unwrap() {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn deploy_renders_fixed_key_order() {
        let store = MemoryStore::new();
        let svg = build_src20_svg(
            &store,
            &map(r#"{"tick":"dogs","lim":"100","op":"deploy","max":1000,"p":"src-20"}"#),
        );
        let svg = String::from_utf8(svg).unwrap();
        let expected = "<pre>{\n \"p\": \"SRC-20\",\n \"op\": \"DEPLOY\",\n \"tick\": \"DOGS\",\n \"max\": \"1000\",\n \"lim\": \"100\"\n}</pre>";
        assert!(svg.contains(expected), "{}", svg);
        assert!(svg.contains(r#"viewBox="0 0 420 420""#));
        assert!(svg.contains("font-size=\"30px\""));
    }

    #[test]
    fn mint_renders_amt_only() {
        let store = MemoryStore::new();
        let svg = build_src20_svg(
            &store,
            &map(r#"{"p":"src-20","op":"mint","tick":"dogs","amt":"60"}"#),
        );
        let svg = String::from_utf8(svg).unwrap();
        assert!(svg.contains("\"amt\": \"60\""));
        assert!(!svg.contains("\"max\""));
    }

    #[test]
    fn number_literals_are_preserved() {
        let store = MemoryStore::new();
        let svg = build_src20_svg(
            &store,
            &map(r#"{"p":"src-20","op":"mint","tick":"dogs","amt":100.50}"#),
        );
        let svg = String::from_utf8(svg).unwrap();
        assert!(svg.contains("\"amt\": \"100.50\""), "{}", svg);
    }

    #[test]
    fn background_art_changes_the_template() {
        let mut store = MemoryStore::new();
        store.set_background(
            "dogs",
            SrcBackground {
                base64: "image/png;base64,QUJD".to_owned(),
                font_size: "24px".to_owned(),
                text_color: "#fff".to_owned(),
            },
        );
        let svg = build_src20_svg(
            &store,
            &map(r#"{"p":"src-20","op":"mint","tick":"dogs","amt":"1"}"#),
        );
        let svg = String::from_utf8(svg).unwrap();
        assert!(svg.contains("background-image: url(data:image/png;base64,QUJD)"));
        assert!(svg.contains("font-size=\"24px\""));
    }

    #[test]
    fn identical_input_renders_identical_bytes() {
        let store = MemoryStore::new();
        let m = map(r#"{"p":"src-20","op":"transfer","tick":"dogs","amt":"40"}"#);
        assert_eq!(build_src20_svg(&store, &m), build_src20_svg(&store, &m));
    }

    #[test]
    fn unicode_ticks_render_unescaped() {
        let store = MemoryStore::new();
        let svg = build_src20_svg(
            &store,
            &map("{\"p\":\"src-20\",\"op\":\"mint\",\"tick\":\"d\\\\xf6g\",\"amt\":\"1\"}"),
        );
        let svg = String::from_utf8(svg).unwrap();
        assert!(svg.contains("\"tick\": \"D\u{d6}G\""), "{}", svg);
    }
}
