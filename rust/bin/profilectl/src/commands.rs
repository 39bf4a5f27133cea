use std::io::Write;

use atlas_profile::{PropertyStore, PropertyValue, ValueKind};
use serde_json::json;

pub fn get(
    store: &PropertyStore,
    key: &str,
    fallback: Option<&str>,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut resolved = (key, store.value(key)?);
    if resolved.1.is_none() {
        if let Some(fb) = fallback {
            resolved = (fb, store.value(fb)?);
        }
    }
    // Declared properties report their declared default when unset.
    let (from, value) = match resolved {
        (from, Some(value)) => (Some(from), Some(value)),
        (_, None) => (None, store.definition(key).map(|d| d.default_value())),
    };

    if json {
        let updated_at = match from {
            Some(from) => store.updated_at(from)?,
            None => None,
        };
        writeln!(
            out,
            "{}",
            json!({
                "key": key,
                "resolved_from": from,
                "updated_at": updated_at,
                "kind": value.as_ref().map(|v| v.kind().as_str()),
                "value": value.as_ref().map(|v| v.to_string()),
            })
        )?;
        return Ok(());
    }
    match value {
        Some(value) if from.is_some() => writeln!(out, "{} = {}", key, value)?,
        Some(value) => writeln!(out, "{} = {} (default)", key, value)?,
        None => anyhow::bail!("'{}' has no value", key),
    }
    Ok(())
}

pub fn set(
    store: &PropertyStore,
    key: &str,
    input: &str,
    kind: Option<ValueKind>,
    persist: bool,
) -> anyhow::Result<()> {
    let kind = kind
        .or_else(|| store.definition(key).map(|d| d.kind))
        .unwrap_or(ValueKind::Text);
    let value = PropertyValue::parse(kind, input)?;
    store.set(key, value, persist)?;
    Ok(())
}

pub fn remove(store: &PropertyStore, key: &str) -> anyhow::Result<()> {
    store.remove(key)?;
    Ok(())
}

pub fn keys(store: &PropertyStore, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let keys = store.keys()?;
    if json {
        writeln!(out, "{}", json!(keys))?;
    } else {
        for key in keys {
            writeln!(out, "{}", key)?;
        }
    }
    Ok(())
}

pub fn props(store: &PropertyStore, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let mut rows = Vec::new();
    for def in store.definitions() {
        let stored = store.value(def.key)?;
        rows.push((def, stored));
    }

    if json {
        let items: Vec<_> = rows
            .iter()
            .map(|(def, stored)| {
                json!({
                    "key": def.key,
                    "kind": def.kind.as_str(),
                    "default": def.default_value().to_string(),
                    "value": stored.as_ref().map(|v| v.to_string()),
                    "summary": def.summary.trim(),
                })
            })
            .collect();
        writeln!(out, "{}", serde_json::Value::Array(items))?;
        return Ok(());
    }

    for (def, stored) in rows {
        match stored {
            Some(value) => writeln!(
                out,
                "{} ({}) = {}  [default {}]",
                def.key,
                def.kind,
                value,
                def.default_value()
            )?,
            None => writeln!(out, "{} ({}) = {}", def.key, def.kind, def.default_value())?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_profile::Color;

    fn run<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> anyhow::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn set_uses_declared_kind() {
        let store = PropertyStore::open_in_memory().unwrap();
        set(&store, "color_of_waiting", "darkRed", None, true).unwrap();
        assert_eq!(store.color_of_waiting(), Color::DARK_RED);

        set(&store, "max_qc_file", "12", None, true).unwrap();
        assert_eq!(store.max_qc_file(), 12);

        assert!(set(&store, "max_qc_file", "twelve", None, true).is_err());
    }

    #[test]
    fn set_undeclared_defaults_to_text() {
        let store = PropertyStore::open_in_memory().unwrap();
        set(&store, "note", "42", None, true).unwrap();
        assert_eq!(store.get("note", String::new()).unwrap(), "42");

        set(&store, "limit", "42", Some(ValueKind::Int), true).unwrap();
        assert_eq!(store.get("limit", 0i64).unwrap(), 42);
    }

    #[test]
    fn get_text_output() {
        let store = PropertyStore::open_in_memory().unwrap();
        store.set("global.x", "7", true).unwrap();

        let out = run(|o| get(&store, "module.x", Some("global.x"), false, o));
        assert_eq!(out, "module.x = 7\n");

        let out = run(|o| get(&store, "corporation", None, false, o));
        assert_eq!(out, "corporation = Corporation Name (default)\n");

        assert!(get(&store, "unknown", None, false, &mut Vec::new()).is_err());
    }

    #[test]
    fn get_json_output() {
        let store = PropertyStore::open_in_memory().unwrap();
        store.set("qc_method", 2i64, true).unwrap();

        let out = run(|o| get(&store, "qc_method", None, true, o));
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["kind"], "int");
        assert_eq!(v["value"], "2");
        assert_eq!(v["resolved_from"], "qc_method");
        assert!(v["updated_at"].as_str().is_some_and(|t| !t.is_empty()));

        store.set("transient", "x", false).unwrap();
        let out = run(|o| get(&store, "transient", None, true, o));
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["value"], "x");
        assert!(v["updated_at"].is_null());
    }

    #[test]
    fn keys_and_remove() {
        let store = PropertyStore::open_in_memory().unwrap();
        store.set("b", 1i64, true).unwrap();
        store.set("a", 1i64, true).unwrap();
        assert_eq!(run(|o| keys(&store, false, o)), "a\nb\n");

        remove(&store, "a").unwrap();
        assert_eq!(run(|o| keys(&store, true, o)), "[\"b\"]\n");
    }

    #[test]
    fn props_lists_every_declaration() {
        let store = PropertyStore::open_in_memory().unwrap();
        store.set_is_touch_screen(true, true).unwrap();

        let out = run(|o| props(&store, false, o));
        assert_eq!(out.lines().count(), atlas_profile::PROPERTIES.len());
        assert!(out.contains("is_touch_screen (bool) = true  [default false]"));
        assert!(out.contains("color_of_null_result (color) = #ff0000"));
    }
}
