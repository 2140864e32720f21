//! Index statistics and system status panels.
//!
//! `dq admin stats` and `dq health` print a short key/value summary of what
//! the backend reports. Known counters get fixed labels; anything else the
//! backend adds to the stats object is listed after them, sorted by key.

use crate::models::{Health, IndexStats};
use crate::render::escape_html;

/// Ordered `(label, value)` rows for the stats panel.
pub fn stats_rows(stats: &IndexStats) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    if let Some(n) = stats.total_documents {
        rows.push(("Indexed documents".to_string(), n.to_string()));
    }
    if let Some(n) = stats.uploaded_files {
        rows.push(("Uploaded files".to_string(), n.to_string()));
    }
    if let Some(loaded) = stats.index_loaded {
        rows.push(("Index loaded".to_string(), yes_no(loaded).to_string()));
    }
    if let Some(ready) = stats.query_engine_ready {
        rows.push(("Query engine".to_string(), ready_label(ready).to_string()));
    }

    let mut extra: Vec<_> = stats.extra.iter().collect();
    extra.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in extra {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rows.push((key.clone(), value));
    }
    rows
}

pub fn stats_text(stats: &IndexStats) -> String {
    let rows = stats_rows(stats);
    let mut out = String::from("Index Statistics\n================\n\n");
    if rows.is_empty() {
        out.push_str("  (no statistics reported)\n");
        return out;
    }
    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in rows {
        out.push_str(&format!("  {:<width$}  {}\n", format!("{key}:"), value, width = width + 1));
    }
    out
}

pub fn stats_html(stats: &IndexStats) -> String {
    let mut html = String::from("<dl class=\"stats\">");
    for (key, value) in stats_rows(stats) {
        html.push_str(&format!(
            "<dt>{}</dt><dd>{}</dd>",
            escape_html(&key),
            escape_html(&value)
        ));
    }
    html.push_str("</dl>");
    html
}

/// Status and version are shown exactly as the backend sent them.
pub fn health_text(health: &Health) -> String {
    let mut out = format!("  Status:    {}\n  Version:   {}\n", health.status, health.version);
    if let Some(n) = health.documents {
        out.push_str(&format!("  Documents: {}\n", n));
    }
    out
}

pub fn health_html(health: &Health) -> String {
    let mut html = format!(
        "<div class=\"system-status\"><p>Status: <strong>{}</strong></p><p>Version: {}</p>",
        escape_html(&health.status),
        escape_html(&health.version)
    );
    if let Some(n) = health.documents {
        html.push_str(&format!("<p>Documents: {}</p>", n));
    }
    html.push_str("</div>");
    html
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn ready_label(value: bool) -> &'static str {
    if value {
        "ready"
    } else {
        "not ready"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> IndexStats {
        serde_json::from_value(serde_json::json!({
            "total_documents": 12,
            "index_loaded": true,
            "query_engine_ready": false,
            "uploaded_files": 3,
            "vector_store_path": "./data/vector_store",
            "chunk_size": 1024
        }))
        .unwrap()
    }

    #[test]
    fn rows_list_known_counters_then_extras_sorted() {
        let rows = stats_rows(&stats());
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "Indexed documents",
                "Uploaded files",
                "Index loaded",
                "Query engine",
                "chunk_size",
                "vector_store_path"
            ]
        );
        assert_eq!(rows[3].1, "not ready");
        assert_eq!(rows[5].1, "./data/vector_store");
    }

    #[test]
    fn text_panel_aligns_values() {
        let text = stats_text(&stats());
        assert!(text.starts_with("Index Statistics"));
        assert!(text.contains("Indexed documents:  12"));
        assert!(stats_text(&IndexStats::default()).contains("no statistics"));
    }

    #[test]
    fn health_is_verbatim_and_escaped_in_html() {
        let health = Health {
            status: "healthy".into(),
            version: "<1.0.0>".into(),
            documents: Some(4),
        };
        let text = health_text(&health);
        assert!(text.contains("Status:    healthy"));
        assert!(text.contains("Version:   <1.0.0>"));
        assert!(text.contains("Documents: 4"));
        assert!(health_html(&health).contains("&lt;1.0.0&gt;"));
    }
}
