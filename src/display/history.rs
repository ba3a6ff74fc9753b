//! Revision history display formatting

use std::fmt::Display;

use crate::services::AuditedEntityView;

/// Format the revision history of one entity, oldest first
pub fn format_revision_list<T: Display>(views: &[AuditedEntityView<T>]) -> String {
    if views.is_empty() {
        return "No revisions found.".to_string();
    }

    let author_width = views
        .iter()
        .map(|v| v.author().chars().count())
        .max()
        .unwrap_or(6)
        .max(6);

    let mut output = String::new();
    output.push_str(&format!(
        "{:>6}  {:<8}  {:<23}  {:<author_width$}  {}\n",
        "Rev",
        "Type",
        "Timestamp",
        "Author",
        "State",
        author_width = author_width,
    ));

    output.push_str(&format!(
        "{:->6}  {:-<8}  {:-<23}  {:-<author_width$}  {:-<20}\n",
        "",
        "",
        "",
        "",
        "",
        author_width = author_width,
    ));

    for view in views {
        let state = match (&view.entity, &view.changes) {
            (None, _) => "(deleted)".to_string(),
            (Some(_), Some(changes)) => changes.clone(),
            (Some(entity), None) => entity.to_string(),
        };

        output.push_str(&format!(
            "{:>6}  {:<8}  {:<23}  {:<author_width$}  {}\n",
            format!("r{}", view.revision_number),
            view.revision_type.to_string(),
            view.metadata.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            view.author(),
            state,
            author_width = author_width,
        ));
    }

    output
}

/// Format a single revision in detail
pub fn format_revision_details<T: Display>(view: &AuditedEntityView<T>) -> String {
    let mut output = String::new();

    output.push_str(&format!("Revision r{}\n", view.revision_number));
    output.push_str(&format!("  Key:        {}\n", view.key));
    output.push_str(&format!("  Type:       {}\n", view.revision_type));
    output.push_str(&format!("  Author:     {}\n", view.author()));
    output.push_str(&format!(
        "  Timestamp:  {}\n",
        view.metadata.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    match &view.entity {
        Some(entity) => output.push_str(&format!("  State:      {}\n", entity)),
        None => output.push_str("  State:      (deleted)\n"),
    }

    if let Some(changes) = &view.changes {
        output.push_str(&format!("  Changes:    {}\n", changes));
    }

    output
}
