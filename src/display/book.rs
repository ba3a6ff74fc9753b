//! Book display formatting
//!
//! Formats books for terminal output in table and detail views.

use crate::models::Book;

/// Format a list of books as a table
pub fn format_book_list(books: &[Book]) -> String {
    if books.is_empty() {
        return "No books found.".to_string();
    }

    let title_width = books
        .iter()
        .map(|b| b.title.chars().count())
        .max()
        .unwrap_or(5)
        .max(5);

    let author_width = books
        .iter()
        .map(|b| b.author.chars().count())
        .max()
        .unwrap_or(6)
        .max(6);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<title_width$}  {:<author_width$}  {:>7}  {}\n",
        "Title",
        "Author",
        "Version",
        "ID",
        title_width = title_width,
        author_width = author_width,
    ));

    output.push_str(&format!(
        "{:-<title_width$}  {:-<author_width$}  {:->7}  {:-<41}\n",
        "",
        "",
        "",
        "",
        title_width = title_width,
        author_width = author_width,
    ));

    for book in books {
        let id = book.id.map(|id| id.to_string()).unwrap_or_default();
        output.push_str(&format!(
            "{:<title_width$}  {:<author_width$}  {:>7}  {}\n",
            book.title,
            book.author,
            book.version,
            id,
            title_width = title_width,
            author_width = author_width,
        ));
    }

    output.push_str(&format!("\n{} book(s)\n", books.len()));

    output
}

/// Format a single book's details
pub fn format_book_details(book: &Book) -> String {
    let mut output = String::new();

    output.push_str(&format!("Book: {}\n", book.title));
    output.push_str(&format!("  Author:         {}\n", book.author));
    if let Some(id) = book.id {
        output.push_str(&format!("  ID:             {}\n", id));
    }
    output.push_str(&format!("  Version:        {}\n", book.version));

    if let (Some(by), Some(at)) = (&book.created_by, book.created_date) {
        output.push_str(&format!(
            "  Created:        {} by {}\n",
            at.format("%Y-%m-%d %H:%M:%S UTC"),
            by
        ));
    }

    if let (Some(by), Some(at)) = (&book.last_modified_by, book.last_modified_date) {
        output.push_str(&format!(
            "  Last modified:  {} by {}\n",
            at.format("%Y-%m-%d %H:%M:%S UTC"),
            by
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookId;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_empty_list() {
        assert_eq!(format_book_list(&[]), "No books found.");
    }

    #[test]
    fn test_list_columns() {
        let mut book = Book::new("Rudyard Kipling", "Jungle Book");
        book.id = Some(BookId::new());
        book.version = 3;

        let output = format_book_list(&[book.clone(), Book::new("Joseph Conrad", "Nostromo")]);
        let lines: Vec<&str> = output.lines().collect();

        assert!(lines[0].starts_with("Title"));
        assert!(lines[2].contains("Rudyard Kipling"));
        assert!(lines[2].contains(&book.id.unwrap().to_string()));
        assert!(lines[2].contains("      3"));
        assert!(output.ends_with("2 book(s)\n"));
    }

    #[test]
    fn test_details_include_audit_columns() {
        let mut book = Book::new("Rudyard Kipling", "If");
        book.created_by = Some("wade.wilson".into());
        book.created_date = Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());

        let output = format_book_details(&book);
        assert!(output.starts_with("Book: If\n"));
        assert!(output.contains("Created:        2024-03-01 09:30:00 UTC by wade.wilson"));
        assert!(!output.contains("Last modified"));
    }
}
