//! Book service
//!
//! Provides business logic for book management on top of the audited
//! entity store.

use crate::error::{HistoryError, HistoryResult};
use crate::models::{Book, BookId};
use crate::storage::{Storage, UnitOfWork};

/// Service for book management
pub struct BookService<'a> {
    storage: &'a Storage,
    identity: Option<&'a str>,
}

impl<'a> BookService<'a> {
    /// Create a new book service
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            identity: None,
        }
    }

    /// Attribute every change made through this service to `identity`
    pub fn acting_as(mut self, identity: &'a str) -> Self {
        self.identity = Some(identity);
        self
    }

    fn begin(&self) -> HistoryResult<UnitOfWork<'a>> {
        match self.identity {
            Some(identity) => self.storage.begin_as(identity),
            None => self.storage.begin(),
        }
    }

    /// Create a new book
    pub fn create(&self, author: &str, title: &str) -> HistoryResult<Book> {
        self.save(Book::new(author.trim(), title.trim()))
    }

    /// Save a book, inserting it if it has no id yet
    pub fn save(&self, book: Book) -> HistoryResult<Book> {
        let mut unit = self.begin()?;
        let saved = unit.save(book)?;
        unit.commit()?;
        Ok(saved)
    }

    /// Update a book's author and/or title
    ///
    /// With `expected_version` the update is rejected unless the stored book
    /// is still at that version.
    pub fn update(
        &self,
        id: BookId,
        author: Option<&str>,
        title: Option<&str>,
        expected_version: Option<u64>,
    ) -> HistoryResult<Book> {
        let mut book = self
            .get(id)?
            .ok_or_else(|| HistoryError::book_not_found(id.to_string()))?;

        if let Some(expected) = expected_version {
            book.version = expected;
        }

        if let Some(author) = author {
            book.author = author.trim().to_string();
        }

        if let Some(title) = title {
            book.title = title.trim().to_string();
        }

        self.save(book)
    }

    /// Delete a book, keeping its history
    pub fn delete(&self, id: BookId) -> HistoryResult<()> {
        let mut unit = self.begin()?;
        unit.delete::<Book>(id)?;
        unit.commit()?;
        Ok(())
    }

    /// Get a book by ID
    pub fn get(&self, id: BookId) -> HistoryResult<Option<Book>> {
        self.storage.find_by_key(id)
    }

    /// Find a book by ID or exact title
    pub fn find(&self, identifier: &str) -> HistoryResult<Option<Book>> {
        if let Ok(id) = identifier.parse::<BookId>() {
            return self.get(id);
        }

        let identifier = identifier.trim();
        self.storage
            .find_all_by_field::<Book>("title", identifier)?
            .next()
            .transpose()
    }

    /// List all books, ordered by title
    pub fn list(&self) -> HistoryResult<Vec<Book>> {
        let mut books = self.storage.find_all::<Book>()?;
        books.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        Ok(books)
    }

    /// All books written by `author`, ordered by title
    pub fn find_all_by_author(&self, author: &str) -> HistoryResult<Vec<Book>> {
        let mut books = self
            .storage
            .find_all_by_field::<Book>("author", author.trim())?
            .collect::<HistoryResult<Vec<_>>>()?;
        books.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        Ok(books)
    }

    /// Count books
    pub fn count(&self) -> HistoryResult<usize> {
        self.storage.count::<Book>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::create_test_storage;

    #[test]
    fn test_create_book() {
        let (_temp_dir, storage) = create_test_storage();
        let service = BookService::new(&storage);

        let book = service.create("  Rudyard Kipling ", "Jungle Book").unwrap();
        assert_eq!(book.author, "Rudyard Kipling");
        assert_eq!(book.version, 1);
        assert!(book.is_persisted());
        assert_eq!(service.count().unwrap(), 1);
    }

    #[test]
    fn test_create_blank_author() {
        let (_temp_dir, storage) = create_test_storage();
        let service = BookService::new(&storage);

        let err = service.create("", "Jungle Book").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_update_book() {
        let (_temp_dir, storage) = create_test_storage();
        let service = BookService::new(&storage);

        let book = service.create("Rudyard Kipling", "Jungle Book").unwrap();
        let id = book.id.unwrap();

        let updated = service.update(id, None, Some("If"), None).unwrap();
        assert_eq!(updated.title, "If");
        assert_eq!(updated.author, "Rudyard Kipling");
        assert_eq!(updated.version, 2);
        assert_eq!(updated.created_date, book.created_date);
    }

    #[test]
    fn test_update_with_stale_expected_version() {
        let (_temp_dir, storage) = create_test_storage();
        let service = BookService::new(&storage);

        let book = service.create("Rudyard Kipling", "Jungle Book").unwrap();
        let id = book.id.unwrap();
        service.update(id, None, Some("If"), Some(1)).unwrap();

        let err = service.update(id, None, Some("Kim"), Some(1)).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(service.get(id).unwrap().unwrap().title, "If");
    }

    #[test]
    fn test_update_missing_book() {
        let (_temp_dir, storage) = create_test_storage();
        let service = BookService::new(&storage);

        let err = service.update(BookId::new(), None, Some("If"), None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_book() {
        let (_temp_dir, storage) = create_test_storage();
        let service = BookService::new(&storage);

        let book = service.create("Rudyard Kipling", "Jungle Book").unwrap();
        let id = book.id.unwrap();

        service.delete(id).unwrap();
        assert!(service.get(id).unwrap().is_none());
        assert!(service.delete(id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_find_by_id_or_title() {
        let (_temp_dir, storage) = create_test_storage();
        let service = BookService::new(&storage);

        let book = service.create("Rudyard Kipling", "Jungle Book").unwrap();
        let id = book.id.unwrap();

        assert_eq!(service.find(&id.to_string()).unwrap().unwrap().id, Some(id));
        assert_eq!(service.find("Jungle Book").unwrap().unwrap().id, Some(id));
        assert!(service.find("Kim").unwrap().is_none());
    }

    #[test]
    fn test_list_sorted_by_title() {
        let (_temp_dir, storage) = create_test_storage();
        let service = BookService::new(&storage);

        service.create("Joseph Conrad", "Nostromo").unwrap();
        service.create("Rudyard Kipling", "kim").unwrap();
        service.create("Rudyard Kipling", "If").unwrap();

        let titles: Vec<String> = service.list().unwrap().into_iter().map(|b| b.title).collect();
        assert_eq!(titles, vec!["If", "kim", "Nostromo"]);
    }

    #[test]
    fn test_find_all_by_author() {
        let (_temp_dir, storage) = create_test_storage();
        let service = BookService::new(&storage);

        service.create("Rudyard Kipling", "Kim").unwrap();
        service.create("Joseph Conrad", "Nostromo").unwrap();
        service.create("Rudyard Kipling", "If").unwrap();

        let titles: Vec<String> = service
            .find_all_by_author("Rudyard Kipling")
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["If", "Kim"]);
        assert!(service.find_all_by_author("Nobody").unwrap().is_empty());
    }

    #[test]
    fn test_acting_as_overrides_identity() {
        let (_temp_dir, storage) = create_test_storage();
        let service = BookService::new(&storage).acting_as("vanessa");

        let book = service.create("Rudyard Kipling", "Kim").unwrap();
        assert_eq!(book.created_by.as_deref(), Some("vanessa"));
    }
}
