use docclient::{
    bookstore::{Author, AuthorDatabase, Book, BookDatabase, BookStore, BookStoreDatabase},
    bson::oid::ObjectId,
    error::DocumentStoreError,
    memory::InMemoryStore,
    prelude::*,
};

struct Databases {
    authors: AuthorDatabase<InMemoryStore>,
    books: BookDatabase<InMemoryStore>,
    stores: BookStoreDatabase<InMemoryStore>,
}

fn databases() -> Databases {
    let backend = InMemoryStore::new();

    Databases {
        authors: AuthorDatabase::new(backend.clone()),
        books: BookDatabase::new(backend.clone()),
        stores: BookStoreDatabase::new(backend),
    }
}

#[tokio::test]
async fn test_store_then_load_round_trips() {
    let db = databases();
    let mut author = Author::new("testFirstName", "testLastName");

    assert!(db.authors.store(&mut author).await);
    assert!(author.has_valid_object_id());
    assert_eq!(db.authors.object_count().await.unwrap(), 1);

    let loaded = db.authors.load(author.id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(loaded, author);
}

#[tokio::test]
async fn test_book_load_resolves_author() {
    let db = databases();
    let mut author = Author::new("testFirstName", "testLastName");
    assert!(db.authors.store(&mut author).await);

    let mut book = Book::new(author.clone(), vec![10.0]);
    assert!(db.books.store(&mut book).await);
    assert_eq!(db.books.object_count().await.unwrap(), 1);

    let loaded = db.books.load(book.id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(loaded.author.first_name, "testFirstName");
    assert_eq!(loaded.author.last_name, "testLastName");
    assert_eq!(loaded.author.id, author.id);
    assert_eq!(loaded.prices, vec![10.0]);

    assert!(db.books.delete(&loaded).await);
    assert!(db.authors.delete(&author).await);
    assert_eq!(db.books.object_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_store_rejects_book_with_unsaved_author() {
    let db = databases();
    let mut book = Book::new(Author::new("Dan", "Brown"), vec![1.0]);

    assert!(!db.books.store(&mut book).await);
    assert!(book.id.is_none());
    assert_eq!(db.books.object_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_store_all_assigns_ids_positionally() {
    let db = databases();
    let count = 50;

    let mut authors = (0..count)
        .map(|i| Author::new(format!("first{i}"), format!("last{i}")))
        .collect::<Vec<_>>();
    assert!(db.authors.store_all(&mut authors).await);
    assert_eq!(db.authors.object_count().await.unwrap(), count as u64);

    let mut books = authors
        .iter()
        .map(|author| Book::new(author.clone(), vec![1.0, 2.0]))
        .collect::<Vec<_>>();
    assert!(db.books.store_all(&mut books).await);
    assert_eq!(db.books.object_count().await.unwrap(), count as u64);

    for (i, book) in books.iter().enumerate() {
        let loaded = db.books.load(book.id.as_deref().unwrap()).await.unwrap().unwrap();
        assert_eq!(loaded.author.first_name, format!("first{i}"));
    }

    assert_eq!(db.books.load_everything().await.unwrap().len(), count);

    let found = db.books.find_by_author_last_name("last25").await.unwrap().unwrap();
    assert_eq!(found.author.first_name, "first25");
    assert!(db.books.find_by_author_last_name("nobody").await.unwrap().is_none());

    assert!(db.books.remove_all().await);
    assert_eq!(db.books.object_count().await.unwrap(), 0);
    assert!(db.authors.remove_all().await);
    assert_eq!(db.authors.object_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_store_all_rejects_empty_input() {
    let db = databases();
    let mut none: Vec<Author> = Vec::new();

    assert!(!db.authors.store_all(&mut none).await);
}

#[tokio::test]
async fn test_store_all_failure_assigns_no_ids() {
    let db = databases();
    let mut stored = Author::new("Dan", "Brown");
    assert!(db.authors.store(&mut stored).await);

    let mut batch = vec![Author::new("Stephen", "King"), stored.clone()];

    assert!(!db.authors.store_all(&mut batch).await);
    assert!(batch[0].id.is_none());
    assert_eq!(batch[1].id, stored.id);
}

#[tokio::test]
async fn test_delete_by_id() {
    let db = databases();
    let mut a1 = Author::new("first1", "last1");
    let mut a2 = Author::new("first2", "last2");
    assert!(db.authors.store(&mut a1).await);
    assert!(db.authors.store(&mut a2).await);

    let mut books = vec![
        Book::new(a1.clone(), vec![1.0, 2.0]),
        Book::new(a2.clone(), vec![3.0, 4.0]),
        Book::new(a1.clone(), vec![5.0, 6.0]),
    ];
    assert!(books.iter().all(|book| book.id.is_none()));
    assert!(db.books.store_all(&mut books).await);
    assert_eq!(db.books.object_count().await.unwrap(), 3);

    assert!(db.books.delete_by_id(books[1].id.as_deref().unwrap()).await);
    assert_eq!(db.books.object_count().await.unwrap(), 2);
    assert!(!db.books.delete_by_id(books[1].id.as_deref().unwrap()).await);

    assert!(db.books.delete_by_id(books[2].id.as_deref().unwrap()).await);
    assert!(db.books.delete_by_id(books[0].id.as_deref().unwrap()).await);
    assert_eq!(db.books.object_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_without_match_returns_false() {
    let db = databases();

    assert!(!db.authors.delete_by_id(&ObjectId::new().to_hex()).await);
    assert!(!db.authors.delete_by_id("not-an-id").await);
    assert!(!db.authors.delete(&Author::new("Dan", "Brown")).await);
}

#[tokio::test]
async fn test_update_paths() {
    let db = databases();
    let mut author = Author::new("FirstName", "LastName");
    let mut book = Book::new(author.clone(), vec![1.0, 2.0]);

    assert!(!db.authors.update(&author).await);
    assert!(!db.books.update(&book).await);
    assert_eq!(db.authors.object_count().await.unwrap(), 0);

    assert!(db.authors.store(&mut author).await);
    book.author = author.clone();
    assert!(db.books.store(&mut book).await);
    let book_id = book.id.clone().unwrap();

    book.prices = vec![3.0, 4.0];
    assert!(db.books.update(&book).await);
    assert_eq!(db.books.load(&book_id).await.unwrap().unwrap().prices[0], 3.0);

    author.last_name = "New LastName".into();
    assert!(db.authors.update(&author).await);
    assert_eq!(db.authors.object_count().await.unwrap(), 1);
    assert_eq!(
        db.books.load(&book_id).await.unwrap().unwrap().author.last_name,
        "New LastName"
    );

    let author_id = author.id.clone().unwrap();
    assert!(db.authors.update_field(&author_id, "firstName", "New FirstName").await);
    assert_eq!(
        db.books.load(&book_id).await.unwrap().unwrap().author.first_name,
        "New FirstName"
    );
    assert_eq!(db.books.object_count().await.unwrap(), 1);

    assert!(!db.authors.update_field("bogus", "firstName", "x").await);
    assert!(!db.authors.update_field(&ObjectId::new().to_hex(), "firstName", "x").await);
}

#[tokio::test]
async fn test_update_field_paths_into_arrays_and_id() {
    let db = databases();
    let mut author = Author::new("Dan", "Brown");
    assert!(db.authors.store(&mut author).await);
    let mut book = Book::new(author.clone(), vec![10.0, 12.5]);
    assert!(db.books.store(&mut book).await);
    let book_id = book.id.clone().unwrap();
    let author_id = author.id.clone().unwrap();

    assert!(db.books.update_field(&book_id, "prices.0", 99.0).await);
    assert_eq!(db.books.load(&book_id).await.unwrap().unwrap().prices, vec![99.0, 12.5]);

    assert!(!db.authors.update_field(&author_id, "_id", "x").await);
    assert_eq!(db.authors.load(&author_id).await.unwrap().unwrap(), author);
    assert_eq!(db.books.load(&book_id).await.unwrap().unwrap().author, author);
}

#[tokio::test]
async fn test_update_with_unknown_id_leaves_data_alone() {
    let db = databases();
    let mut author = Author::new("Dan", "Brown");
    assert!(db.authors.store(&mut author).await);

    let ghost = Author {
        id: Some(ObjectId::new().to_hex()),
        ..Author::new("Ghost", "Writer")
    };

    assert!(!db.authors.update(&ghost).await);
    assert_eq!(db.authors.object_count().await.unwrap(), 1);

    let loaded = db.authors.load_everything().await.unwrap();
    assert_eq!(loaded, vec![author]);
}

#[tokio::test]
async fn test_upsert_inserts_then_overwrites() {
    let db = databases();
    let mut a1 = Author::new("Dan", "Brown");
    let mut a2 = Author::new("Stephen", "King");

    assert!(db.authors.upsert(&mut a1).await);
    assert!(db.authors.upsert(&mut a2).await);
    assert!(a1.has_valid_object_id());
    assert_eq!(db.authors.object_count().await.unwrap(), 2);

    let mut loaded = db.authors.load(a1.id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(loaded.first_name, "Dan");

    loaded.first_name = "Dan1".into();
    assert!(db.authors.upsert(&mut loaded).await);

    let updated = db.authors.load(a1.id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(updated.first_name, "Dan1");
    assert_eq!(updated.id, a1.id);
    assert_eq!(db.authors.object_count().await.unwrap(), 2);

    let mut malformed = Author {
        id: Some("abc".into()),
        ..Author::new("Bad", "Id")
    };
    assert!(!db.authors.upsert(&mut malformed).await);
    assert_eq!(malformed.id.as_deref(), Some("abc"));
    assert_eq!(db.authors.object_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_upsert_with_unknown_id_inserts_under_that_id() {
    let db = databases();
    let id = ObjectId::new().to_hex();
    let mut author = Author {
        id: Some(id.clone()),
        ..Author::new("Stephen", "King")
    };

    assert!(db.authors.upsert(&mut author).await);
    assert_eq!(author.id.as_deref(), Some(id.as_str()));
    assert_eq!(db.authors.object_count().await.unwrap(), 1);

    let loaded = db.authors.load(&id).await.unwrap().unwrap();
    assert_eq!(loaded, author);
}

#[tokio::test]
async fn test_load_edge_cases() {
    let db = databases();

    assert!(db.authors.load("").await.unwrap().is_none());
    assert!(db.authors.load(&ObjectId::new().to_hex()).await.unwrap().is_none());
    assert!(matches!(
        db.authors.load("xyz").await,
        Err(DocumentStoreError::InvalidIdentifier(_))
    ));

    let none: [&str; 0] = [];
    assert!(db.authors.load_all(&none).await.unwrap().is_empty());
    assert!(matches!(
        db.authors.load_all(&["xyz"]).await,
        Err(DocumentStoreError::InvalidIdentifier(_))
    ));
}

#[tokio::test]
async fn test_load_all_by_ids() {
    let db = databases();
    let mut authors = vec![
        Author::new("a", "1"),
        Author::new("b", "2"),
        Author::new("c", "3"),
    ];
    assert!(db.authors.store_all(&mut authors).await);

    let ids = [authors[0].id.clone().unwrap(), authors[2].id.clone().unwrap()];
    let mut loaded = db.authors.load_all(&ids).await.unwrap();
    loaded.sort_by(|a, b| a.first_name.cmp(&b.first_name));

    assert_eq!(loaded, vec![authors[0].clone(), authors[2].clone()]);
}

#[tokio::test]
async fn test_query_sorts_and_paginates() {
    let db = databases();
    let mut authors = ["Carol", "Alice", "Bob", "Dave"]
        .iter()
        .map(|name| Author::new(*name, "Smith"))
        .collect::<Vec<_>>();
    authors.push(Author::new("Eve", "Jones"));
    assert!(db.authors.store_all(&mut authors).await);

    let page = db
        .authors
        .query(
            Query::builder()
                .filter(Filter::eq("lastName", "Smith"))
                .sort("firstName", SortDirection::Asc)
                .offset(1)
                .limit(2)
                .build(),
        )
        .await
        .unwrap();

    let names = page.iter().map(|a| a.first_name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["Bob", "Carol"]);

    let not_smith = db
        .authors
        .find_all(Filter::eq("lastName", "Smith").not())
        .await
        .unwrap();
    assert_eq!(not_smith.len(), 1);
    assert_eq!(not_smith[0].first_name, "Eve");
}

#[tokio::test]
async fn test_book_store_resolves_books_and_authors() {
    let db = databases();
    let mut brown = Author::new("Dan", "Brown");
    let mut king = Author::new("Stephen", "King");
    assert!(db.authors.store(&mut brown).await);
    assert!(db.authors.store(&mut king).await);
    assert_eq!(db.authors.object_count().await.unwrap(), 2);

    let mut books = Vec::new();
    for i in 0..6 {
        let author = if i % 2 == 0 { &brown } else { &king };
        let mut book = Book::new(author.clone(), vec![10.0 + f64::from(i)]);
        assert!(db.books.store(&mut book).await);
        books.push(book);
    }
    assert_eq!(db.books.object_count().await.unwrap(), 6);

    let mut store = BookStore::new("Thalia", books.clone());
    assert!(db.stores.store(&mut store).await);
    assert_eq!(db.stores.object_count().await.unwrap(), 1);

    let loaded = db.stores.load(store.id.as_deref().unwrap()).await.unwrap().unwrap();

    assert_eq!(loaded.id, store.id);
    assert_eq!(loaded.name, "Thalia");
    assert_eq!(loaded.books.len(), 6);
    assert_eq!(loaded.books[0].author.first_name, "Dan");
    assert_eq!(loaded.books[1].author.first_name, "Stephen");
    assert_eq!(loaded.books[0].author.id, brown.id);
    assert_eq!(loaded.books[1].author.id, king.id);
    assert_eq!(loaded.books[0].prices[0], 10.0);
    assert_eq!(loaded.books[5].prices[0], 15.0);

    let book_ids = loaded.books.iter().map(|book| book.id.clone()).collect::<Vec<_>>();
    let expected_ids = books.iter().map(|book| book.id.clone()).collect::<Vec<_>>();
    assert_eq!(book_ids, expected_ids);

    let by_name = db.stores.find_first(Filter::eq("name", "Thalia")).await.unwrap();
    assert_eq!(by_name.map(|s| s.books.len()), Some(6));
}

#[tokio::test]
async fn test_book_store_without_resolvable_books_is_not_returned() {
    let db = databases();
    let mut empty = BookStore::new("Empty", Vec::new());

    assert!(db.stores.store(&mut empty).await);
    assert_eq!(db.stores.object_count().await.unwrap(), 1);
    assert!(db.stores.load(empty.id.as_deref().unwrap()).await.unwrap().is_none());
}
