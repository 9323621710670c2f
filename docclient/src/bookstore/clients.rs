use std::ops::Deref;

use docclient_core::{
    backend::StoreBackend,
    client::DatabaseClient,
    error::DocumentStoreResult,
    query::Filter,
};

use super::{author::Author, book::Book, store::BookStore};

macro_rules! database_client {
    ($(#[$meta:meta])* $name:ident => $entity:ty) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name<B: StoreBackend>(DatabaseClient<B, $entity>);

        impl<B: StoreBackend> $name<B> {
            pub fn new(backend: B) -> Self {
                Self(DatabaseClient::new(backend))
            }

            /// Consumes the client and returns the generic client it wraps.
            pub fn into_inner(self) -> DatabaseClient<B, $entity> {
                self.0
            }
        }

        impl<B: StoreBackend> Deref for $name<B> {
            type Target = DatabaseClient<B, $entity>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

database_client! {
    /// Client for the `authors` collection.
    AuthorDatabase => Author
}

database_client! {
    /// Client for the `books` collection. Loaded books carry their resolved author.
    BookDatabase => Book
}

database_client! {
    /// Client for the `bookstores` collection. Loaded stores carry fully resolved books.
    BookStoreDatabase => BookStore
}

impl<B: StoreBackend> BookDatabase<B> {
    /// Returns the first book whose author has the given last name.
    pub async fn find_by_author_last_name(&self, last_name: &str) -> DocumentStoreResult<Option<Book>> {
        self.find_first(Filter::eq("author.lastName", last_name)).await
    }
}
