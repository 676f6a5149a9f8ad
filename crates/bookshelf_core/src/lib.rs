pub mod catalog;
pub mod domain;
pub mod isbn;
pub mod ports;
pub mod rating;

pub use catalog::{CatalogVolume, IndustryIdentifier};
pub use domain::{
    AuthSession, Book, BookDraft, BookUpdate, NewShelfItem, ShelfEntry, ShelfItem,
    ShelfItemUpdate, ShelfStatus, User, UserCredentials, UserUpdate,
};
pub use ports::{CatalogService, DatabaseService, PortError, PortResult};
pub use rating::{display_rating, Rating, RatingAggregate, RatingDelta};
