pub mod caption;
pub mod catalog;
pub mod imagehost;
pub mod media;
pub mod naming;
pub mod posters;
pub mod share;
