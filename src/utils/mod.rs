pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod image;
pub mod info;
pub mod logger;
pub mod marker;
pub mod tables;
pub mod traits;
