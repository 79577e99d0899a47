pub mod dates;
pub mod metadata;
pub mod pages;
pub mod scanner;
