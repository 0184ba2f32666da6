pub mod csv;
pub mod rss;
