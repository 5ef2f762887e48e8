//! Route modules for the PDF preview server

pub mod events;
pub mod pages;
pub mod upload;
