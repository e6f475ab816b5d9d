//! Disk access for canonical documents.

pub mod file_service;
