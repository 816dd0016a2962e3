mod common;
mod dashboard;
mod service;
