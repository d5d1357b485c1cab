pub mod controller;
pub mod model;
pub mod postgres;
pub mod router;
pub mod service;
