pub mod documents_route;
pub mod health_route;
pub mod index;
pub mod search;
