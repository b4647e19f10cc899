pub mod host;
pub mod request_id;
