pub mod http;
pub mod posting;
