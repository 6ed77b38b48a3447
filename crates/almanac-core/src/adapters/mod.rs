//! Source adapters: endpoint layout and parameters for each upstream API.

pub mod estat;
pub mod jma;

pub use estat::{EstatAdapter, ESTAT_DEFAULT_BASE_URL};
pub use jma::{JmaAdapter, JMA_DEFAULT_BASE_URL};

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
