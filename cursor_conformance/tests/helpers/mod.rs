pub mod e2e;
pub mod env;

#[allow(unused_imports)]
pub use e2e::{can_connect_to_duckdb, e2e_backend, should_run_e2e_tests};
#[allow(unused_imports)]
pub use env::{e2e_config, e2e_spatial_config};
