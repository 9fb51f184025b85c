#[macro_use]
extern crate tracing;

pub mod error;
mod metric;
pub mod router;
mod status;
#[cfg(test)]
mod test_support;

pub use router::{
    create_router,
    AppState,
};
