pub mod audit;
pub mod clock;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod paging;
pub mod paths;
pub mod pipeline;
pub mod reconcile;
pub mod record;
pub mod source;
pub mod store;
pub mod timestamp;
pub mod warn;
