//! One module per subcommand.

mod purge;
mod show;
mod status;

pub use purge::run_purge;
pub use show::run_show;
pub use status::run_status;
