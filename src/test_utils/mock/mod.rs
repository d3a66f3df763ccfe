mod mock_completion;
mod mock_sheet;
mod mock_stats;

pub use mock_completion::*;
pub use mock_sheet::*;
pub use mock_stats::*;
