pub mod footer;
pub mod header;
pub mod utils;

pub use footer::draw_footer;
pub use header::{draw_header, extract_domain};
pub use utils::{format_money, project_status_color, stage_color, title_with_state, truncate};
