pub mod activity;
pub mod clock;
pub mod corpus;
pub mod library;
pub mod lookup;
pub mod panic_handler;
pub mod pdf;
pub mod session;
pub mod settings;

pub mod test_utils;

pub use corpus::{PdfMatch, search};
pub use lookup::{Lookup, LookupError, LookupOutcome};
pub use session::{SessionPaginator, SessionRegistry};
