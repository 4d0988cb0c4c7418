mod link;
mod session;

pub use link::LinkState;
pub use session::SessionState;
