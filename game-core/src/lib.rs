pub mod categories;
pub mod elo;
pub mod scoring;
pub mod sm2;

// Re-export main components
pub use categories::*;
pub use elo::*;
pub use scoring::*;
pub use sm2::*;
