pub mod comments;
pub mod export;
pub mod import;
pub mod info;
pub mod run;
pub mod runs;
pub mod segments;

pub use comments::*;
pub use export::*;
pub use import::*;
pub use info::*;
pub use run::*;
pub use runs::*;
pub use segments::*;
