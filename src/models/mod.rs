pub mod access_token;
pub mod goal;
pub mod motivation;

pub use access_token::AccessToken;
pub use goal::Goal;
pub use motivation::Motivation;
