mod google;
mod traits;

pub use google::{GoogleEndpoints, GoogleProvider};
pub use traits::{AuthorizationRequest, OAuthProvider, Profile, TokenSet};
