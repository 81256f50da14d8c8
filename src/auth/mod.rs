mod claims;
mod jwt;

pub use claims::{Claims, TokenKind};
pub use jwt::{AuthUser, JwtKeys};
