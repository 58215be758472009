pub mod claims;
pub mod common;
pub mod member;
pub mod promo_image;

pub use claims::*;
pub use common::*;
pub use member::*;
pub use promo_image::*;
