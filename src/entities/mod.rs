pub mod prelude;

pub mod image_attributes;
