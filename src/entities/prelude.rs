pub use super::image_attributes::Entity as ImageAttributes;
