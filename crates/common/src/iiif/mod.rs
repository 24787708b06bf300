//! IIIF image and presentation url handling

pub mod image_handler;
pub mod page;
pub mod params;
pub mod presentation;
pub mod thumbnail_handler;
pub mod url_handler;
pub mod watermark_handler;

pub use image_handler::{ImageHandler, PageType};
pub use page::{MediaKind, PhysicalPage};
pub use params::{Format, ImageParams, ParamChanges, Quality, Region, Rotation, Size};
pub use presentation::ApiUrls;
pub use thumbnail_handler::{FallbackImage, ThumbnailHandler};
pub use url_handler::IiifUrlHandler;
pub use watermark_handler::WatermarkHandler;
