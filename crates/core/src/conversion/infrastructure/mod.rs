pub mod converter_factory;
pub mod native_converter;
pub mod swscale_converter;
