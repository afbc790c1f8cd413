//! Decoder binding module.

pub mod mock;
pub mod rqrr_decoder;
pub mod traits;

pub use mock::{MockBinding, MockCall};
pub use rqrr_decoder::RqrrBinding;
pub use traits::{
    BindingError, BindingFactory, CameraConfig, DecodeHandler, DecoderBinding, ImageFile,
};
