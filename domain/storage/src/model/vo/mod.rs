mod media_type;
mod part;
mod upload_request;

#[rustfmt::skip]
pub use {
    media_type::*,
    part::*,
    upload_request::*,
};
